//! Tag-keyed merge rules.
//!
//! Both directions follow the same rule: the tag is the key and the first
//! copy seen wins. Local records are always seen first, so a tag present
//! locally is never overwritten by the remote copy.

use std::collections::HashMap;

use tracing::warn;

use crate::model::{LocalRecord, Record};

use super::hash::content_hash;
use super::types::{MergeStats, PushReport};

/// Remember the first copy of each tag; report whether `record` was new.
///
/// When the tag is known already, `stats` records the skip and a conflict
/// if the content differs from the kept copy.
fn admit<'a>(seen: &mut HashMap<&'a str, String>, record: &'a Record, stats: &mut MergeStats) -> bool {
    match seen.get(record.tag.as_str()) {
        Some(kept) => {
            stats.skipped += 1;
            if *kept != content_hash(record) {
                stats.conflicts += 1;
            }
            false
        }
        None => {
            seen.insert(record.tag.as_str(), content_hash(record));
            true
        }
    }
}

/// Remote records whose tag is not present locally (`remote - local`).
///
/// Duplicate tags within the remote list collapse to their first copy.
/// Records that fail validation are left out and counted as invalid, so
/// one bad remote entry cannot block the rest of the pull.
#[must_use]
pub fn records_to_pull(local: &[LocalRecord], remote: &[Record]) -> (Vec<Record>, MergeStats) {
    let mut seen: HashMap<&str, String> = HashMap::with_capacity(local.len() + remote.len());
    for row in local {
        seen.entry(row.tag()).or_insert_with(|| content_hash(&row.record));
    }

    let mut stats = MergeStats::default();
    let mut fresh = Vec::new();
    for record in remote {
        if let Err(e) = record.validate() {
            warn!(tag = %record.tag, error = %e, "Skipping invalid remote record");
            stats.invalid += 1;
            continue;
        }
        if admit(&mut seen, record, &mut stats) {
            stats.added += 1;
            fresh.push(record.clone());
        }
    }
    (fresh, stats)
}

/// Records for the bundle to push: `local ∪ (remote - local)`.
///
/// Local rows come first in insertion order, deduplicated by tag; remote
/// records with tags unknown locally follow in their remote order.
#[must_use]
pub fn bundle_records(local: &[LocalRecord], remote: &[Record]) -> (Vec<Record>, PushReport) {
    let mut seen: HashMap<&str, String> = HashMap::with_capacity(local.len() + remote.len());
    let mut report = PushReport::default();
    let mut merged = Vec::with_capacity(local.len() + remote.len());

    let mut local_stats = MergeStats::default();
    for row in local {
        if admit(&mut seen, &row.record, &mut local_stats) {
            merged.push(row.record.clone());
        }
    }
    report.local = merged.len();
    report.duplicates = local_stats.skipped;

    let mut remote_stats = MergeStats::default();
    for record in remote {
        if admit(&mut seen, record, &mut remote_stats) {
            merged.push(record.clone());
        }
    }
    report.remote_only = merged.len() - report.local;
    report.conflicts = remote_stats.conflicts;
    report.written = merged.len();

    (merged, report)
}
