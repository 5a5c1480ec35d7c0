//! Content hashing for merge conflict detection.
//!
//! Two records with the same tag are in conflict when their content
//! differs. Hashing the canonical field text lets the merge compare records
//! without caring which side they came from.

use sha2::{Digest, Sha256};

use crate::model::Record;

/// Field separator that cannot appear in the flat codec format.
const SEPARATOR: [u8; 1] = [0x1f];

/// Compute a SHA-256 hash of a record's content.
///
/// Coordinates are hashed in their shortest decimal form, so `10.5` and
/// `10.50` read from different clients hash the same.
#[must_use]
pub fn content_hash(record: &Record) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.tag.as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(record.latitude.to_string().as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(record.longitude.to_string().as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(record.note.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        let record = Record::new("A", 1.5, 2.5, "x");
        let hash1 = content_hash(&record);
        let hash2 = content_hash(&record);

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let a = Record::new("A", 1.5, 2.5, "x");
        let b = Record::new("A", 1.5, 2.5, "y");
        assert_ne!(content_hash(&a), content_hash(&b));
        assert_eq!(content_hash(&a), content_hash(&a.clone()));
    }

    #[test]
    fn test_fields_do_not_run_together() {
        let a = Record::new("A1", 2.0, 3.0, "");
        let b = Record::new("A", 12.0, 3.0, "");
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
