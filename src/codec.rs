//! Record codec.
//!
//! Records travel as a flat `key:value` string joined with `-`:
//!
//! ```text
//! tag1d:<tag>-latitud:<lat>-longitud:<lon>-observacion:<note>
//! ```
//!
//! Manual entry uses the shorter positional form `<tag>-<lat>-<lon>-<note>`,
//! which [`format`] turns into the flat form. Because `-` is both the field
//! separator and the sign of a coordinate, a `-` directly after a separator
//! belongs to the number. The note is always last and keeps any `-` it
//! contains.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use crate::error::{Error, Result};
use crate::model::{LATITUDE_RANGE, LONGITUDE_RANGE, Record};

pub const TAG_KEY: &str = "tag1d";
pub const LATITUDE_KEY: &str = "latitud";
pub const LONGITUDE_KEY: &str = "longitud";
pub const NOTE_KEY: &str = "observacion";

/// Shape of manual input: anything, then exactly three more `-`-led fields.
static MANUAL_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.+(-[^-]*){3}$").expect("manual input pattern is valid")
});

/// Parse a flat payload into a record.
///
/// Never fails: unknown keys are ignored and missing or unparsable fields
/// keep their defaults (empty string, `0.0`). Use [`decode_strict`] when
/// the result must satisfy the record invariants.
#[must_use]
pub fn decode(payload: &str) -> Record {
    let mut record = Record::default();

    // The note swallows the rest of the payload, so the other keys are
    // only looked up in front of it.
    let head = match find_value(payload, NOTE_KEY) {
        Some(start) => {
            record.note = payload[start..].to_string();
            &payload[..start - NOTE_KEY.len() - 1]
        }
        None => payload,
    };

    if let Some(start) = find_value(head, TAG_KEY) {
        let value = &head[start..];
        record.tag = value.split('-').next().unwrap_or_default().to_string();
    }
    if let Some(start) = find_value(head, LATITUDE_KEY) {
        record.latitude = lenient_number(take_signed_segment(&head[start..]).0);
    }
    if let Some(start) = find_value(head, LONGITUDE_KEY) {
        record.longitude = lenient_number(take_signed_segment(&head[start..]).0);
    }

    record
}

/// Parse a flat payload and check the record invariants.
///
/// # Errors
///
/// Returns `Error::InvalidFormat` if the tag is empty or a coordinate is
/// out of range.
pub fn decode_strict(payload: &str) -> Result<Record> {
    let record = decode(payload);
    record.validate()?;
    Ok(record)
}

/// Encode a record in the flat payload form.
#[must_use]
pub fn encode(record: &Record) -> String {
    format!(
        "{TAG_KEY}:{}-{LATITUDE_KEY}:{}-{LONGITUDE_KEY}:{}-{NOTE_KEY}:{}",
        record.tag, record.latitude, record.longitude, record.note
    )
}

/// Turn positional manual input `<tag>-<lat>-<lon>-<note>` into a flat payload.
///
/// A missing note defaults to empty.
///
/// # Errors
///
/// Returns `Error::InvalidFormat` when the tag is empty or a coordinate is
/// not a decimal number or lies outside its range.
pub fn format(raw: &str) -> Result<String> {
    let (tag, rest) = raw.split_once('-').unwrap_or((raw, ""));
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(Error::InvalidFormat("tag is required".to_string()));
    }

    let (lat_text, rest) = take_signed_segment(rest);
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    let (lon_text, rest) = take_signed_segment(rest);
    let note = rest.strip_prefix('-').unwrap_or(rest);

    let latitude = strict_number("latitude", lat_text)?;
    if !LATITUDE_RANGE.contains(&latitude) {
        return Err(Error::InvalidFormat(format!(
            "latitude out of range (-90 to 90): {}",
            lat_text.trim()
        )));
    }

    let longitude = strict_number("longitude", lon_text)?;
    if !LONGITUDE_RANGE.contains(&longitude) {
        return Err(Error::InvalidFormat(format!(
            "longitude out of range (-180 to 180): {}",
            lon_text.trim()
        )));
    }

    Ok(encode(&Record::new(tag, latitude, longitude, note)))
}

/// Check that manual input has the four-field shape.
///
/// # Errors
///
/// Returns `Error::InvalidInputFormat` when the shape does not match.
pub fn check_manual_shape(raw: &str) -> Result<()> {
    if MANUAL_INPUT_RE.is_match(raw) {
        Ok(())
    } else {
        Err(Error::InvalidInputFormat(format!(
            "expected tag-latitude-longitude-note, got '{raw}'"
        )))
    }
}

/// Base64-encode a flat payload for the verification service.
#[must_use]
pub fn encode_payload(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decode a base64 scan payload back to its text.
///
/// # Errors
///
/// Returns `Error::InvalidFormat` if the payload is not valid base64 or
/// not UTF-8.
pub fn decode_payload(payload: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::InvalidFormat(format!("payload is not base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::InvalidFormat(format!("payload is not UTF-8: {e}")))
}

/// Byte offset of the value following `key:`.
///
/// A key only counts at the start of the input or right after a `-`.
fn find_value(s: &str, key: &str) -> Option<usize> {
    let marker = format!("{key}:");
    s.match_indices(&marker)
        .find(|(idx, _)| *idx == 0 || s.as_bytes()[idx - 1] == b'-')
        .map(|(idx, _)| idx + marker.len())
}

/// Split off one numeric field: an optional leading `-` (the sign) and
/// everything up to the next `-`. Returns the field and the unconsumed
/// remainder, which starts at the separator if there is one.
fn take_signed_segment(s: &str) -> (&str, &str) {
    let skip = usize::from(s.starts_with('-'));
    match s[skip..].find('-') {
        Some(pos) => s.split_at(skip + pos),
        None => (s, ""),
    }
}

fn lenient_number(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or_default()
}

fn strict_number(field: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            Error::InvalidFormat(format!("{field} must be a decimal number: '{}'", text.trim()))
        })
}
