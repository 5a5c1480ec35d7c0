//! Record model.
//!
//! A record is one captured observation: a tag (the natural key within a
//! user's record set), a coordinate pair and a free-text note.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Valid latitude range in decimal degrees.
pub const LATITUDE_RANGE: RangeInclusive<f64> = -90.0..=90.0;

/// Valid longitude range in decimal degrees.
pub const LONGITUDE_RANGE: RangeInclusive<f64> = -180.0..=180.0;

/// A user-captured observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Natural key, unique within one user's record set.
    pub tag: String,

    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,

    /// Free-text observation (may be empty).
    #[serde(default)]
    pub note: String,
}

impl Record {
    /// Create a record from its four fields.
    pub fn new(
        tag: impl Into<String>,
        latitude: f64,
        longitude: f64,
        note: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            latitude,
            longitude,
            note: note.into(),
        }
    }

    /// Check the record invariants: non-empty tag, coordinates in range.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFormat` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            return Err(Error::InvalidFormat("tag is required".to_string()));
        }
        if !LATITUDE_RANGE.contains(&self.latitude) {
            return Err(Error::InvalidFormat(format!(
                "latitude out of range (-90 to 90): {}",
                self.latitude
            )));
        }
        if !LONGITUDE_RANGE.contains(&self.longitude) {
            return Err(Error::InvalidFormat(format!(
                "longitude out of range (-180 to 180): {}",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// A record as persisted in the local store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalRecord {
    /// Locally generated sequence id (insertion order).
    pub id: i64,

    /// Username that captured or owns the record.
    pub owner: String,

    #[serde(flatten)]
    pub record: Record,

    /// Insertion timestamp (Unix milliseconds).
    pub created_at: i64,
}

impl LocalRecord {
    /// The record's natural key.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.record.tag
    }
}
