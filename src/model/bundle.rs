//! Remote bundle model.
//!
//! One bundle per user holds that user's full record set in the remote
//! store. The JSON layout is:
//!
//! ```json
//! {"records":[{"tag":"ABC","latitude":10.5,"longitude":-75.2,"note":"gate"}],
//!  "owner":"alice","syncedAt":"2025-03-01","serverTimestamp":1740787200000,"deviceId":"..."}
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::record::Record;

/// Per-user document in the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBundle {
    /// Ordered record list.
    #[serde(default, deserialize_with = "lenient_records")]
    pub records: Vec<Record>,

    /// Owning username.
    #[serde(default)]
    pub owner: String,

    /// Calendar date of the last successful push.
    #[serde(default)]
    pub synced_at: Option<NaiveDate>,

    /// Writer timestamp (Unix milliseconds).
    #[serde(default)]
    pub server_timestamp: i64,

    /// Identity of the device that last wrote the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl RemoteBundle {
    /// Top-level document fields, for field-level merge writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle cannot be represented as a JSON object.
    pub fn to_fields(&self) -> serde_json::Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "bundle serialized to non-object: {other}"
            ))),
        }
    }
}

/// A record as it may appear in a remote document written by any client.
#[derive(Deserialize)]
struct WireRecord {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    note: Option<String>,
}

/// Accept record lists written by older or foreign clients.
///
/// Entries without a tag are dropped; missing coordinates and notes fall
/// back to their defaults. Entries that are not objects are skipped.
fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<Record>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    let records = raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<WireRecord>(value) {
            Ok(wire) => match wire.tag {
                Some(tag) if !tag.is_empty() => Some(Record {
                    tag,
                    latitude: wire.latitude.unwrap_or_default(),
                    longitude: wire.longitude.unwrap_or_default(),
                    note: wire.note.unwrap_or_default(),
                }),
                _ => {
                    debug!("Dropping remote record without tag");
                    None
                }
            },
            Err(e) => {
                debug!(error = %e, "Dropping malformed remote record");
                None
            }
        })
        .collect();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_wire_layout() {
        let bundle = RemoteBundle {
            records: vec![Record::new("ABC", 10.5, -75.2, "gate")],
            owner: "alice".into(),
            synced_at: NaiveDate::from_ymd_opt(2025, 3, 1),
            server_timestamp: 42,
            device_id: None,
        };
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["owner"], "alice");
        assert_eq!(json["syncedAt"], "2025-03-01");
        assert_eq!(json["serverTimestamp"], 42);
        assert_eq!(json["records"][0]["tag"], "ABC");
        assert!(json.get("deviceId").is_none());
    }

    #[test]
    fn test_lenient_records_drop_tagless_and_accept_integers() {
        let json = r#"{
            "records": [
                {"tag": "A", "latitude": 10, "longitude": -75},
                {"latitude": 1.0, "longitude": 2.0, "note": "no tag"},
                "garbage",
                {"tag": "B", "latitude": 1.25, "longitude": 2.5, "note": null}
            ],
            "owner": "bob"
        }"#;
        let bundle: RemoteBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.records.len(), 2);
        assert_eq!(bundle.records[0], Record::new("A", 10.0, -75.0, ""));
        assert_eq!(bundle.records[1].tag, "B");
        assert_eq!(bundle.records[1].note, "");
        assert_eq!(bundle.synced_at, None);
    }

    #[test]
    fn test_null_records_is_empty() {
        let bundle: RemoteBundle = serde_json::from_str(r#"{"records": null}"#).unwrap();
        assert!(bundle.records.is_empty());
    }

    #[test]
    fn test_to_fields_is_object() {
        let fields = RemoteBundle::default().to_fields().unwrap();
        assert!(fields.contains_key("records"));
        assert!(fields.contains_key("serverTimestamp"));
    }
}
