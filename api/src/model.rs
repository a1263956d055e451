use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Telemetry table in the remote store.
pub const TELEMETRY_TABLE: &str = "azure_data";
/// Device registry table in the remote store.
pub const DEVICES_TABLE: &str = "devices";

/// A registered telemetry source, provisioned out-of-band and looked up
/// by its globally unique external name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub azure_device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One stored telemetry measurement as it comes back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: i64,
    pub device_id: i64,
    pub azure_device_id: String,
    pub round_count: i64,
    pub slim_count: i64,
    pub round_void_count: f64,
    pub slim_void_count: f64,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub raw_payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// A validated, normalized record ready for insertion. The device
/// reference is still the external name; the repository resolves it to a
/// `device_id` at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTelemetryRecord {
    pub azure_device_id: String,
    pub round_count: i64,
    pub slim_count: i64,
    pub round_void_count: f64,
    pub slim_void_count: f64,
    pub enqueued_at: DateTime<Utc>,
    pub raw_payload: Option<Value>,
}

impl NewTelemetryRecord {
    /// Wire form for the store: decimals as 2-place floats, timestamps as
    /// RFC 3339 with explicit offset, the resolved device id attached.
    pub fn into_row(self, device_id: i64) -> Value {
        // The key is always present so that using the row as an update
        // patch overwrites a stored payload with null instead of keeping
        // it; updates are a full-field replace.
        json!({
            "device_id": device_id,
            "azure_device_id": self.azure_device_id,
            "round_count": self.round_count,
            "slim_count": self.slim_count,
            "round_void_count": self.round_void_count,
            "slim_void_count": self.slim_void_count,
            "enqueued_at": self.enqueued_at.to_rfc3339(),
            "raw_payload": self.raw_payload.unwrap_or(Value::Null),
        })
    }
}

/// Round to exactly two fractional digits, half away from zero.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round2_is_half_away_from_zero() {
        assert_eq!(round2(12.345), 12.35);
        assert_eq!(round2(-12.345), -12.35);
        assert_eq!(round2(0.004), 0.0);
        assert_eq!(round2(19.999), 20.0);
    }

    #[test]
    fn row_carries_resolved_device_id() {
        let rec = NewTelemetryRecord {
            azure_device_id: "pool-sensor-1".to_string(),
            round_count: 4,
            slim_count: 2,
            round_void_count: 1.25,
            slim_void_count: 0.5,
            enqueued_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            raw_payload: None,
        };

        let row = rec.into_row(77);
        assert_eq!(row["device_id"], 77);
        assert_eq!(row["azure_device_id"], "pool-sensor-1");
        assert_eq!(row["enqueued_at"], "2026-03-01T12:00:00+00:00");
        assert!(row["raw_payload"].is_null());
        assert!(row.get("id").is_none());
        assert!(row.get("created_at").is_none());
    }
}
