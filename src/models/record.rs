// Rolled-up records and the payload shipped from sender to collector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag carrying the container alias a record belongs to.
pub const CONTAINER_NAME_TAG: &str = "container_name";

/// A single field value; JSON integers stay integers, everything with a fraction is a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

/// One metric family for one container over one window.
///
/// Wire shape: `{"measurement", "timestamp", "tags", "fields"}` with the
/// timestamp in whole UNIX seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub measurement: String,
    pub timestamp: i64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl SummaryRecord {
    pub fn new(
        measurement: &str,
        container: &str,
        timestamp: i64,
        fields: BTreeMap<String, FieldValue>,
    ) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(CONTAINER_NAME_TAG.to_string(), container.to_string());
        Self {
            measurement: measurement.to_string(),
            timestamp,
            tags,
            fields,
        }
    }

    pub fn container_name(&self) -> Option<&str> {
        self.tags.get(CONTAINER_NAME_TAG).map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// container alias → its records for the cycle. Rebuilt every cycle.
pub type Payload = BTreeMap<String, Vec<SummaryRecord>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_keeps_integers_and_floats_apart() {
        let fields: BTreeMap<String, FieldValue> =
            serde_json::from_str(r#"{"a": 3, "b": 3.5, "c": -2, "d": 1.0}"#).unwrap();
        assert_eq!(fields["a"], FieldValue::Integer(3));
        assert_eq!(fields["b"], FieldValue::Float(3.5));
        assert_eq!(fields["c"], FieldValue::Integer(-2));
        assert_eq!(fields["d"], FieldValue::Float(1.0));
    }

    #[test]
    fn record_wire_shape() {
        let mut fields = BTreeMap::new();
        fields.insert("total".to_string(), FieldValue::Integer(42));
        let rec = SummaryRecord::new("cpu.usage", "web", 1_700_000_000, fields);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["measurement"], "cpu.usage");
        assert_eq!(json["timestamp"], 1_700_000_000);
        assert_eq!(json["tags"]["container_name"], "web");
        assert_eq!(json["fields"]["total"], 42);
        assert_eq!(rec.container_name(), Some("web"));
    }
}
