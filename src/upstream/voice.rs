use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
}

impl Voice {
    /// Reduces one upstream voice record to `{id, name}`. Records without a
    /// string `voice_id` and `name` are not voices.
    pub fn from_record(record: &Value) -> Option<Self> {
        let id = record.get("voice_id")?.as_str()?;
        let name = record.get("name")?.as_str()?;
        Some(Self {
            id: id.to_string(),
            name: name.to_string(),
        })
    }
}

/// Maps the upstream listing payload. A missing or malformed `voices` field
/// yields an empty list.
pub fn from_listing(payload: &Value) -> Vec<Voice> {
    payload
        .get("voices")
        .and_then(Value::as_array)
        .map(|records| records.iter().filter_map(Voice::from_record).collect())
        .unwrap_or_default()
}
