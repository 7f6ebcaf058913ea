use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wire shape every message on the bus takes, regardless of topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub correlation_id: String,
    pub payload: Value,
}

impl Envelope {
    pub fn new(
        message_type: impl Into<String>,
        id: impl Into<String>,
        correlation_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            id: id.into(),
            timestamp: chrono::Utc::now(),
            correlation_id: correlation_id.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_type_field_as_type() {
        let envelope = Envelope::new("WorkflowTriggered", "evt-1", "corr-1", Value::Null);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "WorkflowTriggered");
        assert_eq!(json["correlation_id"], "corr-1");
    }
}
