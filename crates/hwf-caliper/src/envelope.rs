use crate::events::format_event_time;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

pub const DATA_VERSION: &str = "http://purl.imsglobal.org/ctx/caliper/v1p2";

/// Transport wrapper around one or more serialized events.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub sensor: String,
    pub send_time: String,
    pub data_version: String,
    pub data: Vec<Value>,
}

impl Envelope {
    pub fn new(sensor: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            sensor: sensor.into(),
            send_time: format_event_time(Utc::now()),
            data_version: DATA_VERSION.to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_field_names() {
        let envelope = Envelope::new("urn:umich:jupyter:sensor", vec![json!({ "id": "x" })]);
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["sensor"], "urn:umich:jupyter:sensor");
        assert_eq!(json["dataVersion"], DATA_VERSION);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert!(json["sendTime"].as_str().unwrap().ends_with('Z'));
    }
}
