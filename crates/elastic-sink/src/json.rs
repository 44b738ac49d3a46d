//! Event to JSON document conversion.

use base64::Engine;
use chrono::{DateTime, SecondsFormat};
use relay_protocol::{Container, Event, ScalarArray, Value};
use serde_json::{json, Map};

/// Reserved document field carrying the event timestamp; a payload tag of
/// the same name is ignored.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Payload tag whose container may be merged into the document root.
pub const PROPERTIES_TAG: &str = "properties";

/// Render one event as a flat JSON document with an `@timestamp` field
/// derived from the event id.
pub fn event_to_document(event: &Event, merge_properties_to_root: bool) -> serde_json::Value {
    let mut doc = Map::new();
    let timestamp = event.timestamp().unwrap_or(DateTime::UNIX_EPOCH);
    doc.insert(
        TIMESTAMP_FIELD.to_string(),
        json!(timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)),
    );

    if merge_properties_to_root {
        if let Some(properties) = event.payload().get(PROPERTIES_TAG).and_then(Value::as_container)
        {
            for (name, value) in properties.iter() {
                if name == TIMESTAMP_FIELD {
                    continue;
                }
                doc.insert(name.to_string(), value_to_json(value));
            }
        }
    }

    for (name, value) in event.payload().iter() {
        if name == TIMESTAMP_FIELD {
            continue;
        }
        if merge_properties_to_root && name == PROPERTIES_TAG {
            continue;
        }
        doc.insert(name.to_string(), value_to_json(value));
    }

    serde_json::Value::Object(doc)
}

fn container_to_json(container: &Container) -> serde_json::Value {
    let mut object = Map::new();
    for (name, value) in container.iter() {
        object.insert(name.to_string(), value_to_json(value));
    }
    serde_json::Value::Object(object)
}

/// Map a wire value to its JSON representation. Blobs become base64
/// strings; non-finite floats become null, as JSON cannot carry them.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Flag(v) => json!(v),
        Value::Byte(v) => json!(v),
        Value::Short(v) => json!(v),
        Value::Integer(v) => json!(v),
        Value::Long(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Double(v) => json!(v),
        Value::String(v) => json!(v),
        Value::Uuid(v) => json!(v.to_string()),
        Value::Blob(v) => json!(base64::engine::general_purpose::STANDARD.encode(v)),
        Value::Null => serde_json::Value::Null,
        Value::Container(c) => container_to_json(c),
        Value::ContainerArray(containers) => serde_json::Value::Array(
            containers.iter().map(container_to_json).collect(),
        ),
        Value::Array(array) => scalar_array_to_json(array),
    }
}

fn scalar_array_to_json(array: &ScalarArray) -> serde_json::Value {
    match array {
        ScalarArray::Flag(v) => json!(v),
        ScalarArray::Byte(v) => json!(v),
        ScalarArray::Short(v) => json!(v),
        ScalarArray::Integer(v) => json!(v),
        ScalarArray::Long(v) => json!(v),
        ScalarArray::Float(v) => json!(v),
        ScalarArray::Double(v) => json!(v),
        ScalarArray::String(v) => json!(v),
        ScalarArray::Uuid(v) => {
            serde_json::Value::Array(v.iter().map(|u| json!(u.to_string())).collect())
        }
        ScalarArray::Blob(v) => serde_json::Value::Array(
            v.iter()
                .map(|b| json!(base64::engine::general_purpose::STANDARD.encode(b)))
                .collect(),
        ),
        ScalarArray::Null(n) => {
            serde_json::Value::Array(vec![serde_json::Value::Null; *n as usize])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::EventBuilder;

    #[test]
    fn document_carries_timestamp_and_payload_fields() {
        let event = EventBuilder::new()
            .tag("message", Value::String("hi".to_string()))
            .tag("count", Value::Integer(2))
            .build();

        let doc = event_to_document(&event, false);
        assert!(doc[TIMESTAMP_FIELD].is_string());
        assert_eq!(doc["message"], json!("hi"));
        assert_eq!(doc["count"], json!(2));
    }

    #[test]
    fn payload_timestamp_tag_never_shadows_the_derived_one() {
        let event = EventBuilder::new()
            .tag(TIMESTAMP_FIELD, Value::String("forged".to_string()))
            .build();

        let doc = event_to_document(&event, false);
        assert_ne!(doc[TIMESTAMP_FIELD], json!("forged"));
    }

    #[test]
    fn properties_merge_into_the_root_when_enabled() {
        let mut properties = Container::new();
        properties.insert("project", Value::String("relay".to_string()));
        properties.insert(TIMESTAMP_FIELD, Value::String("forged".to_string()));

        let event = EventBuilder::new()
            .tag(PROPERTIES_TAG, Value::Container(properties))
            .tag("level", Value::String("error".to_string()))
            .build();

        let merged = event_to_document(&event, true);
        assert_eq!(merged["project"], json!("relay"));
        assert_eq!(merged["level"], json!("error"));
        assert!(merged.get(PROPERTIES_TAG).is_none());
        assert_ne!(merged[TIMESTAMP_FIELD], json!("forged"));

        let nested = event_to_document(&event, false);
        assert_eq!(nested[PROPERTIES_TAG]["project"], json!("relay"));
    }

    #[test]
    fn blobs_render_as_base64() {
        assert_eq!(value_to_json(&Value::Blob(vec![1, 2, 3])), json!("AQID"));
    }
}
