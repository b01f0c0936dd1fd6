//! Builders for the OpenAPI-style schemas Gemini accepts as `responseSchema`.

use serde_json::{json, Map, Value};

pub fn string() -> Value {
    json!({ "type": "STRING" })
}

pub fn described(mut schema: Value, description: &str) -> Value {
    if let Some(obj) = schema.as_object_mut() {
        obj.insert("description".to_string(), Value::String(description.to_string()));
    }
    schema
}

pub fn nullable(mut schema: Value) -> Value {
    if let Some(obj) = schema.as_object_mut() {
        obj.insert("nullable".to_string(), Value::Bool(true));
    }
    schema
}

pub fn boolean() -> Value {
    json!({ "type": "BOOLEAN" })
}

pub fn integer() -> Value {
    json!({ "type": "INTEGER" })
}

pub fn string_enum(values: &[&str]) -> Value {
    json!({ "type": "STRING", "format": "enum", "enum": values })
}

pub fn array(items: Value) -> Value {
    json!({ "type": "ARRAY", "items": items })
}

/// Object with properties in declaration order
pub fn object(properties: &[(&str, Value)], required: &[&str]) -> Value {
    let props: Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();
    let ordering: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
    json!({
        "type": "OBJECT",
        "properties": props,
        "required": required,
        "propertyOrdering": ordering,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_schema_shape() {
        let schema = object(
            &[
                ("title", described(string(), "Main title")),
                ("rows", array(integer())),
                ("note", nullable(string())),
            ],
            &["title", "rows"],
        );
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["title"]["description"], "Main title");
        assert_eq!(schema["properties"]["rows"]["items"]["type"], "INTEGER");
        assert_eq!(schema["properties"]["note"]["nullable"], true);
        assert_eq!(schema["required"], json!(["title", "rows"]));
        assert_eq!(schema["propertyOrdering"], json!(["title", "rows", "note"]));
    }

    #[test]
    fn test_enum_schema() {
        let schema = string_enum(&["a", "b"]);
        assert_eq!(schema["enum"], json!(["a", "b"]));
    }
}
