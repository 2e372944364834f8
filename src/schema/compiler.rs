//! Descriptor compiler internals.

use crate::error::{Error, ErrorContext};
use crate::Result;
use serde_json::{json, Map, Value};

/// Sentinel key marking an object descriptor as a dynamic-key record.
pub const RECORD_SENTINEL: &str = "__is_record";

/// Compile a descriptor object into a JSON Schema document.
///
/// The root descriptor must be an object mapping field names to descriptors.
pub fn compile(descriptor: &Value) -> Result<Value> {
    let map = descriptor.as_object().ok_or_else(|| {
        Error::schema_with_context(
            "root descriptor must be an object",
            ErrorContext::new()
                .with_details(format!("got: {}", type_name(descriptor)))
                .with_source("schema_compiler"),
        )
    })?;
    compile_object(map, "$")
}

fn compile_object(map: &Map<String, Value>, path: &str) -> Result<Value> {
    if is_record(map) {
        return compile_record(map, path);
    }

    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for (key, value) in map {
        let field_path = format!("{}.{}", path, key);
        let (schema, optional) = compile_value(value, &field_path)?;
        if !optional {
            required.push(Value::String(key.clone()));
        }
        properties.insert(key.clone(), schema);
    }

    Ok(json!({
        "type": "object",
        "properties": properties,
        "required": required,
    }))
}

fn is_record(map: &Map<String, Value>) -> bool {
    map.get(RECORD_SENTINEL)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// A record compiles to a map type: the sample entry's key descriptor becomes
/// the key schema, its value the shared value template. The sample key itself
/// never becomes a literal property.
fn compile_record(map: &Map<String, Value>, path: &str) -> Result<Value> {
    let mut samples = map.iter().filter(|(k, _)| k.as_str() != RECORD_SENTINEL);
    let (sample_key, sample_value) = samples.next().ok_or_else(|| {
        Error::schema_with_context(
            "record descriptor needs one sample entry",
            ErrorContext::new()
                .with_field_path(path)
                .with_source("schema_compiler"),
        )
    })?;
    if samples.next().is_some() {
        return Err(Error::schema_with_context(
            "record descriptor must have exactly one sample entry",
            ErrorContext::new()
                .with_field_path(path)
                .with_source("schema_compiler"),
        ));
    }

    let key_description = sample_key
        .split_once('|')
        .map(|(_, d)| d.trim())
        .unwrap_or("")
        .to_string();

    let mut key_schema = json!({"type": "string"});
    if !key_description.is_empty() {
        key_schema["description"] = Value::String(key_description);
    }

    let (value_schema, _) = compile_value(sample_value, &format!("{}.<record>", path))?;

    Ok(json!({
        "type": "object",
        "propertyNames": key_schema,
        "additionalProperties": value_schema,
    }))
}

/// Compile one field descriptor. Returns the schema and whether the field is
/// optional in its parent.
fn compile_value(value: &Value, path: &str) -> Result<(Value, bool)> {
    match value {
        Value::String(s) => compile_leaf(s, path),
        Value::Array(items) => compile_array(items, path),
        Value::Object(map) => Ok((compile_object(map, path)?, false)),
        other => Err(Error::schema_with_context(
            "descriptor must be a string, array, or object",
            ErrorContext::new()
                .with_field_path(path)
                .with_details(format!("got: {}", type_name(other)))
                .with_source("schema_compiler"),
        )),
    }
}

fn compile_array(items: &[Value], path: &str) -> Result<(Value, bool)> {
    let mut slots = items.to_vec();
    let optional = matches!(slots.last(), Some(Value::String(s)) if s == "optional");
    if optional {
        slots.pop();
    }

    if slots.len() != 1 {
        return Err(Error::schema_with_context(
            "array descriptor takes exactly one item slot",
            ErrorContext::new()
                .with_field_path(path)
                .with_details(format!("found {} slots", slots.len()))
                .with_source("schema_compiler"),
        ));
    }

    let item_schema = match &slots[0] {
        // An item slot that is itself an array with a trailing "anyOf" is a
        // union of the listed item schemas.
        Value::Array(members)
            if matches!(members.last(), Some(Value::String(s)) if s == "anyOf") =>
        {
            let mut variants = Vec::new();
            for (i, member) in members[..members.len() - 1].iter().enumerate() {
                let (schema, _) = compile_value(member, &format!("{}[anyOf:{}]", path, i))?;
                variants.push(schema);
            }
            if variants.is_empty() {
                return Err(Error::schema_with_context(
                    "anyOf item slot lists no variants",
                    ErrorContext::new()
                        .with_field_path(path)
                        .with_source("schema_compiler"),
                ));
            }
            json!({ "anyOf": variants })
        }
        slot => compile_value(slot, &format!("{}[]", path))?.0,
    };

    let mut schema = json!({
        "type": "array",
        "items": item_schema,
    });
    if optional {
        schema["type"] = json!(["array", "null"]);
    }
    Ok((schema, optional))
}

/// Compile a leaf descriptor string: `"<TypeKeyword>[ optional] | <desc-or-array>"`.
fn compile_leaf(descriptor: &str, path: &str) -> Result<(Value, bool)> {
    let (head, tail) = match descriptor.split_once('|') {
        Some((h, t)) => (h.trim(), t.trim()),
        None => (descriptor.trim(), ""),
    };

    let mut tokens = head.split_whitespace();
    let keyword = tokens.next().unwrap_or("");
    let optional = match tokens.next() {
        None => false,
        Some("optional") => true,
        Some(other) => {
            return Err(Error::schema_with_context(
                format!("unexpected modifier '{}'", other),
                ErrorContext::new()
                    .with_field_path(path)
                    .with_details(descriptor.to_string())
                    .with_source("schema_compiler"),
            ))
        }
    };

    let mut schema = match keyword {
        "String" | "Paragraph" => json!({"type": "string"}),
        "Naming" => json!({"type": "string", "maxLength": 80}),
        "Number" => json!({"type": "number"}),
        "Boolean" => json!({"type": "boolean"}),
        "Enum" => {
            let values: Value = serde_json::from_str(tail).map_err(|e| {
                Error::schema_with_context(
                    "Enum requires a valid JSON array literal",
                    ErrorContext::new()
                        .with_field_path(path)
                        .with_details(format!("{}: {}", tail, e))
                        .with_source("schema_compiler"),
                )
            })?;
            let mut values = match values {
                Value::Array(v) => v,
                _ => {
                    return Err(Error::schema_with_context(
                        "Enum requires a valid JSON array literal",
                        ErrorContext::new()
                            .with_field_path(path)
                            .with_details(tail.to_string())
                            .with_source("schema_compiler"),
                    ))
                }
            };
            if optional && !values.iter().any(|v| v.is_null()) {
                values.push(Value::Null);
            }
            return Ok((json!({ "enum": values }), optional));
        }
        other => {
            return Err(Error::schema_with_context(
                format!("unknown type keyword '{}'", other),
                ErrorContext::new()
                    .with_field_path(path)
                    .with_details(descriptor.to_string())
                    .with_source("schema_compiler"),
            ))
        }
    };

    if optional {
        let base = schema["type"].clone();
        schema["type"] = json!([base, "null"]);
    }
    if !tail.is_empty() {
        schema["description"] = Value::String(tail.to_string());
    }

    Ok((schema, optional))
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compiles_simple_fields() {
        let schema = compile(&json!({
            "title": "Naming | short headline",
            "body": "Paragraph | the full text",
            "score": "Number | relevance 0-1",
            "published": "Boolean | already live?",
        }))
        .unwrap();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["title"]["type"], "string");
        assert_eq!(schema["properties"]["title"]["maxLength"], 80);
        assert_eq!(
            schema["properties"]["title"]["description"],
            "short headline"
        );
        assert_eq!(schema["properties"]["score"]["type"], "number");
        assert_eq!(schema["properties"]["published"]["type"], "boolean");
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
    }

    #[test]
    fn optional_compiles_to_nullable_union_and_leaves_required() {
        let schema = compile(&json!({
            "summary": "String optional | d",
            "name": "String | always here",
        }))
        .unwrap();

        assert_eq!(schema["properties"]["summary"]["type"], json!(["string", "null"]));
        assert_eq!(schema["properties"]["summary"]["description"], "d");
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required, &vec![json!("name")]);
    }

    #[test]
    fn enum_requires_json_array() {
        let schema = compile(&json!({
            "kind": r#"Enum | ["news", "opinion", "satire"]"#,
        }))
        .unwrap();
        assert_eq!(
            schema["properties"]["kind"]["enum"],
            json!(["news", "opinion", "satire"])
        );

        let err = compile(&json!({ "kind": "Enum | not-json" })).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn arrays_and_unions() {
        let schema = compile(&json!({
            "tags": ["Naming | one tag"],
            "notes": ["String | free note", "optional"],
            "mixed": [["String | words", "Number | counts", "anyOf"]],
        }))
        .unwrap();

        assert_eq!(schema["properties"]["tags"]["type"], "array");
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(schema["properties"]["notes"]["type"], json!(["array", "null"]));
        let union = schema["properties"]["mixed"]["items"]["anyOf"]
            .as_array()
            .unwrap();
        assert_eq!(union.len(), 2);
        assert_eq!(union[0]["type"], "string");
        assert_eq!(union[1]["type"], "number");

        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("tags")));
        assert!(!required.contains(&json!("notes")));
    }

    #[test]
    fn record_sentinel_compiles_to_map_schema() {
        let schema = compile(&json!({
            "attributes": {
                "color | the attribute name": {
                    "value": "String | attribute value",
                },
                "__is_record": true,
            },
        }))
        .unwrap();

        let attrs = &schema["properties"]["attributes"];
        assert_eq!(attrs["type"], "object");
        assert_eq!(attrs["propertyNames"]["description"], "the attribute name");
        assert_eq!(
            attrs["additionalProperties"]["properties"]["value"]["type"],
            "string"
        );
        // The sample key must not leak into the compiled schema.
        assert!(attrs.get("properties").is_none());
    }

    #[test]
    fn nested_objects_recurse() {
        let schema = compile(&json!({
            "author": {
                "name": "Naming | author name",
                "age": "Number optional | if known",
            },
        }))
        .unwrap();

        let author = &schema["properties"]["author"];
        assert_eq!(author["type"], "object");
        assert_eq!(author["required"], json!(["name"]));
        assert_eq!(author["properties"]["age"]["type"], json!(["number", "null"]));
    }

    #[test]
    fn rejects_unknown_keywords() {
        let err = compile(&json!({ "x": "Integer | nope" })).unwrap_err();
        assert!(err.to_string().contains("unknown type keyword"));
    }
}
