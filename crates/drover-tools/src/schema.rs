// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::{json, Value};
use thiserror::Error;

/// Argument shape declared by a tool.
///
/// A small algebraic subset of JSON Schema: enough to describe every tool
/// argument object, validate model-supplied JSON against it, and render the
/// JSON-Schema form sent to the model.  No runtime reflection is involved;
/// tools build these with the constructors below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<Schema>),
    Object(Vec<Field>),
}

/// One named field of an object schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub description: String,
    pub schema: Schema,
    pub required: bool,
}

impl Field {
    pub fn required(name: impl Into<String>, description: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            required: false,
        }
    }
}

/// Arguments failed validation against a tool's declared schema.
///
/// `path` points at the offending value (`$`, `$.text`, `$.items[2]`).
#[derive(Debug, Clone, Error)]
#[error("invalid arguments at {path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl Schema {
    /// Object schema from a field list.
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    /// Validate a parsed JSON value against this schema.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.validate_at("$", value)
    }

    fn validate_at(&self, path: &str, value: &Value) -> Result<(), ValidationError> {
        match self {
            Self::String => match value {
                Value::String(_) => Ok(()),
                other => Err(ValidationError::new(path, type_mismatch("string", other))),
            },
            Self::Integer => {
                if value.as_i64().is_some() || value.as_u64().is_some() {
                    Ok(())
                } else {
                    Err(ValidationError::new(path, type_mismatch("integer", value)))
                }
            }
            Self::Number => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err(ValidationError::new(path, type_mismatch("number", value)))
                }
            }
            Self::Boolean => match value {
                Value::Bool(_) => Ok(()),
                other => Err(ValidationError::new(path, type_mismatch("boolean", other))),
            },
            Self::Array(item) => match value {
                Value::Array(items) => {
                    for (i, v) in items.iter().enumerate() {
                        item.validate_at(&format!("{path}[{i}]"), v)?;
                    }
                    Ok(())
                }
                other => Err(ValidationError::new(path, type_mismatch("array", other))),
            },
            Self::Object(fields) => match value {
                Value::Object(map) => {
                    for field in fields {
                        match map.get(&field.name) {
                            Some(v) => {
                                field
                                    .schema
                                    .validate_at(&format!("{path}.{}", field.name), v)?;
                            }
                            None if field.required => {
                                return Err(ValidationError::new(
                                    path,
                                    format!("missing required field `{}`", field.name),
                                ));
                            }
                            None => {}
                        }
                    }
                    // Reject keys the schema does not know; a hallucinated
                    // argument is a model error the model should see.
                    for key in map.keys() {
                        if !fields.iter().any(|f| &f.name == key) {
                            return Err(ValidationError::new(
                                path,
                                format!("unknown field `{key}`"),
                            ));
                        }
                    }
                    Ok(())
                }
                other => Err(ValidationError::new(path, type_mismatch("object", other))),
            },
        }
    }

    /// Render the JSON-Schema form of this schema, as sent to the model.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer => json!({ "type": "integer" }),
            Self::Number => json!({ "type": "number" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Array(item) => json!({ "type": "array", "items": item.to_json_schema() }),
            Self::Object(fields) => {
                let mut properties = serde_json::Map::new();
                let mut required = Vec::new();
                for field in fields {
                    let mut prop = field.schema.to_json_schema();
                    if !field.description.is_empty() {
                        prop["description"] = Value::String(field.description.clone());
                    }
                    properties.insert(field.name.clone(), prop);
                    if field.required {
                        required.push(Value::String(field.name.clone()));
                    }
                }
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }
}

fn type_mismatch(expected: &str, got: &Value) -> String {
    let got = match got {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("expected {expected}, got {got}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_schema() -> Schema {
        Schema::object([Field::required("text", "text to echo", Schema::String)])
    }

    fn add_schema() -> Schema {
        Schema::object([
            Field::required("a", "left operand", Schema::Integer),
            Field::required("b", "right operand", Schema::Integer),
        ])
    }

    // ── Accepting valid input ─────────────────────────────────────────────────

    #[test]
    fn valid_object_passes() {
        assert!(echo_schema().validate(&json!({"text": "x"})).is_ok());
    }

    #[test]
    fn optional_field_may_be_absent() {
        let s = Schema::object([
            Field::required("path", "", Schema::String),
            Field::optional("limit", "", Schema::Integer),
        ]);
        assert!(s.validate(&json!({"path": "/tmp"})).is_ok());
        assert!(s.validate(&json!({"path": "/tmp", "limit": 3})).is_ok());
    }

    #[test]
    fn nested_array_of_objects_validates() {
        let s = Schema::object([Field::required(
            "items",
            "",
            Schema::Array(Box::new(Schema::object([Field::required(
                "id",
                "",
                Schema::Integer,
            )]))),
        )]);
        assert!(s.validate(&json!({"items": [{"id": 1}, {"id": 2}]})).is_ok());
    }

    #[test]
    fn integer_accepts_u64_range() {
        let s = Schema::object([Field::required("n", "", Schema::Integer)]);
        assert!(s.validate(&json!({"n": u64::MAX})).is_ok());
    }

    // ── Rejecting invalid input ───────────────────────────────────────────────

    #[test]
    fn wrong_type_is_rejected_with_path() {
        let err = add_schema().validate(&json!({"a": "x", "b": 1})).unwrap_err();
        assert_eq!(err.path, "$.a");
        assert!(err.message.contains("expected integer"));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = echo_schema().validate(&json!({})).unwrap_err();
        assert!(err.message.contains("missing required field `text`"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = echo_schema()
            .validate(&json!({"text": "x", "bogus": 1}))
            .unwrap_err();
        assert!(err.message.contains("unknown field `bogus`"));
    }

    #[test]
    fn float_is_not_an_integer() {
        let err = add_schema().validate(&json!({"a": 1.5, "b": 1})).unwrap_err();
        assert_eq!(err.path, "$.a");
    }

    #[test]
    fn non_object_top_level_is_rejected() {
        let err = echo_schema().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.path, "$");
        assert!(err.message.contains("expected object"));
    }

    #[test]
    fn array_element_error_carries_index_in_path() {
        let s = Schema::object([Field::required(
            "xs",
            "",
            Schema::Array(Box::new(Schema::Integer)),
        )]);
        let err = s.validate(&json!({"xs": [1, "two"]})).unwrap_err();
        assert_eq!(err.path, "$.xs[1]");
    }

    // ── JSON-Schema rendering ─────────────────────────────────────────────────

    #[test]
    fn json_schema_lists_properties_and_required() {
        let rendered = add_schema().to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["a"]["type"], "integer");
        assert_eq!(rendered["required"], json!(["a", "b"]));
    }

    #[test]
    fn json_schema_includes_field_descriptions() {
        let rendered = echo_schema().to_json_schema();
        assert_eq!(rendered["properties"]["text"]["description"], "text to echo");
    }

    #[test]
    fn json_schema_optional_fields_not_required() {
        let s = Schema::object([Field::optional("limit", "", Schema::Integer)]);
        let rendered = s.to_json_schema();
        assert_eq!(rendered["required"], json!([]));
    }
}
