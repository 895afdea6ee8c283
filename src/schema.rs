//! Parameter schema served by the prediction service at `GET /params`.

use crate::error::{PredictionFormError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Primitive type tag of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "str")]
    Str,
    #[serde(rename = "int")]
    Int,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Str => "str",
            FieldType::Int => "int",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name → type tag. Ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSchema {
    fields: BTreeMap<String, FieldType>,
}

impl ParamSchema {
    pub fn new(fields: impl IntoIterator<Item = (String, FieldType)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    /// Parse a schema body, rejecting anything that is not an object of type tags
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(PredictionFormError::Schema {
                message: format!("expected a JSON object, got {}", json_kind(&value)),
            });
        };

        let mut fields = BTreeMap::new();
        for (name, tag) in map {
            let field_type = match tag.as_str() {
                Some("str") => FieldType::Str,
                Some("int") => FieldType::Int,
                _ => {
                    return Err(PredictionFormError::Schema {
                        message: format!("field '{name}' has unsupported type tag {tag}"),
                    });
                }
            };
            fields.insert(name, field_type);
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn get(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_reads_type_tags() {
        let schema = ParamSchema::from_json(json!({"age": "int", "city": "str"})).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("age"), Some(FieldType::Int));
        assert_eq!(schema.get("city"), Some(FieldType::Str));
        let names: Vec<_> = schema.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["age", "city"]);
    }

    #[test]
    fn test_from_json_rejects_unknown_tag() {
        let err = ParamSchema::from_json(json!({"age": "float"})).unwrap_err();
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = ParamSchema::from_json(json!(["age"])).unwrap_err();
        assert!(matches!(err, PredictionFormError::Schema { .. }));
    }

    #[test]
    fn test_serializes_back_to_wire_shape() {
        let schema = ParamSchema::new([("YEAR_BUILT".to_string(), FieldType::Int)]);
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"YEAR_BUILT": "int"})
        );
    }
}
