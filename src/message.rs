use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

use crate::json_pointer::JsonPointer;
use crate::uri::SchemaUri;

/// One validation failure, with the failures of nested branches attached as details.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationMessage {
    keyword: String,
    eval_path: JsonPointer,
    schema_location: SchemaUri,
    instance_location: JsonPointer,
    message: String,
    details: Vec<ValidationMessage>,
}

impl ValidationMessage {
    pub fn new(
        keyword: impl Into<String>,
        eval_path: JsonPointer,
        schema_location: SchemaUri,
        instance_location: JsonPointer,
        message: impl Into<String>,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            eval_path,
            schema_location,
            instance_location,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationMessage>) -> Self {
        self.details = details;
        self
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn eval_path(&self) -> &JsonPointer {
        &self.eval_path
    }

    pub fn schema_location(&self) -> &SchemaUri {
        &self.schema_location
    }

    pub fn instance_location(&self) -> &JsonPointer {
        &self.instance_location
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &[ValidationMessage] {
        &self.details
    }

    /// The output unit as JSON:
    /// `{valid, evaluationPath, schemaLocation, instanceLocation, error, details?}`.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_location.is_root() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_location, self.message)
        }
    }
}

impl Serialize for ValidationMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let field_count = if self.details.is_empty() { 5 } else { 6 };
        let mut unit = serializer.serialize_struct("ValidationMessage", field_count)?;
        unit.serialize_field("valid", &false)?;
        unit.serialize_field("evaluationPath", &self.eval_path)?;
        unit.serialize_field("schemaLocation", &self.schema_location)?;
        unit.serialize_field("instanceLocation", &self.instance_location)?;
        unit.serialize_field("error", &self.message)?;
        if !self.details.is_empty() {
            unit.serialize_field("details", &self.details)?;
        }
        unit.end()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample(message: &str) -> Result<ValidationMessage, Box<dyn std::error::Error>> {
        Ok(ValidationMessage::new(
            "minimum",
            JsonPointer::root()
                .join_key("allOf")
                .join_index(0)
                .join_key("minimum"),
            SchemaUri::parse("https://example.com/s.json#/allOf/0/minimum")?,
            JsonPointer::root().join_key("count"),
            message,
        ))
    }

    #[test]
    fn output_unit_shape() -> Result<(), Box<dyn std::error::Error>> {
        let message = sample("-1 is less than minimum 0")?;

        assert_eq!(
            message.to_json(),
            json!({
                "valid": false,
                "evaluationPath": "/allOf/0/minimum",
                "schemaLocation": "https://example.com/s.json#/allOf/0/minimum",
                "instanceLocation": "/count",
                "error": "-1 is less than minimum 0"
            })
        );
        Ok(())
    }

    #[test]
    fn details_are_nested() -> Result<(), Box<dyn std::error::Error>> {
        let inner = sample("inner")?;
        let outer = sample("outer")?.with_details(vec![inner]);

        let json = outer.to_json();
        assert_eq!(json["details"][0]["error"], json!("inner"));
        assert_eq!(outer.to_string(), "/count: outer");
        Ok(())
    }
}
