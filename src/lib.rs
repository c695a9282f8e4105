pub mod compiler;
pub mod context;
pub mod draft;
pub mod error;
pub mod format;
pub mod json_pointer;
pub mod keywords;
pub mod message;
pub mod options;
pub mod patch;
pub mod reporter;
pub mod results;
pub mod schema;
pub mod uri;
pub mod validation;
pub mod value;

pub use draft::{Draft, Vocabulary};
pub use error::{PatchError, SchemaError, SchemaResult};
pub use format::{FormatChecker, FormatRegistry};
pub use json_pointer::JsonPointer;
pub use message::ValidationMessage;
pub use options::{EvaluationOptions, SchemaResolver};
pub use patch::{JsonPatch, PatchOperation};
pub use reporter::{CallbackReporter, CollectingReporter, ErrorReporter, FailFastReporter};
pub use uri::SchemaUri;
pub use validation::JsonSchema;

use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Compiles a schema with default options.
pub fn compile(schema: &Value) -> SchemaResult<JsonSchema> {
    JsonSchema::compile(schema)
}

/// One-shot check of `instance` against `schema`.
///
/// Compiles on every call; keep a [`JsonSchema`] around to validate repeatedly.
pub fn is_valid(schema: &Value, instance: &Value) -> SchemaResult<bool> {
    Ok(JsonSchema::compile(schema)?.is_valid(instance))
}

/// Compiles `schema` and returns every failure of `instance` against it.
#[instrument(skip(schema, instance))]
pub fn validate(schema: &Value, instance: &Value) -> SchemaResult<Vec<ValidationMessage>> {
    let compiled = match JsonSchema::compile(schema) {
        Ok(compiled) => compiled,
        Err(error) => {
            warn!(%error, "Schema failed to compile");
            return Err(error);
        }
    };
    debug!(draft = %compiled.draft(), "Schema ready, validating instance");
    Ok(compiled.validate(instance))
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs::File;
    use std::io::BufReader;
    use std::sync::Arc;
    use std::thread;

    const TEST_CONTROL_JSON: &str = r#"{
  "schema": "here",
  "service": "api",
  "version": "1.2.3",
  "runtime": {
    "type": "docker",
    "docker": {
      "image": "nginx",
      "tag": "1.25"
    }
  },
  "ports": [
    { "containerPort": 8080, "protocol": "tcp" }
  ],
  "env": {
    "MODE": "production"
  }
}"#;

    const TEST_ERROR_JSON: &str = r#"{
  "schema": "here",
  "service": "api",
  "version": "1.2.3",
  "runtime": {
    "type": "docker",
    "ocker": {
      "image": "nginx",
      "tag": "1.25"
    }
  },
  "ports": [
    { "containerPort": 8080, "protocol": "tcp" }
  ],
  "env": {
    "MODE": "production"
  }
}"#;

    struct TestSchema {
        json_schema: Value,
    }

    impl TestSchema {
        fn new() -> Result<TestSchema, Box<dyn std::error::Error>> {
            let file = File::open("schemas/service.schema.json")?;
            let reader = BufReader::new(file);
            let json_schema: Value = serde_json::from_reader(reader)?;

            Ok(TestSchema { json_schema })
        }

        fn compile(&self) -> SchemaResult<JsonSchema> {
            JsonSchema::compile(&self.json_schema)
        }
    }

    #[test]
    fn control_document_is_valid() -> Result<(), Box<dyn std::error::Error>> {
        let schema = TestSchema::new()?.compile()?;
        let instance: Value = serde_json::from_str(TEST_CONTROL_JSON)?;

        let (errors, patch) = schema.validate_with_patch(&instance);

        assert_eq!(errors, Vec::new());
        assert_eq!(
            patch.to_json(),
            json!([{"op": "add", "path": "/replicas", "value": 1}])
        );
        Ok(())
    }

    #[test]
    fn misspelled_key_is_located() -> Result<(), Box<dyn std::error::Error>> {
        let schema = TestSchema::new()?.compile()?;
        let instance: Value = serde_json::from_str(TEST_ERROR_JSON)?;

        let errors = schema.validate(&instance);
        let found: Vec<(String, String)> = errors
            .iter()
            .map(|error| (error.instance_location().to_string(), error.message().to_owned()))
            .collect();

        assert_eq!(
            found,
            vec![
                (
                    "/runtime/ocker".to_owned(),
                    "Additional property 'ocker' not allowed by schema.".to_owned()
                ),
                (
                    "/runtime".to_owned(),
                    "Required property 'docker' not found.".to_owned()
                ),
            ]
        );
        assert_eq!(
            errors[0].eval_path().to_string(),
            "/properties/runtime/$ref/additionalProperties"
        );
        Ok(())
    }

    #[test]
    fn defaults_materialize_into_the_instance() -> Result<(), Box<dyn std::error::Error>> {
        let schema = TestSchema::new()?.compile()?;
        let mut instance = json!({
            "service": "api",
            "version": "1.0.0",
            "runtime": {"type": "docker", "docker": {"image": "nginx"}},
            "ports": [{"containerPort": 80}]
        });

        let (errors, patch) = schema.validate_with_patch(&instance);
        assert!(errors.is_empty());
        patch.apply(&mut instance)?;

        assert_eq!(instance["runtime"]["docker"]["tag"], json!("latest"));
        assert_eq!(instance["ports"][0]["protocol"], json!("tcp"));
        assert_eq!(instance["replicas"], json!(1));
        Ok(())
    }

    #[test]
    fn validation_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
        let schema = TestSchema::new()?.compile()?;
        let instance: Value = serde_json::from_str(TEST_ERROR_JSON)?;

        assert_eq!(schema.validate(&instance), schema.validate(&instance));
        Ok(())
    }

    #[test]
    fn false_schema_rejects_everything() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!(false))?;
        let document = schema.document();

        assert!(document.node(document.root()).always_fails());
        for instance in [json!({}), json!([]), json!(null), json!(1), json!("x")] {
            assert_eq!(schema.validate(&instance).len(), 1);
        }
        Ok(())
    }

    #[test]
    fn additional_property_is_named() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({
            "properties": {"a": {}},
            "additionalProperties": false
        }))?;

        let errors = schema.validate(&json!({"a": 1, "b": 2}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].instance_location().to_string(), "/b");
        assert!(errors[0].message().contains("'b'"));
        assert!(schema.validate(&json!({"a": 1})).is_empty());
        Ok(())
    }

    #[test]
    fn all_of_reports_failing_branch() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({"allOf": [{"minimum": 0}, {"maximum": 10}]}))?;

        assert!(schema.validate(&json!(5)).is_empty());
        for (instance, keyword) in [(json!(-1), "minimum"), (json!(20), "maximum")] {
            let errors = schema.validate(&instance);
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].keyword(), "allOf");
            assert_eq!(errors[0].details().len(), 1);
            assert_eq!(errors[0].details()[0].keyword(), keyword);
        }
        Ok(())
    }

    #[test]
    fn one_of_with_two_matches_is_one_error() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({"oneOf": [{"type": "integer"}, {"minimum": 0}]}))?;

        assert_eq!(schema.validate(&json!(3)).len(), 1);
        assert!(schema.validate(&json!(-3)).is_empty());
        Ok(())
    }

    #[test]
    fn unevaluated_property_is_caught() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({
            "properties": {"a": {}},
            "unevaluatedProperties": false
        }))?;

        let errors = schema.validate(&json!({"a": 1, "b": 2}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].keyword(), "unevaluatedProperties");
        assert_eq!(errors[0].instance_location().to_string(), "/b");
        Ok(())
    }

    #[test]
    fn default_patch_only_for_missing_properties() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({"properties": {"x": {"default": 5}}}))?;

        let (_, patch) = schema.validate_with_patch(&json!({}));
        assert_eq!(
            patch.to_json(),
            json!([{"op": "add", "path": "/x", "value": 5}])
        );
        let (_, patch) = schema.validate_with_patch(&json!({"x": 5}));
        assert!(patch.is_empty());
        Ok(())
    }

    #[test]
    fn contains_bounds() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({
            "contains": {"multipleOf": 2},
            "minContains": 2,
            "maxContains": 3
        }))?;

        assert!(schema.validate(&json!([1, 2, 3, 4])).is_empty());
        let errors = schema.validate(&json!([1, 3, 5]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].keyword(), "minContains");
        Ok(())
    }

    #[test]
    fn multiple_of_tolerates_binary_fractions() -> Result<(), Box<dyn std::error::Error>> {
        assert!(is_valid(&json!({"multipleOf": 0.1}), &json!(0.3))?);
        assert!(is_valid(&json!({"multipleOf": 0.7}), &json!(0))?);
        assert!(!is_valid(&json!({"multipleOf": 0.1}), &json!(0.35))?);
        Ok(())
    }

    #[test]
    fn free_functions_propagate_schema_errors() {
        assert!(compile(&json!(1)).is_err());
        assert!(validate(&json!({"type": 5}), &json!(1)).is_err());
        assert!(matches!(
            validate(&json!({"type": "string"}), &json!(1)).as_deref(),
            Ok([error]) if error.keyword() == "type"
        ));
    }

    #[test]
    fn compiled_schema_is_shareable() -> Result<(), Box<dyn std::error::Error>> {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JsonSchema>();

        let schema = Arc::new(TestSchema::new()?.compile()?);
        let control: Value = serde_json::from_str(TEST_CONTROL_JSON)?;
        let broken: Value = serde_json::from_str(TEST_ERROR_JSON)?;

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let schema = Arc::clone(&schema);
                let instance = if worker % 2 == 0 {
                    control.clone()
                } else {
                    broken.clone()
                };
                thread::spawn(move || schema.validate(&instance).len())
            })
            .collect();
        let counts = handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| "validation thread panicked"))
            .collect::<Result<Vec<_>, _>>()?;

        assert_eq!(counts, vec![0, 2, 0, 2]);
        Ok(())
    }
}
