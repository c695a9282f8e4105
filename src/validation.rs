use std::ops::ControlFlow;
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::compiler::compile_document;
use crate::context::EvaluationContext;
use crate::draft::Draft;
use crate::error::{SchemaError, SchemaResult};
use crate::json_pointer::JsonPointer;
use crate::message::ValidationMessage;
use crate::options::EvaluationOptions;
use crate::patch::JsonPatch;
use crate::reporter::{CallbackReporter, CollectingReporter, ErrorReporter, FailFastReporter};
use crate::results::EvaluationResults;
use crate::schema::SchemaDocument;
use crate::uri::SchemaUri;

/// A compiled schema, ready to validate any number of instances.
///
/// The compiled graph is immutable, so one `JsonSchema` can be shared between
/// threads and used concurrently.
#[derive(Debug)]
pub struct JsonSchema {
    document: SchemaDocument,
    draft: Draft,
}

impl JsonSchema {
    pub fn compile(schema: &Value) -> SchemaResult<Self> {
        Self::compile_with_options(schema, EvaluationOptions::default())
    }

    pub fn compile_with_options(schema: &Value, options: EvaluationOptions) -> SchemaResult<Self> {
        let (document, draft) = compile_document(schema, options)?;
        Ok(Self { document, draft })
    }

    /// The dialect of the root schema.
    pub fn draft(&self) -> Draft {
        self.draft
    }

    /// True when `uri` names a schema inside this compiled document.
    pub fn identifies(&self, uri: &str) -> bool {
        SchemaUri::parse(uri).is_ok_and(|uri| self.document.lookup(&uri).is_some())
    }

    pub(crate) fn document(&self) -> &SchemaDocument {
        &self.document
    }

    /// Stops at the first failure.
    pub fn is_valid(&self, instance: &Value) -> bool {
        let mut reporter = FailFastReporter::default();
        self.run(instance, &mut reporter);
        reporter.error_count() == 0
    }

    /// Every top-level failure, in evaluation order.
    pub fn validate(&self, instance: &Value) -> Vec<ValidationMessage> {
        self.validate_with_patch(instance).0
    }

    /// Validates into a caller-supplied reporter and returns the default-value patch.
    #[instrument(skip_all)]
    pub fn validate_with_reporter(
        &self,
        instance: &Value,
        reporter: &mut dyn ErrorReporter,
    ) -> JsonPatch {
        let patch = self.run(instance, reporter);
        let error_count = reporter.error_count();
        if error_count == 0 {
            debug!("Instance is valid");
        } else {
            info!(error_count, "Validation found errors");
        }
        patch
    }

    /// Streams failures to `callback`, which may stop the run with `ControlFlow::Break`.
    pub fn validate_with_callback<F>(&self, instance: &Value, callback: F) -> JsonPatch
    where
        F: FnMut(&ValidationMessage) -> ControlFlow<()>,
    {
        let mut reporter = CallbackReporter::new(callback);
        self.validate_with_reporter(instance, &mut reporter)
    }

    pub fn validate_with_patch(&self, instance: &Value) -> (Vec<ValidationMessage>, JsonPatch) {
        let mut reporter = CollectingReporter::default();
        let patch = self.validate_with_reporter(instance, &mut reporter);
        (reporter.into_errors(), patch)
    }

    /// The failures as a JSON array of output units.
    pub fn output(&self, instance: &Value) -> Value {
        Value::Array(
            self.validate(instance)
                .iter()
                .map(ValidationMessage::to_json)
                .collect(),
        )
    }

    fn run(&self, instance: &Value, reporter: &mut dyn ErrorReporter) -> JsonPatch {
        let context = EvaluationContext::new(&self.document);
        let mut results = EvaluationResults::default();
        let mut patch = JsonPatch::default();
        self.document.root().validate(
            &context,
            instance,
            &JsonPointer::root(),
            &mut results,
            reporter,
            &mut patch,
        );
        patch
    }
}

impl FromStr for JsonSchema {
    type Err = SchemaError;

    /// Parses schema text and compiles it with default options.
    fn from_str(text: &str) -> SchemaResult<Self> {
        let schema: Value = serde_json::from_str(text)?;
        Self::compile(&schema)
    }
}
