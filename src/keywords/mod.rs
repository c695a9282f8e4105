//! Keyword validators, one type per JSON Schema keyword (or keyword family).
//!
//! Every validator ignores instances of a JSON type its keyword does not apply to.

use std::fmt;

use serde_json::Value;

use crate::context::EvaluationContext;
use crate::json_pointer::JsonPointer;
use crate::message::ValidationMessage;
use crate::patch::JsonPatch;
use crate::reporter::ErrorReporter;
use crate::results::EvaluationResults;
use crate::schema::SchemaDocument;
use crate::uri::SchemaUri;

/// Implements the name/location accessors from a `base: KeywordBase` field.
macro_rules! keyword_accessors {
    () => {
        fn keyword_name(&self) -> &str {
            self.base.name()
        }

        fn schema_location(&self) -> &crate::uri::SchemaUri {
            self.base.location()
        }
    };
}

pub(crate) use keyword_accessors;

pub mod array;
pub mod combinators;
pub mod content;
pub mod generic;
pub mod numeric;
pub mod object;
pub mod reference;
pub mod string;

pub trait KeywordValidator: fmt::Debug + Send + Sync {
    fn keyword_name(&self) -> &str;

    fn schema_location(&self) -> &SchemaUri;

    /// True when the keyword rejects every instance it applies to.
    fn always_fails(&self, _document: &SchemaDocument) -> bool {
        false
    }

    /// True when the keyword accepts every instance.
    fn always_succeeds(&self, _document: &SchemaDocument) -> bool {
        false
    }

    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        patch: &mut JsonPatch,
    );
}

pub type BoxedKeyword = Box<dyn KeywordValidator>;

/// Name and declaration site shared by every keyword validator.
#[derive(Debug, Clone)]
pub struct KeywordBase {
    name: &'static str,
    location: SchemaUri,
}

impl KeywordBase {
    pub fn new(name: &'static str, location: SchemaUri) -> Self {
        Self { name, location }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn location(&self) -> &SchemaUri {
        &self.location
    }

    /// Builds a message for this keyword. `context` is the context the keyword was
    /// called with; the keyword name is appended to its evaluation path.
    pub fn message(
        &self,
        context: &EvaluationContext<'_>,
        instance_location: &JsonPointer,
        message: impl Into<String>,
    ) -> ValidationMessage {
        let mut eval_path = context.eval_path();
        eval_path.push_key(self.name);
        ValidationMessage::new(
            self.name,
            eval_path,
            self.location.clone(),
            instance_location.clone(),
            message,
        )
    }
}

/// Direction of a size keyword (`minLength` vs `maxLength` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Min,
    Max,
}

impl Limit {
    pub(crate) fn is_violated(self, actual: usize, limit: usize) -> bool {
        match self {
            Limit::Min => actual < limit,
            Limit::Max => actual > limit,
        }
    }
}

/// Shorthand for `instance` rendered inside messages.
pub(crate) fn display_value(instance: &Value) -> String {
    match instance {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
