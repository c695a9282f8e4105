use serde_json::Value;

use crate::context::EvaluationContext;
use crate::json_pointer::JsonPointer;
use crate::keywords::{KeywordBase, KeywordValidator, display_value, keyword_accessors};
use crate::patch::JsonPatch;
use crate::reporter::ErrorReporter;
use crate::results::EvaluationResults;
use crate::uri::SchemaUri;
use crate::value::{JsonType, json_equal};

#[derive(Debug)]
pub struct TypeValidator {
    base: KeywordBase,
    expected: Vec<JsonType>,
}

impl TypeValidator {
    pub fn new(location: SchemaUri, expected: Vec<JsonType>) -> Self {
        Self {
            base: KeywordBase::new("type", location),
            expected,
        }
    }

    fn describe_expected(&self) -> String {
        let names: Vec<&str> = self.expected.iter().map(|t| t.as_str()).collect();
        match names.as_slice() {
            [] => "nothing".to_owned(),
            [only] => (*only).to_owned(),
            [init @ .., last] => format!("{} or {}", init.join(", "), last),
        }
    }
}

impl KeywordValidator for TypeValidator {
    keyword_accessors!();

    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        _results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        _patch: &mut JsonPatch,
    ) {
        if self.expected.iter().any(|t| t.matches(instance)) {
            return;
        }
        reporter.error(self.base.message(
            context,
            instance_location,
            format!(
                "Expected {}, found {}",
                self.describe_expected(),
                JsonType::of(instance)
            ),
        ));
    }
}

#[derive(Debug)]
pub struct EnumValidator {
    base: KeywordBase,
    values: Vec<Value>,
}

impl EnumValidator {
    pub fn new(location: SchemaUri, values: Vec<Value>) -> Self {
        Self {
            base: KeywordBase::new("enum", location),
            values,
        }
    }
}

impl KeywordValidator for EnumValidator {
    keyword_accessors!();

    fn always_fails(&self, _document: &crate::schema::SchemaDocument) -> bool {
        self.values.is_empty()
    }

    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        _results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        _patch: &mut JsonPatch,
    ) {
        if self.values.iter().any(|value| json_equal(value, instance)) {
            return;
        }
        reporter.error(self.base.message(
            context,
            instance_location,
            format!("'{}' is not a valid enum value.", display_value(instance)),
        ));
    }
}

#[derive(Debug)]
pub struct ConstValidator {
    base: KeywordBase,
    value: Value,
}

impl ConstValidator {
    pub fn new(location: SchemaUri, value: Value) -> Self {
        Self {
            base: KeywordBase::new("const", location),
            value,
        }
    }
}

impl KeywordValidator for ConstValidator {
    keyword_accessors!();

    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        _results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        _patch: &mut JsonPatch,
    ) {
        if json_equal(&self.value, instance) {
            return;
        }
        reporter.error(self.base.message(
            context,
            instance_location,
            format!("Instance is not const {}", self.value),
        ));
    }
}
