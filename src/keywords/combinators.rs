use serde_json::Value;

use crate::context::EvaluationContext;
use crate::json_pointer::JsonPointer;
use crate::keywords::{KeywordBase, KeywordValidator, keyword_accessors};
use crate::message::ValidationMessage;
use crate::patch::JsonPatch;
use crate::reporter::{CollectingReporter, ErrorReporter};
use crate::results::EvaluationResults;
use crate::schema::{SchemaDocument, SchemaId};
use crate::uri::SchemaUri;

/// Outcome of one branch evaluated in isolation.
struct Branch {
    results: EvaluationResults,
    patch: JsonPatch,
    errors: Vec<ValidationMessage>,
}

impl Branch {
    fn evaluate(
        schema: SchemaId,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
    ) -> Self {
        let mut results = EvaluationResults::default();
        let mut patch = JsonPatch::default();
        let mut reporter = CollectingReporter::default();
        schema.validate(
            context,
            instance,
            instance_location,
            &mut results,
            &mut reporter,
            &mut patch,
        );
        Self {
            results,
            patch,
            errors: reporter.into_errors(),
        }
    }

    fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn accept(self, results: &mut EvaluationResults, patch: &mut JsonPatch) {
        results.merge(&self.results);
        patch.merge(self.patch);
    }
}

/// Which of `allOf`, `anyOf` and `oneOf` a [`CombinatorValidator`] enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    AllOf,
    AnyOf,
    OneOf,
}

impl Combinator {
    pub fn keyword(self) -> &'static str {
        match self {
            Combinator::AllOf => "allOf",
            Combinator::AnyOf => "anyOf",
            Combinator::OneOf => "oneOf",
        }
    }
}

#[derive(Debug)]
pub struct CombinatorValidator {
    base: KeywordBase,
    combinator: Combinator,
    schemas: Vec<SchemaId>,
}

impl CombinatorValidator {
    pub fn new(location: SchemaUri, combinator: Combinator, schemas: Vec<SchemaId>) -> Self {
        Self {
            base: KeywordBase::new(combinator.keyword(), location),
            combinator,
            schemas,
        }
    }
}

impl KeywordValidator for CombinatorValidator {
    keyword_accessors!();

    fn always_fails(&self, document: &SchemaDocument) -> bool {
        match self.combinator {
            Combinator::AllOf => self
                .schemas
                .iter()
                .any(|schema| document.node(*schema).always_fails()),
            Combinator::AnyOf | Combinator::OneOf => self
                .schemas
                .iter()
                .all(|schema| document.node(*schema).always_fails()),
        }
    }

    fn always_succeeds(&self, document: &SchemaDocument) -> bool {
        let mut schemas = self.schemas.iter();
        match self.combinator {
            Combinator::AllOf => schemas.all(|schema| document.node(*schema).always_succeeds()),
            Combinator::AnyOf => schemas.any(|schema| document.node(*schema).always_succeeds()),
            Combinator::OneOf => false,
        }
    }

    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        patch: &mut JsonPatch,
    ) {
        let this_context = context.keyword(self.base.name());
        let branches: Vec<Branch> = self
            .schemas
            .iter()
            .enumerate()
            .map(|(index, schema)| {
                let branch_context = this_context.index(index);
                Branch::evaluate(*schema, &branch_context, instance, instance_location)
            })
            .collect();
        let matched: Vec<usize> = branches
            .iter()
            .enumerate()
            .filter(|(_, branch)| branch.is_valid())
            .map(|(index, _)| index)
            .collect();

        let failure = match self.combinator {
            Combinator::AllOf if matched.len() == branches.len() => None,
            Combinator::AllOf => {
                Some("No schema matched, but all of them are required to match".to_owned())
            }
            Combinator::AnyOf if !matched.is_empty() => None,
            Combinator::AnyOf => {
                Some("No schema matched, but one of them is required to match".to_owned())
            }
            Combinator::OneOf => match matched.as_slice() {
                [_] => None,
                [] => Some(
                    "No schema matched, but exactly one of them is required to match".to_owned(),
                ),
                [first, second, ..] => Some(format!(
                    "More than one schema matched, but exactly one of them is required to match: indices {first} and {second} are valid"
                )),
            },
        };

        if let Some(message) = failure {
            let details = if self.combinator == Combinator::OneOf && matched.len() > 1 {
                Vec::new()
            } else {
                branches
                    .into_iter()
                    .flat_map(|branch| branch.errors)
                    .collect()
            };
            reporter.error(
                self.base
                    .message(context, instance_location, message)
                    .with_details(details),
            );
            return;
        }

        for branch in branches.into_iter().filter(Branch::is_valid) {
            branch.accept(results, patch);
        }
    }
}

#[derive(Debug)]
pub struct NotValidator {
    base: KeywordBase,
    schema: SchemaId,
}

impl NotValidator {
    pub fn new(location: SchemaUri, schema: SchemaId) -> Self {
        Self {
            base: KeywordBase::new("not", location),
            schema,
        }
    }
}

impl KeywordValidator for NotValidator {
    keyword_accessors!();

    fn always_fails(&self, document: &SchemaDocument) -> bool {
        document.node(self.schema).always_succeeds()
    }

    fn always_succeeds(&self, document: &SchemaDocument) -> bool {
        document.node(self.schema).always_fails()
    }

    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        _patch: &mut JsonPatch,
    ) {
        let this_context = context.keyword(self.base.name());
        let branch = Branch::evaluate(self.schema, &this_context, instance, instance_location);
        if branch.is_valid() {
            reporter.error(self.base.message(
                context,
                instance_location,
                "Instance must not be valid against schema",
            ));
            return;
        }
        results.merge(&branch.results);
    }
}

/// `if`, `then` and `else` of one schema. A failing `if` is never reported.
#[derive(Debug)]
pub struct ConditionalValidator {
    base: KeywordBase,
    if_schema: SchemaId,
    then_schema: Option<SchemaId>,
    else_schema: Option<SchemaId>,
}

impl ConditionalValidator {
    pub fn new(
        location: SchemaUri,
        if_schema: SchemaId,
        then_schema: Option<SchemaId>,
        else_schema: Option<SchemaId>,
    ) -> Self {
        Self {
            base: KeywordBase::new("if", location),
            if_schema,
            then_schema,
            else_schema,
        }
    }
}

impl KeywordValidator for ConditionalValidator {
    keyword_accessors!();

    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        patch: &mut JsonPatch,
    ) {
        let if_context = context.keyword("if");
        let condition = Branch::evaluate(self.if_schema, &if_context, instance, instance_location);

        let (keyword, schema) = if condition.is_valid() {
            condition.accept(results, patch);
            ("then", self.then_schema)
        } else {
            ("else", self.else_schema)
        };
        let Some(schema) = schema else {
            return;
        };
        let branch_context = context.keyword(keyword);
        schema.validate(
            &branch_context,
            instance,
            instance_location,
            results,
            reporter,
            patch,
        );
    }
}
