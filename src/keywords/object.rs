use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde_json::{Map, Value};

use crate::context::EvaluationContext;
use crate::json_pointer::JsonPointer;
use crate::keywords::{KeywordBase, KeywordValidator, Limit, keyword_accessors};
use crate::patch::JsonPatch;
use crate::reporter::{CollectingReporter, ErrorReporter};
use crate::results::EvaluationResults;
use crate::schema::{SchemaDocument, SchemaId};
use crate::uri::SchemaUri;

fn stop_early(reporter: &dyn ErrorReporter, before: usize) -> bool {
    reporter.error_count() > before && reporter.fail_early()
}

/// `minProperties` / `maxProperties`.
#[derive(Debug)]
pub struct PropertyCountValidator {
    base: KeywordBase,
    limit_kind: Limit,
    limit: usize,
}

impl PropertyCountValidator {
    pub fn new(location: SchemaUri, limit_kind: Limit, limit: usize) -> Self {
        let name = match limit_kind {
            Limit::Min => "minProperties",
            Limit::Max => "maxProperties",
        };
        Self {
            base: KeywordBase::new(name, location),
            limit_kind,
            limit,
        }
    }
}

impl KeywordValidator for PropertyCountValidator {
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
        let Value::Object(object) = instance else {
            return;
        };
        if !self.limit_kind.is_violated(object.len(), self.limit) {
            return;
        }
        let bound = match self.limit_kind {
            Limit::Min => "Minimum",
            Limit::Max => "Maximum",
        };
        let (limit, found) = (self.limit, object.len());
        reporter.error(self.base.message(
            context,
            instance_location,
            format!("{bound} properties: {limit}, found: {found}"),
        ));
    }
}

#[derive(Debug)]
pub struct RequiredValidator {
    base: KeywordBase,
    required: Vec<String>,
}

impl RequiredValidator {
    pub fn new(location: SchemaUri, required: Vec<String>) -> Self {
        Self {
            base: KeywordBase::new("required", location),
            required,
        }
    }
}

impl KeywordValidator for RequiredValidator {
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
        let Value::Object(object) = instance else {
            return;
        };
        for key in &self.required {
            if object.contains_key(key) {
                continue;
            }
            reporter.error(self.base.message(
                context,
                instance_location,
                format!("Required property '{key}' not found."),
            ));
            if reporter.fail_early() {
                return;
            }
        }
    }
}

/// Reports each property in `required` that is missing while `trigger` is present.
fn check_dependent_required(
    base: &KeywordBase,
    context: &EvaluationContext<'_>,
    object: &Map<String, Value>,
    instance_location: &JsonPointer,
    trigger: &str,
    required: &[String],
    reporter: &mut dyn ErrorReporter,
) -> bool {
    for key in required {
        if object.contains_key(key) {
            continue;
        }
        reporter.error(base.message(
            context,
            instance_location,
            format!("Property '{key}' is required when '{trigger}' is present."),
        ));
        if reporter.fail_early() {
            return false;
        }
    }
    true
}

#[derive(Debug)]
pub struct DependentRequiredValidator {
    base: KeywordBase,
    dependencies: BTreeMap<String, Vec<String>>,
}

impl DependentRequiredValidator {
    pub fn new(location: SchemaUri, dependencies: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            base: KeywordBase::new("dependentRequired", location),
            dependencies,
        }
    }
}

impl KeywordValidator for DependentRequiredValidator {
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
        let Value::Object(object) = instance else {
            return;
        };
        for (trigger, required) in &self.dependencies {
            if object.contains_key(trigger)
                && !check_dependent_required(
                    &self.base,
                    context,
                    object,
                    instance_location,
                    trigger,
                    required,
                    reporter,
                )
            {
                return;
            }
        }
    }
}

/// Applies each schema to the whole object when its trigger property is present.
#[allow(clippy::too_many_arguments)]
fn apply_dependent_schemas(
    this_context: &EvaluationContext<'_>,
    schemas: &BTreeMap<String, SchemaId>,
    object: &Map<String, Value>,
    instance: &Value,
    instance_location: &JsonPointer,
    results: &mut EvaluationResults,
    reporter: &mut dyn ErrorReporter,
    patch: &mut JsonPatch,
) {
    for (trigger, schema) in schemas {
        if !object.contains_key(trigger) {
            continue;
        }
        let branch = this_context.key(trigger);
        let before = reporter.error_count();
        schema.validate(
            &branch,
            instance,
            instance_location,
            results,
            reporter,
            patch,
        );
        if stop_early(reporter, before) {
            return;
        }
    }
}

#[derive(Debug)]
pub struct DependentSchemasValidator {
    base: KeywordBase,
    schemas: BTreeMap<String, SchemaId>,
}

impl DependentSchemasValidator {
    pub fn new(location: SchemaUri, schemas: BTreeMap<String, SchemaId>) -> Self {
        Self {
            base: KeywordBase::new("dependentSchemas", location),
            schemas,
        }
    }
}

impl KeywordValidator for DependentSchemasValidator {
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
        let Value::Object(object) = instance else {
            return;
        };
        let this_context = context.keyword(self.base.name());
        apply_dependent_schemas(
            &this_context,
            &self.schemas,
            object,
            instance,
            instance_location,
            results,
            reporter,
            patch,
        );
    }
}

/// draft-07 `dependencies`: array values act as `dependentRequired`, schema values
/// as `dependentSchemas`.
#[derive(Debug)]
pub struct DependenciesValidator {
    base: KeywordBase,
    required: BTreeMap<String, Vec<String>>,
    schemas: BTreeMap<String, SchemaId>,
}

impl DependenciesValidator {
    pub fn new(
        location: SchemaUri,
        required: BTreeMap<String, Vec<String>>,
        schemas: BTreeMap<String, SchemaId>,
    ) -> Self {
        Self {
            base: KeywordBase::new("dependencies", location),
            required,
            schemas,
        }
    }
}

impl KeywordValidator for DependenciesValidator {
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
        let Value::Object(object) = instance else {
            return;
        };
        for (trigger, required) in &self.required {
            if object.contains_key(trigger)
                && !check_dependent_required(
                    &self.base,
                    context,
                    object,
                    instance_location,
                    trigger,
                    required,
                    reporter,
                )
            {
                return;
            }
        }
        let this_context = context.keyword(self.base.name());
        apply_dependent_schemas(
            &this_context,
            &self.schemas,
            object,
            instance,
            instance_location,
            results,
            reporter,
            patch,
        );
    }
}

#[derive(Debug)]
pub struct PropertyNamesValidator {
    base: KeywordBase,
    schema: SchemaId,
}

impl PropertyNamesValidator {
    pub fn new(location: SchemaUri, schema: SchemaId) -> Self {
        Self {
            base: KeywordBase::new("propertyNames", location),
            schema,
        }
    }
}

impl KeywordValidator for PropertyNamesValidator {
    keyword_accessors!();

    fn always_succeeds(&self, document: &SchemaDocument) -> bool {
        document.node(self.schema).always_succeeds()
    }

    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        _results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        patch: &mut JsonPatch,
    ) {
        let Value::Object(object) = instance else {
            return;
        };
        let node = context.document().node(self.schema);
        if object.is_empty() || node.always_succeeds() {
            return;
        }
        if node.always_fails() {
            reporter.error(self.base.message(
                context,
                instance_location,
                "Instance has properties but the schema does not allow any property names.",
            ));
            return;
        }

        let this_context = context.keyword(self.base.name());
        for key in object.keys() {
            let name_context = this_context.element();
            let mut name_results = EvaluationResults::default();
            let before = reporter.error_count();
            self.schema.validate(
                &name_context,
                &Value::String(key.clone()),
                instance_location,
                &mut name_results,
                reporter,
                patch,
            );
            if stop_early(reporter, before) {
                return;
            }
        }
    }
}

#[derive(Debug)]
pub struct PropertiesValidator {
    base: KeywordBase,
    properties: BTreeMap<String, SchemaId>,
}

impl PropertiesValidator {
    pub fn new(location: SchemaUri, properties: BTreeMap<String, SchemaId>) -> Self {
        Self {
            base: KeywordBase::new("properties", location),
            properties,
        }
    }

    /// Validates declared properties, marks them allowed, then records defaults
    /// for declared properties the instance lacks. Returns false to stop early.
    #[allow(clippy::too_many_arguments)]
    fn apply<'i>(
        &self,
        context: &EvaluationContext<'_>,
        object: &'i Map<String, Value>,
        instance_location: &JsonPointer,
        results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        patch: &mut JsonPatch,
        allowed: &mut HashSet<&'i str>,
    ) -> bool {
        let this_context = context.keyword(self.base.name());
        for (key, value) in object {
            let Some(schema) = self.properties.get(key) else {
                continue;
            };
            allowed.insert(key);
            let property_context = this_context.property(key);
            let mut property_results = EvaluationResults::default();
            let before = reporter.error_count();
            schema.validate(
                &property_context,
                value,
                &instance_location.join_key(key),
                &mut property_results,
                reporter,
                patch,
            );
            if reporter.error_count() == before {
                if context.require_evaluated_properties() {
                    results.evaluated_properties.insert(key.clone());
                }
            } else if reporter.fail_early() {
                return false;
            }
        }

        let document = context.document();
        for (name, schema) in &self.properties {
            if object.contains_key(name) {
                continue;
            }
            if let Some(default) = document.node(*schema).default_value() {
                patch.add(&instance_location.join_key(name), default.clone());
            }
        }
        true
    }
}

impl KeywordValidator for PropertiesValidator {
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
        let Value::Object(object) = instance else {
            return;
        };
        let mut allowed = HashSet::new();
        self.apply(
            context,
            object,
            instance_location,
            results,
            reporter,
            patch,
            &mut allowed,
        );
    }
}

#[derive(Debug)]
pub struct PatternProperty {
    pattern: String,
    regex: Regex,
    schema: SchemaId,
}

impl PatternProperty {
    pub fn new(pattern: String, regex: Regex, schema: SchemaId) -> Self {
        Self {
            pattern,
            regex,
            schema,
        }
    }
}

#[derive(Debug)]
pub struct PatternPropertiesValidator {
    base: KeywordBase,
    patterns: Vec<PatternProperty>,
}

impl PatternPropertiesValidator {
    pub fn new(location: SchemaUri, patterns: Vec<PatternProperty>) -> Self {
        Self {
            base: KeywordBase::new("patternProperties", location),
            patterns,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply<'i>(
        &self,
        context: &EvaluationContext<'_>,
        object: &'i Map<String, Value>,
        instance_location: &JsonPointer,
        results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        patch: &mut JsonPatch,
        allowed: &mut HashSet<&'i str>,
    ) -> bool {
        let this_context = context.keyword(self.base.name());
        for (key, value) in object {
            for pattern in &self.patterns {
                if !pattern.regex.is_match(key) {
                    continue;
                }
                allowed.insert(key);
                let pattern_context = this_context.property(&pattern.pattern);
                let mut property_results = EvaluationResults::default();
                let before = reporter.error_count();
                pattern.schema.validate(
                    &pattern_context,
                    value,
                    &instance_location.join_key(key),
                    &mut property_results,
                    reporter,
                    patch,
                );
                if reporter.error_count() == before {
                    if context.require_evaluated_properties() {
                        results.evaluated_properties.insert(key.clone());
                    }
                } else if reporter.fail_early() {
                    return false;
                }
            }
        }
        true
    }
}

impl KeywordValidator for PatternPropertiesValidator {
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
        let Value::Object(object) = instance else {
            return;
        };
        let mut allowed = HashSet::new();
        self.apply(
            context,
            object,
            instance_location,
            results,
            reporter,
            patch,
            &mut allowed,
        );
    }
}

/// `additionalProperties` together with the `properties` and `patternProperties`
/// that define which keys are not additional.
#[derive(Debug)]
pub struct AdditionalPropertiesValidator {
    base: KeywordBase,
    properties: Option<PropertiesValidator>,
    pattern_properties: Option<PatternPropertiesValidator>,
    schema: SchemaId,
}

impl AdditionalPropertiesValidator {
    pub fn new(
        location: SchemaUri,
        properties: Option<PropertiesValidator>,
        pattern_properties: Option<PatternPropertiesValidator>,
        schema: SchemaId,
    ) -> Self {
        Self {
            base: KeywordBase::new("additionalProperties", location),
            properties,
            pattern_properties,
            schema,
        }
    }
}

impl KeywordValidator for AdditionalPropertiesValidator {
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
        let Value::Object(object) = instance else {
            return;
        };
        let mut allowed = HashSet::new();
        if let Some(properties) = &self.properties {
            if !properties.apply(
                context,
                object,
                instance_location,
                results,
                reporter,
                patch,
                &mut allowed,
            ) {
                return;
            }
        }
        if let Some(pattern_properties) = &self.pattern_properties {
            if !pattern_properties.apply(
                context,
                object,
                instance_location,
                results,
                reporter,
                patch,
                &mut allowed,
            ) {
                return;
            }
        }

        let node = context.document().node(self.schema);
        let this_context = context.keyword(self.base.name());
        for (key, value) in object {
            if allowed.contains(key.as_str()) {
                continue;
            }
            let property_location = instance_location.join_key(key);
            if node.always_succeeds() {
                if context.require_evaluated_properties() {
                    results.evaluated_properties.insert(key.clone());
                }
                continue;
            }
            if node.always_fails() {
                reporter.error(self.base.message(
                    context,
                    &property_location,
                    format!("Additional property '{key}' not allowed by schema."),
                ));
                if reporter.fail_early() {
                    return;
                }
                continue;
            }

            let property_context = this_context.element();
            let mut property_results = EvaluationResults::default();
            let mut local_reporter = CollectingReporter::default();
            self.schema.validate(
                &property_context,
                value,
                &property_location,
                &mut property_results,
                &mut local_reporter,
                patch,
            );
            if local_reporter.is_empty() {
                if context.require_evaluated_properties() {
                    results.evaluated_properties.insert(key.clone());
                }
                continue;
            }
            reporter.error(
                self.base
                    .message(
                        context,
                        &property_location,
                        format!("Additional property '{key}' found but was invalid."),
                    )
                    .with_details(local_reporter.into_errors()),
            );
            if reporter.fail_early() {
                return;
            }
        }
    }
}

/// `unevaluatedProperties`: applies to keys no sibling keyword evaluated.
#[derive(Debug)]
pub struct UnevaluatedPropertiesValidator {
    base: KeywordBase,
    schema: SchemaId,
}

impl UnevaluatedPropertiesValidator {
    pub fn new(location: SchemaUri, schema: SchemaId) -> Self {
        Self {
            base: KeywordBase::new("unevaluatedProperties", location),
            schema,
        }
    }
}

impl KeywordValidator for UnevaluatedPropertiesValidator {
    keyword_accessors!();

    fn always_fails(&self, document: &SchemaDocument) -> bool {
        document.node(self.schema).always_fails()
    }

    fn always_succeeds(&self, document: &SchemaDocument) -> bool {
        document.node(self.schema).always_succeeds()
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
        let Value::Object(object) = instance else {
            return;
        };
        let node = context.document().node(self.schema);
        let this_context = context.keyword(self.base.name());
        for (key, value) in object {
            if results.is_property_evaluated(key) {
                continue;
            }
            if node.always_succeeds() {
                results.evaluated_properties.insert(key.clone());
                continue;
            }
            let property_location = instance_location.join_key(key);
            if node.always_fails() {
                reporter.error(self.base.message(
                    context,
                    &property_location,
                    format!(
                        "Unevaluated property '{key}' but the schema does not allow unevaluated properties."
                    ),
                ));
                if reporter.fail_early() {
                    return;
                }
                continue;
            }

            let property_context = this_context.element();
            let mut property_results = EvaluationResults::default();
            let before = reporter.error_count();
            self.schema.validate(
                &property_context,
                value,
                &property_location,
                &mut property_results,
                reporter,
                patch,
            );
            if reporter.error_count() == before {
                results.evaluated_properties.insert(key.clone());
            } else if reporter.fail_early() {
                return;
            }
        }
    }
}
