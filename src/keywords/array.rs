use serde_json::Value;

use crate::context::EvaluationContext;
use crate::json_pointer::JsonPointer;
use crate::keywords::{KeywordBase, KeywordValidator, Limit, keyword_accessors};
use crate::patch::JsonPatch;
use crate::reporter::{CollectingReporter, ErrorReporter};
use crate::results::{EvaluationResults, RangeAccumulator};
use crate::schema::{SchemaDocument, SchemaId};
use crate::uri::SchemaUri;
use crate::value::json_equal;

/// `minItems` / `maxItems`.
#[derive(Debug)]
pub struct ItemCountValidator {
    base: KeywordBase,
    limit_kind: Limit,
    limit: usize,
}

impl ItemCountValidator {
    pub fn new(location: SchemaUri, limit_kind: Limit, limit: usize) -> Self {
        let name = match limit_kind {
            Limit::Min => "minItems",
            Limit::Max => "maxItems",
        };
        Self {
            base: KeywordBase::new(name, location),
            limit_kind,
            limit,
        }
    }
}

impl KeywordValidator for ItemCountValidator {
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
        let Value::Array(items) = instance else {
            return;
        };
        if !self.limit_kind.is_violated(items.len(), self.limit) {
            return;
        }
        let bound = match self.limit_kind {
            Limit::Min => "Minimum",
            Limit::Max => "Maximum",
        };
        reporter.error(self.base.message(
            context,
            instance_location,
            format!(
                "{bound} number of items is {} but found: {}",
                self.limit,
                items.len()
            ),
        ));
    }
}

#[derive(Debug)]
pub struct UniqueItemsValidator {
    base: KeywordBase,
}

impl UniqueItemsValidator {
    pub fn new(location: SchemaUri) -> Self {
        Self {
            base: KeywordBase::new("uniqueItems", location),
        }
    }
}

impl KeywordValidator for UniqueItemsValidator {
    keyword_accessors!();

    // O(n²) pairwise comparison; numbers compare by value so hashing is not an option.
    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        _results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        _patch: &mut JsonPatch,
    ) {
        let Value::Array(items) = instance else {
            return;
        };
        for (i, left) in items.iter().enumerate() {
            if let Some(offset) = items[i + 1..].iter().position(|right| json_equal(left, right)) {
                reporter.error(self.base.message(
                    context,
                    instance_location,
                    format!(
                        "Array items are not unique: items at index {} and {} are equal",
                        i,
                        i + 1 + offset
                    ),
                ));
                return;
            }
        }
    }
}

/// A single schema applied to every item (`items` in its schema form).
#[derive(Debug)]
pub struct ItemsValidator {
    base: KeywordBase,
    schema: SchemaId,
}

impl ItemsValidator {
    pub fn new(location: SchemaUri, schema: SchemaId) -> Self {
        Self {
            base: KeywordBase::new("items", location),
            schema,
        }
    }
}

impl KeywordValidator for ItemsValidator {
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
        let Value::Array(items) = instance else {
            return;
        };
        validate_tail(
            &self.base,
            self.schema,
            0,
            context,
            items,
            instance_location,
            results,
            reporter,
            patch,
        );
    }
}

/// Applies `schema` to `items[start..]`, recording successful indices when tracked.
#[allow(clippy::too_many_arguments)]
fn validate_tail(
    base: &KeywordBase,
    schema: SchemaId,
    start: usize,
    context: &EvaluationContext<'_>,
    items: &[Value],
    instance_location: &JsonPointer,
    results: &mut EvaluationResults,
    reporter: &mut dyn ErrorReporter,
    patch: &mut JsonPatch,
) {
    if start >= items.len() {
        return;
    }
    let node = context.document().node(schema);
    if node.always_fails() {
        let message = if start == 0 {
            "Item at index '0' but the schema does not allow any items.".to_owned()
        } else {
            format!("Extra item at index '{start}' but the schema does not allow extra items.")
        };
        reporter.error(base.message(context, &instance_location.join_index(start), message));
        return;
    }
    if node.always_succeeds() {
        if context.require_evaluated_items() {
            results.evaluated_items.insert(start..items.len());
        }
        return;
    }

    let this_context = context.keyword(base.name());
    let mut accumulator = RangeAccumulator::default();
    for (index, item) in items.iter().enumerate().skip(start) {
        let item_context = this_context.element();
        let mut item_results = EvaluationResults::default();
        let before = reporter.error_count();
        schema.validate(
            &item_context,
            item,
            &instance_location.join_index(index),
            &mut item_results,
            reporter,
            patch,
        );
        if reporter.error_count() == before {
            if context.require_evaluated_items() {
                accumulator.record(index, &mut results.evaluated_items);
            }
        } else {
            accumulator.flush(&mut results.evaluated_items);
            if reporter.fail_early() {
                return;
            }
        }
    }
    accumulator.flush(&mut results.evaluated_items);
}

/// Positional schemas followed by an optional schema for the remaining items:
/// `prefixItems` + `items` (2020-12) or array-form `items` + `additionalItems`.
#[derive(Debug)]
pub struct PrefixItemsValidator {
    base: KeywordBase,
    prefix: Vec<SchemaId>,
    rest: Option<(KeywordBase, SchemaId)>,
}

impl PrefixItemsValidator {
    pub fn new(
        name: &'static str,
        location: SchemaUri,
        prefix: Vec<SchemaId>,
        rest: Option<(&'static str, SchemaUri, SchemaId)>,
    ) -> Self {
        Self {
            base: KeywordBase::new(name, location),
            prefix,
            rest: rest.map(|(name, location, schema)| (KeywordBase::new(name, location), schema)),
        }
    }
}

impl KeywordValidator for PrefixItemsValidator {
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
        let Value::Array(items) = instance else {
            return;
        };
        let this_context = context.keyword(self.base.name());
        let mut accumulator = RangeAccumulator::default();
        for (index, (schema, item)) in self.prefix.iter().zip(items).enumerate() {
            let item_context = this_context.item(index);
            let mut item_results = EvaluationResults::default();
            let before = reporter.error_count();
            schema.validate(
                &item_context,
                item,
                &instance_location.join_index(index),
                &mut item_results,
                reporter,
                patch,
            );
            if reporter.error_count() == before {
                if context.require_evaluated_items() {
                    accumulator.record(index, &mut results.evaluated_items);
                }
            } else {
                accumulator.flush(&mut results.evaluated_items);
                if reporter.fail_early() {
                    return;
                }
            }
        }
        accumulator.flush(&mut results.evaluated_items);

        if let Some((rest_base, rest_schema)) = &self.rest {
            validate_tail(
                rest_base,
                *rest_schema,
                self.prefix.len(),
                context,
                items,
                instance_location,
                results,
                reporter,
                patch,
            );
        }
    }
}

/// `contains` with its optional `minContains` / `maxContains` bounds.
#[derive(Debug)]
pub struct ContainsValidator {
    base: KeywordBase,
    schema: SchemaId,
    min: Option<(KeywordBase, usize)>,
    max: Option<(KeywordBase, usize)>,
}

impl ContainsValidator {
    pub fn new(
        location: SchemaUri,
        schema: SchemaId,
        min: Option<(SchemaUri, usize)>,
        max: Option<(SchemaUri, usize)>,
    ) -> Self {
        Self {
            base: KeywordBase::new("contains", location),
            schema,
            min: min.map(|(location, n)| (KeywordBase::new("minContains", location), n)),
            max: max.map(|(location, n)| (KeywordBase::new("maxContains", location), n)),
        }
    }
}

impl KeywordValidator for ContainsValidator {
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
        let Value::Array(items) = instance else {
            return;
        };
        let this_context = context.keyword(self.base.name());
        let mut local_reporter = CollectingReporter::default();
        let mut accumulator = RangeAccumulator::default();
        let mut matches = 0usize;
        for (index, item) in items.iter().enumerate() {
            let item_context = this_context.element();
            let mut item_results = EvaluationResults::default();
            let mut item_patch = JsonPatch::default();
            let before = local_reporter.error_count();
            self.schema.validate(
                &item_context,
                item,
                &instance_location.join_index(index),
                &mut item_results,
                &mut local_reporter,
                &mut item_patch,
            );
            if local_reporter.error_count() == before {
                matches += 1;
                patch.merge(item_patch);
                if context.require_evaluated_items() {
                    accumulator.record(index, &mut results.evaluated_items);
                }
            } else {
                accumulator.flush(&mut results.evaluated_items);
            }
        }
        accumulator.flush(&mut results.evaluated_items);

        if let Some((max_base, max)) = &self.max {
            if matches > *max {
                reporter.error(max_base.message(
                    context,
                    instance_location,
                    format!(
                        "A schema can match a contains constraint at most {max} times but it matched {matches} times."
                    ),
                ));
                if reporter.fail_early() {
                    return;
                }
            }
        }

        match &self.min {
            Some((min_base, min)) if matches < *min => {
                reporter.error(
                    min_base
                        .message(
                            context,
                            instance_location,
                            format!(
                                "A schema must match a contains constraint at least {min} times but it matched {matches} times."
                            ),
                        )
                        .with_details(local_reporter.into_errors()),
                );
            }
            None if matches == 0 => {
                reporter.error(
                    self.base
                        .message(
                            context,
                            instance_location,
                            "Expected at least one array item to match 'contains' schema.",
                        )
                        .with_details(local_reporter.into_errors()),
                );
            }
            _ => {}
        }
    }
}

/// `unevaluatedItems`: applies to indices no sibling keyword evaluated.
#[derive(Debug)]
pub struct UnevaluatedItemsValidator {
    base: KeywordBase,
    schema: SchemaId,
}

impl UnevaluatedItemsValidator {
    pub fn new(location: SchemaUri, schema: SchemaId) -> Self {
        Self {
            base: KeywordBase::new("unevaluatedItems", location),
            schema,
        }
    }
}

impl KeywordValidator for UnevaluatedItemsValidator {
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
        let Value::Array(items) = instance else {
            return;
        };
        let node = context.document().node(self.schema);
        if node.always_succeeds() {
            results.evaluated_items.insert(0..items.len());
            return;
        }

        let this_context = context.keyword(self.base.name());
        let mut accumulator = RangeAccumulator::default();
        for (index, item) in items.iter().enumerate() {
            if results.is_item_evaluated(index) {
                continue;
            }
            let item_location = instance_location.join_index(index);
            if node.always_fails() {
                reporter.error(self.base.message(
                    context,
                    &item_location,
                    format!(
                        "Unevaluated item at index '{index}' but the schema does not allow unevaluated items."
                    ),
                ));
                if reporter.fail_early() {
                    return;
                }
                continue;
            }
            let item_context = this_context.element();
            let mut item_results = EvaluationResults::default();
            let before = reporter.error_count();
            self.schema.validate(
                &item_context,
                item,
                &item_location,
                &mut item_results,
                reporter,
                patch,
            );
            if reporter.error_count() == before {
                accumulator.record(index, &mut results.evaluated_items);
            } else if reporter.fail_early() {
                return;
            }
        }
        accumulator.flush(&mut results.evaluated_items);
    }
}

#[cfg(test)]
pub mod tests {
    use crate::keywords::tests::{errors_for, errors_with, keywords};
    use crate::{Draft, EvaluationOptions, JsonSchema};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn contains_bounds() {
        let schema = json!({
            "contains": {"multipleOf": 2},
            "minContains": 2,
            "maxContains": 3
        });

        assert!(errors_for(&schema, &json!([1, 2, 3, 4])).is_empty());

        let errors = errors_for(&schema, &json!([1, 3, 5]));
        assert_eq!(keywords(&errors), vec!["minContains"]);
        assert_eq!(errors[0].details().len(), 3);

        assert_eq!(
            keywords(&errors_for(&schema, &json!([2, 4, 6, 8]))),
            vec!["maxContains"]
        );
    }

    #[test]
    fn contains_keeps_defaults_of_matching_items_only() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({
            "contains": {
                "properties": {"tag": {"default": "latest"}},
                "required": ["id"]
            }
        }))?;

        let (errors, patch) = schema.validate_with_patch(&json!([{"name": "a"}, {"id": 2}]));

        assert!(errors.is_empty());
        assert_eq!(
            patch.to_json(),
            json!([{"op": "add", "path": "/1/tag", "value": "latest"}])
        );
        Ok(())
    }

    #[test]
    fn contains_defaults_to_one_match() {
        let schema = json!({"contains": {"const": "x"}});

        assert!(errors_for(&schema, &json!(["a", "x"])).is_empty());
        assert_eq!(keywords(&errors_for(&schema, &json!([]))), vec!["contains"]);
        assert!(errors_for(&schema, &json!({"not": "an array"})).is_empty());
    }

    #[test]
    fn min_contains_zero_accepts_no_matches() {
        let schema = json!({"contains": false, "minContains": 0});

        assert!(errors_for(&schema, &json!([1, 2])).is_empty());
    }

    #[test]
    fn false_items_reports_first_index_only() {
        let errors = errors_for(&json!({"items": false}), &json!([1, 2, 3]));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].instance_location().to_string(), "/0");
    }

    #[test]
    fn prefix_items_then_items() {
        let schema = json!({
            "prefixItems": [{"type": "integer"}, {"type": "string"}],
            "items": false
        });

        assert!(errors_for(&schema, &json!([1, "a"])).is_empty());
        assert!(errors_for(&schema, &json!([1])).is_empty());

        let errors = errors_for(&schema, &json!([1, "a", null]));
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message(),
            "Extra item at index '2' but the schema does not allow extra items."
        );
        assert_eq!(errors[0].eval_path().to_string(), "/items");
    }

    #[test]
    fn draft7_array_items_with_additional_items() {
        let options = EvaluationOptions::default().with_default_version(Draft::Draft7);
        let schema = json!({
            "items": [{"type": "integer"}],
            "additionalItems": {"type": "string"}
        });

        assert!(errors_with(&schema, options.clone(), &json!([1, "a", "b"])).is_empty());
        let errors = errors_with(&schema, options, &json!([1, 2]));
        assert_eq!(errors[0].eval_path().to_string(), "/additionalItems/type");
        assert_eq!(errors[0].instance_location().to_string(), "/1");
    }

    #[test]
    fn unevaluated_items_sees_prefix_and_contains() {
        let schema = json!({
            "prefixItems": [true],
            "contains": {"const": "x"},
            "unevaluatedItems": false
        });

        assert!(errors_for(&schema, &json!([1, "x", "x"])).is_empty());
        let errors = errors_for(&schema, &json!([1, "x", 2, 3]));
        assert_eq!(
            keywords(&errors),
            vec!["unevaluatedItems", "unevaluatedItems"]
        );
        assert_eq!(errors[1].instance_location().to_string(), "/3");
    }

    #[test]
    fn unevaluated_items_through_all_of() {
        let schema = json!({
            "allOf": [{"prefixItems": [true, true]}],
            "unevaluatedItems": {"type": "string"}
        });

        assert!(errors_for(&schema, &json!([1, 2, "three"])).is_empty());
        assert_eq!(errors_for(&schema, &json!([1, 2, 3])).len(), 1);
    }

    #[test]
    fn unique_items() {
        let schema = json!({"uniqueItems": true});

        assert!(errors_for(&schema, &json!([1, "1", [1]])).is_empty());
        assert_eq!(
            errors_for(&schema, &json!([{"a": 1}, {"a": 1.0}]))[0].message(),
            "Array items are not unique: items at index 0 and 1 are equal"
        );
        assert!(errors_for(&json!({"uniqueItems": false}), &json!([1, 1])).is_empty());
    }

    #[test]
    fn item_counts() {
        let schema = json!({"minItems": 1, "maxItems": 2});

        assert_eq!(
            errors_for(&schema, &json!([1, 2, 3]))[0].message(),
            "Maximum number of items is 2 but found: 3"
        );
        assert_eq!(keywords(&errors_for(&schema, &json!([]))), vec!["minItems"]);
    }
}
