use serde_json::Value;
use tracing::trace;

use crate::context::EvaluationContext;
use crate::json_pointer::JsonPointer;
use crate::keywords::{KeywordBase, KeywordValidator};
use crate::patch::JsonPatch;
use crate::reporter::ErrorReporter;
use crate::results::EvaluationResults;
use crate::schema::{RefId, SchemaDocument, SchemaId, SchemaNode};
use crate::uri::SchemaUri;

/// Shared state of the three reference keywords: the written target and the slot
/// the compiler binds once every schema is registered.
#[derive(Debug)]
struct Reference {
    base: KeywordBase,
    target: SchemaUri,
    slot: RefId,
}

impl Reference {
    #[allow(clippy::too_many_arguments)]
    fn delegate(
        &self,
        schema: Option<SchemaId>,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        patch: &mut JsonPatch,
    ) {
        let Some(schema) = schema else {
            reporter.error(self.base.message(
                context,
                instance_location,
                format!("Unresolved schema reference {}", self.target),
            ));
            return;
        };
        let this_context = context.keyword(self.base.name());
        schema.validate(
            &this_context,
            instance,
            instance_location,
            results,
            reporter,
            patch,
        );
    }

    fn always(&self, document: &SchemaDocument, check: fn(&SchemaNode) -> bool) -> bool {
        document
            .reference(self.slot)
            .is_some_and(|schema| check(document.node(schema)))
    }
}

#[derive(Debug)]
pub struct RefValidator {
    reference: Reference,
}

impl RefValidator {
    pub fn new(location: SchemaUri, target: SchemaUri, slot: RefId) -> Self {
        Self {
            reference: Reference {
                base: KeywordBase::new("$ref", location),
                target,
                slot,
            },
        }
    }
}

impl KeywordValidator for RefValidator {
    fn keyword_name(&self) -> &str {
        self.reference.base.name()
    }

    fn schema_location(&self) -> &SchemaUri {
        self.reference.base.location()
    }

    fn always_fails(&self, document: &SchemaDocument) -> bool {
        self.reference.always(document, |node| node.always_fails())
    }

    fn always_succeeds(&self, document: &SchemaDocument) -> bool {
        self.reference.always(document, |node| node.always_succeeds())
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
        let target = context.document().reference(self.reference.slot);
        self.reference.delegate(
            target,
            context,
            instance,
            instance_location,
            results,
            reporter,
            patch,
        );
    }
}

/// 2019-09 `$recursiveRef`. When the static target sets `$recursiveAnchor`, the
/// outermost enclosing schema that also sets it takes over.
#[derive(Debug)]
pub struct RecursiveRefValidator {
    reference: Reference,
}

impl RecursiveRefValidator {
    pub fn new(location: SchemaUri, target: SchemaUri, slot: RefId) -> Self {
        Self {
            reference: Reference {
                base: KeywordBase::new("$recursiveRef", location),
                target,
                slot,
            },
        }
    }

    fn resolve(&self, context: &EvaluationContext<'_>) -> Option<SchemaId> {
        let document = context.document();
        let target = document.reference(self.reference.slot)?;
        if !document.node(target).recursive_anchor() {
            return Some(target);
        }
        let resolved = context
            .dynamic_scope()
            .filter(|frame| document.node(*frame).recursive_anchor())
            .last()
            .unwrap_or(target);
        trace!(
            static_target = target.index(),
            resolved = resolved.index(),
            "Resolved $recursiveRef"
        );
        Some(resolved)
    }
}

impl KeywordValidator for RecursiveRefValidator {
    fn keyword_name(&self) -> &str {
        self.reference.base.name()
    }

    fn schema_location(&self) -> &SchemaUri {
        self.reference.base.location()
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
        let target = self.resolve(context);
        self.reference.delegate(
            target,
            context,
            instance,
            instance_location,
            results,
            reporter,
            patch,
        );
    }
}

/// 2020-12 `$dynamicRef`. A plain-name target whose static resolution declares the
/// same `$dynamicAnchor` is rebound to the outermost resource in the dynamic scope
/// that declares it.
#[derive(Debug)]
pub struct DynamicRefValidator {
    reference: Reference,
}

impl DynamicRefValidator {
    pub fn new(location: SchemaUri, target: SchemaUri, slot: RefId) -> Self {
        Self {
            reference: Reference {
                base: KeywordBase::new("$dynamicRef", location),
                target,
                slot,
            },
        }
    }

    fn resolve(&self, context: &EvaluationContext<'_>) -> Option<SchemaId> {
        let document = context.document();
        let target = document.reference(self.reference.slot)?;
        if !self.reference.target.has_plain_name_fragment() {
            return Some(target);
        }
        let Some(anchor) = self.reference.target.fragment() else {
            return Some(target);
        };
        if document.node(target).dynamic_anchor() != Some(anchor) {
            return Some(target);
        }
        let resolved = context
            .dynamic_scope()
            .filter_map(|frame| document.node(frame).schema_for_dynamic_anchor(anchor))
            .filter_map(|slot| document.reference(slot))
            .last()
            .unwrap_or(target);
        trace!(
            anchor,
            static_target = target.index(),
            resolved = resolved.index(),
            "Resolved $dynamicRef"
        );
        Some(resolved)
    }
}

impl KeywordValidator for DynamicRefValidator {
    fn keyword_name(&self) -> &str {
        self.reference.base.name()
    }

    fn schema_location(&self) -> &SchemaUri {
        self.reference.base.location()
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
        let target = self.resolve(context);
        self.reference.delegate(
            target,
            context,
            instance,
            instance_location,
            results,
            reporter,
            patch,
        );
    }
}

#[cfg(test)]
pub mod tests {
    use crate::keywords::tests::{errors_for, errors_with, keywords};
    use crate::{Draft, EvaluationOptions, JsonSchema};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn ref_delegates_to_defs() {
        let schema = json!({
            "$defs": {"port": {"type": "integer", "maximum": 65535}},
            "properties": {"port": {"$ref": "#/$defs/port"}}
        });

        assert!(errors_for(&schema, &json!({"port": 8080})).is_empty());
        let errors = errors_for(&schema, &json!({"port": 70000}));
        assert_eq!(
            errors[0].eval_path().to_string(),
            "/properties/port/$ref/maximum"
        );
        assert_eq!(
            errors[0].schema_location().as_str(),
            "https://schemata.invalid/root.json#/$defs/port/maximum"
        );
    }

    #[test]
    fn unresolved_ref_is_reported_at_validation() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({"$ref": "https://nowhere.invalid/missing.json"}))?;

        let errors = schema.validate(&json!(1));
        assert_eq!(
            errors[0].message(),
            "Unresolved schema reference https://nowhere.invalid/missing.json"
        );
        Ok(())
    }

    #[test]
    fn ref_cycle_terminates() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({
            "$defs": {
                "a": {"type": "object", "properties": {"next": {"$ref": "#/$defs/b"}}},
                "b": {"type": "object", "properties": {"next": {"$ref": "#/$defs/a"}}}
            },
            "$ref": "#/$defs/a"
        }))?;

        assert!(schema.is_valid(&json!({"next": {"next": {"next": {}}}})));
        assert!(!schema.is_valid(&json!({"next": {"next": 1}})));
        Ok(())
    }

    #[test]
    fn self_referencing_schema_hits_depth_limit() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile_with_options(
            &json!({"$ref": "#"}),
            EvaluationOptions::default().with_max_depth(16),
        )?;

        let errors = schema.validate(&json!(null));
        assert_eq!(keywords(&errors), vec!["maxDepth"]);
        Ok(())
    }

    #[test]
    fn recursive_ref_rebinds_to_outermost_anchor() {
        let options = EvaluationOptions::default().with_default_version(Draft::Draft201909);
        let tree = json!({
            "$id": "https://example.com/tree.json",
            "$recursiveAnchor": true,
            "type": "object",
            "properties": {"children": {"type": "array", "items": {"$recursiveRef": "#"}}}
        });
        let strict = json!({
            "$id": "https://example.com/strict-tree.json",
            "$recursiveAnchor": true,
            "$ref": "tree.json",
            "unevaluatedProperties": false
        });
        let options = options.with_resolver(move |uri: &crate::SchemaUri| {
            (uri.as_str() == "https://example.com/tree.json").then(|| tree.clone())
        });

        let nested = json!({"children": [{"children": []}]});
        assert!(errors_with(&strict, options.clone(), &nested).is_empty());
        let instance = json!({"children": [{"children": [], "extra": true}]});
        let errors = errors_with(&strict, options, &instance);
        assert!(errors.iter().any(|error| {
            error.keyword() == "unevaluatedProperties"
                && error.instance_location().to_string() == "/children/0/extra"
        }));
    }

    #[test]
    fn dynamic_ref_uses_outermost_dynamic_anchor() {
        let schema = json!({
            "$id": "https://example.com/strings.json",
            "$ref": "list.json",
            "$defs": {
                "item": {"$dynamicAnchor": "item", "type": "string"},
                "list": {
                    "$id": "list.json",
                    "type": "array",
                    "items": {"$dynamicRef": "#item"},
                    "$defs": {"item": {"$dynamicAnchor": "item"}}
                }
            }
        });

        assert!(errors_for(&schema, &json!(["a", "b"])).is_empty());
        let errors = errors_for(&schema, &json!(["a", 1]));
        assert_eq!(
            errors[0].eval_path().to_string(),
            "/$ref/items/$dynamicRef/type"
        );
    }

    #[test]
    fn dynamic_ref_without_bookend_acts_as_ref() {
        let schema = json!({
            "$id": "https://example.com/root.json",
            "$ref": "list.json",
            "$defs": {
                "item": {"$dynamicAnchor": "item", "type": "string"},
                "list": {
                    "$id": "list.json",
                    "items": {"$dynamicRef": "#item"},
                    "$defs": {"item": {"$anchor": "item"}}
                }
            }
        });

        assert!(errors_for(&schema, &json!([1, true])).is_empty());
    }
}
