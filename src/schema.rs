use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::context::{EvaluationContext, EvaluationFlags};
use crate::json_pointer::JsonPointer;
use crate::keywords::BoxedKeyword;
use crate::message::ValidationMessage;
use crate::patch::JsonPatch;
use crate::reporter::ErrorReporter;
use crate::results::EvaluationResults;
use crate::uri::SchemaUri;

/// Index of a compiled schema in its [`SchemaDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(usize);

/// Index of a reference slot, bound to a target once compilation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefId(usize);

impl SchemaId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    /// Validates `instance` against the schema this id names.
    pub fn validate(
        self,
        context: &EvaluationContext<'_>,
        instance: &Value,
        instance_location: &JsonPointer,
        results: &mut EvaluationResults,
        reporter: &mut dyn ErrorReporter,
        patch: &mut JsonPatch,
    ) {
        match context.document().node(self) {
            SchemaNode::Boolean(schema) => schema.validate(context, instance_location, reporter),
            SchemaNode::Object(schema) => schema.validate(
                context,
                instance,
                instance_location,
                results,
                reporter,
                patch,
            ),
        }
    }
}

impl RefId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// A compiled schema: a boolean literal or an object with keyword validators.
#[derive(Debug)]
pub enum SchemaNode {
    Boolean(BooleanSchema),
    Object(ObjectSchema),
}

impl SchemaNode {
    pub fn schema_location(&self) -> &SchemaUri {
        match self {
            SchemaNode::Boolean(schema) => &schema.location,
            SchemaNode::Object(schema) => &schema.location,
        }
    }

    pub fn always_fails(&self) -> bool {
        matches!(self, SchemaNode::Boolean(BooleanSchema { value: false, .. }))
    }

    pub fn always_succeeds(&self) -> bool {
        matches!(self, SchemaNode::Boolean(BooleanSchema { value: true, .. }))
    }

    pub fn default_value(&self) -> Option<&Value> {
        match self {
            SchemaNode::Object(schema) => schema.default_value.as_ref(),
            SchemaNode::Boolean(_) => None,
        }
    }

    pub fn recursive_anchor(&self) -> bool {
        matches!(self, SchemaNode::Object(schema) if schema.recursive_anchor)
    }

    pub fn dynamic_anchor(&self) -> Option<&str> {
        match self {
            SchemaNode::Object(schema) => schema.dynamic_anchor.as_deref(),
            SchemaNode::Boolean(_) => None,
        }
    }

    /// The reference slot this schema's resource binds to a dynamic anchor name.
    pub fn schema_for_dynamic_anchor(&self, anchor: &str) -> Option<RefId> {
        match self {
            SchemaNode::Object(schema) => schema.dynamic_anchors.get(anchor).copied(),
            SchemaNode::Boolean(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct BooleanSchema {
    location: SchemaUri,
    value: bool,
}

impl BooleanSchema {
    pub fn new(location: SchemaUri, value: bool) -> Self {
        Self { location, value }
    }

    fn validate(
        &self,
        context: &EvaluationContext<'_>,
        instance_location: &JsonPointer,
        reporter: &mut dyn ErrorReporter,
    ) {
        if self.value {
            return;
        }
        reporter.error(ValidationMessage::new(
            "false",
            context.eval_path(),
            self.location.clone(),
            instance_location.clone(),
            "False schema always fails",
        ));
    }
}

/// An object-shaped schema. Keyword validators run in order; the `unevaluated*`
/// validators run last so they see what their siblings evaluated.
#[derive(Debug)]
pub struct ObjectSchema {
    pub(crate) id: SchemaId,
    pub(crate) location: SchemaUri,
    pub(crate) identifier: Option<SchemaUri>,
    pub(crate) validators: Vec<BoxedKeyword>,
    pub(crate) unevaluated_properties: Option<BoxedKeyword>,
    pub(crate) unevaluated_items: Option<BoxedKeyword>,
    pub(crate) defs: BTreeMap<String, SchemaId>,
    pub(crate) default_value: Option<Value>,
    pub(crate) recursive_anchor: bool,
    pub(crate) dynamic_anchor: Option<String>,
    pub(crate) dynamic_anchors: HashMap<String, RefId>,
}

impl ObjectSchema {
    pub fn identifier(&self) -> Option<&SchemaUri> {
        self.identifier.as_ref()
    }

    pub fn defs(&self) -> &BTreeMap<String, SchemaId> {
        &self.defs
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
        let max_depth = context.document().max_depth();
        if context.depth() >= max_depth {
            reporter.error(ValidationMessage::new(
                "maxDepth",
                context.eval_path(),
                self.location.clone(),
                instance_location.clone(),
                format!("Maximum evaluation depth of {max_depth} exceeded"),
            ));
            return;
        }

        let flags = EvaluationFlags {
            require_evaluated_properties: self.unevaluated_properties.is_some(),
            require_evaluated_items: self.unevaluated_items.is_some(),
        };
        let this_context = context.enter_schema(self.id, flags);
        let mut local_results = EvaluationResults::default();

        for validator in &self.validators {
            let before = reporter.error_count();
            validator.validate(
                &this_context,
                instance,
                instance_location,
                &mut local_results,
                reporter,
                patch,
            );
            if reporter.error_count() > before && reporter.fail_early() {
                return;
            }
        }

        for validator in [&self.unevaluated_properties, &self.unevaluated_items]
            .into_iter()
            .flatten()
        {
            let before = reporter.error_count();
            validator.validate(
                &this_context,
                instance,
                instance_location,
                &mut local_results,
                reporter,
                patch,
            );
            if reporter.error_count() > before && reporter.fail_early() {
                return;
            }
        }

        if context.require_evaluated_properties() {
            results
                .evaluated_properties
                .extend(local_results.evaluated_properties.drain());
        }
        if context.require_evaluated_items() {
            results.evaluated_items.merge(&local_results.evaluated_items);
        }
    }
}

/// The compiled schema graph: every node owned by one arena, references as slots.
#[derive(Debug)]
pub struct SchemaDocument {
    nodes: Vec<SchemaNode>,
    references: Vec<Option<SchemaId>>,
    root: SchemaId,
    standalone: Vec<SchemaId>,
    identifiers: HashMap<SchemaUri, SchemaId>,
    unknown_keywords: HashMap<SchemaUri, Value>,
    max_depth: usize,
}

pub(crate) struct DocumentParts {
    pub nodes: Vec<SchemaNode>,
    pub references: Vec<Option<SchemaId>>,
    pub root: SchemaId,
    pub standalone: Vec<SchemaId>,
    pub identifiers: HashMap<SchemaUri, SchemaId>,
    pub unknown_keywords: HashMap<SchemaUri, Value>,
    pub max_depth: usize,
}

impl SchemaDocument {
    pub(crate) fn new(parts: DocumentParts) -> Self {
        Self {
            nodes: parts.nodes,
            references: parts.references,
            root: parts.root,
            standalone: parts.standalone,
            identifiers: parts.identifiers,
            unknown_keywords: parts.unknown_keywords,
            max_depth: parts.max_depth,
        }
    }

    pub fn root(&self) -> SchemaId {
        self.root
    }

    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The bound target of a reference slot, `None` if it never resolved.
    pub fn reference(&self, slot: RefId) -> Option<SchemaId> {
        self.references.get(slot.0).copied().flatten()
    }

    /// Roots of documents compiled because something referenced them.
    pub fn standalone(&self) -> &[SchemaId] {
        &self.standalone
    }

    pub fn lookup(&self, uri: &SchemaUri) -> Option<SchemaId> {
        self.identifiers.get(uri).copied()
    }

    pub fn unknown_keyword(&self, uri: &SchemaUri) -> Option<&Value> {
        self.unknown_keywords.get(uri)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
