//! Schema compilation: turns a schema document into a [`SchemaDocument`] arena.
//!
//! Compilation is one recursive pass that registers every sub-schema under each
//! URI it can be reached by and leaves references as unbound slots, followed by a
//! binding pass that fills those slots, loading external documents and compiling
//! sub-schemas hidden in unknown keywords on demand.

pub mod context;
pub mod keywords;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, trace, warn};

use crate::draft::{Dialect, Draft, Vocabulary, VocabularySet, extract_schema_reference};
use crate::error::{SchemaError, SchemaResult};
use crate::json_pointer::JsonPointer;
use crate::keywords::BoxedKeyword;
use crate::keywords::array::{
    ContainsValidator, ItemsValidator, PrefixItemsValidator, UnevaluatedItemsValidator,
};
use crate::keywords::combinators::ConditionalValidator;
use crate::keywords::object::{
    AdditionalPropertiesValidator, PatternPropertiesValidator, PatternProperty,
    PropertiesValidator, UnevaluatedPropertiesValidator,
};
use crate::keywords::reference::{DynamicRefValidator, RecursiveRefValidator, RefValidator};
use crate::keywords::string::{FormatValidator, compile_pattern};
use crate::options::EvaluationOptions;
use crate::schema::{
    BooleanSchema, DocumentParts, ObjectSchema, RefId, SchemaDocument, SchemaId, SchemaNode,
};
use crate::uri::SchemaUri;

use self::context::CompilationContext;
use self::keywords::{is_known, keyword_table, non_negative};

/// Dynamic anchors declared inside the resource being compiled, by name.
pub(crate) type AnchorMap = HashMap<String, SchemaUri>;

/// Everything addressable by URI while compiling.
#[derive(Default)]
struct SchemaStore {
    identifiers: HashMap<SchemaUri, SchemaId>,
    unresolved: Vec<(SchemaUri, RefId)>,
    unknown_keywords: HashMap<SchemaUri, (Value, Dialect)>,
    loaded_documents: HashSet<SchemaUri>,
    meta_schemas: HashMap<String, Dialect>,
}

pub(crate) struct SchemaBuilder {
    options: EvaluationOptions,
    nodes: Vec<SchemaNode>,
    references: Vec<Option<SchemaId>>,
    standalone: Vec<SchemaId>,
    store: SchemaStore,
}

/// Compiles `schema` and everything it references.
#[instrument(skip(schema, options), fields(default_version = %options.default_version))]
pub(crate) fn compile_document(
    schema: &Value,
    options: EvaluationOptions,
) -> SchemaResult<(SchemaDocument, Draft)> {
    let base = SchemaUri::parse(&options.default_base_uri)?;
    let max_depth = options.max_depth;
    let mut builder = SchemaBuilder::new(options);

    let initial = CompilationContext::new(base.clone(), builder.default_dialect());
    let draft = builder.dialect_for(schema, initial.dialect())?.draft;
    builder.store.loaded_documents.insert(base);
    let root = builder.compile_schema(&initial, schema, &[], &mut AnchorMap::new())?;
    builder.resolve_references()?;

    info!(schema_count = builder.nodes.len(), %draft, "Schema compiled");
    let document = SchemaDocument::new(DocumentParts {
        nodes: builder.nodes,
        references: builder.references,
        root,
        standalone: builder.standalone,
        identifiers: builder.store.identifiers,
        unknown_keywords: builder
            .store
            .unknown_keywords
            .into_iter()
            .map(|(uri, (value, _))| (uri, value))
            .collect(),
        max_depth,
    });
    Ok((document, draft))
}

impl SchemaBuilder {
    fn new(options: EvaluationOptions) -> Self {
        Self {
            options,
            nodes: Vec::new(),
            references: Vec::new(),
            standalone: Vec::new(),
            store: SchemaStore::default(),
        }
    }

    fn default_dialect(&self) -> Dialect {
        Dialect::new(self.options.default_version)
    }

    /// The dialect `schema` declares through `$schema`, or `current`.
    fn dialect_for(&mut self, schema: &Value, current: Dialect) -> SchemaResult<Dialect> {
        let Some(meta_schema) = extract_schema_reference(schema) else {
            return Ok(current);
        };
        if let Some(draft) = Draft::from_meta_schema(meta_schema) {
            if draft != current.draft {
                debug!(%draft, "Switching dialect");
            }
            return Ok(Dialect::new(draft));
        }
        if let Some(dialect) = self.store.meta_schemas.get(meta_schema) {
            return Ok(*dialect);
        }

        let unsupported = || SchemaError::UnsupportedSchemaVersion(meta_schema.to_owned());
        let uri = SchemaUri::parse(meta_schema).map_err(|_| unsupported())?;
        let document = self
            .options
            .resolve_document(&uri.base())
            .ok_or_else(unsupported)?;
        let draft = extract_schema_reference(&document)
            .and_then(Draft::from_meta_schema)
            .ok_or_else(unsupported)?;
        let dialect = match document.get("$vocabulary") {
            Some(Value::Object(declaration)) => Dialect {
                draft,
                vocabularies: VocabularySet::from_declaration(declaration),
                format_assertion: VocabularySet::asserts_format(declaration),
            },
            _ => Dialect::new(draft),
        };
        debug!(meta_schema, %draft, "Loaded custom meta-schema");
        self.store
            .meta_schemas
            .insert(meta_schema.to_owned(), dialect);
        Ok(dialect)
    }

    /// Compiles the sub-schema found under `keys` of the schema `parent` describes.
    pub(crate) fn compile_schema(
        &mut self,
        parent: &CompilationContext,
        schema: &Value,
        keys: &[&str],
        anchors: &mut AnchorMap,
    ) -> SchemaResult<SchemaId> {
        let dialect = self.dialect_for(schema, parent.dialect())?;
        let context = parent.derive(keys, schema, dialect)?;
        self.compile_in_context(&context, schema, anchors)
    }

    fn compile_in_context(
        &mut self,
        context: &CompilationContext,
        schema: &Value,
        anchors: &mut AnchorMap,
    ) -> SchemaResult<SchemaId> {
        let id = match schema {
            Value::Bool(value) => self.push_node(SchemaNode::Boolean(BooleanSchema::new(
                context.base_uri().clone(),
                *value,
            ))),
            Value::Object(object) => self.compile_object(context, object, anchors)?,
            _ => {
                return Err(SchemaError::InvalidSchemaType {
                    location: context.base_uri().to_string(),
                });
            }
        };
        self.register(context, id)?;
        Ok(id)
    }

    fn push_node(&mut self, node: SchemaNode) -> SchemaId {
        self.nodes.push(node);
        SchemaId::from_index(self.nodes.len() - 1)
    }

    fn register(&mut self, context: &CompilationContext, id: SchemaId) -> SchemaResult<()> {
        for uri in context.uris() {
            match self.store.identifiers.get(uri) {
                Some(existing) if *existing != id && uri.has_plain_name_fragment() => {
                    return Err(SchemaError::DuplicateAnchor {
                        uri: uri.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    debug!(%uri, schema = id.index(), "Registered schema");
                    self.store.identifiers.insert(uri.clone(), id);
                }
            }
        }
        Ok(())
    }

    /// Allocates an unbound reference slot for `target`.
    fn reference_slot(&mut self, target: SchemaUri) -> RefId {
        self.references.push(None);
        let slot = RefId::from_index(self.references.len() - 1);
        self.store.unresolved.push((target, slot));
        slot
    }

    fn compile_object(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        anchors: &mut AnchorMap,
    ) -> SchemaResult<SchemaId> {
        let dialect = context.dialect();
        let draft = dialect.draft;
        let mut resource_anchors = AnchorMap::new();
        let mut schema = ObjectSchema {
            // assigned in `finish_object`
            id: SchemaId::from_index(0),
            location: context.base_uri().clone(),
            identifier: context.has_id().then(|| context.base_uri().clone()),
            validators: Vec::new(),
            unevaluated_properties: None,
            unevaluated_items: None,
            defs: BTreeMap::new(),
            default_value: None,
            recursive_anchor: false,
            dynamic_anchor: None,
            dynamic_anchors: HashMap::new(),
        };

        let defs_keywords: &[&str] = match (draft, self.options.compatibility_mode) {
            (Draft::Draft7, _) => &["definitions"],
            (_, false) => &["$defs"],
            (_, true) => &["$defs", "definitions"],
        };
        for keyword in defs_keywords {
            self.compile_defs(
                context,
                object,
                keyword,
                &mut schema.defs,
                &mut resource_anchors,
            )?;
        }

        if draft == Draft::Draft7 {
            if let Some(reference) = object.get("$ref") {
                let target = self.reference_target(context, "$ref", reference)?;
                let slot = self.reference_slot(target.clone());
                schema.validators.push(Box::new(RefValidator::new(
                    context.keyword_location("$ref"),
                    target,
                    slot,
                )));
                return Ok(self.finish_object(context, schema, resource_anchors, anchors));
            }
        }

        self.compile_identity(context, object, &mut schema, &mut resource_anchors)?;
        self.compile_references(context, object, &mut schema.validators)?;

        if dialect.enables(Vocabulary::Applicator) {
            self.compile_conditional(
                context,
                object,
                &mut schema.validators,
                &mut resource_anchors,
            )?;
            self.compile_properties(
                context,
                object,
                &mut schema.validators,
                &mut resource_anchors,
            )?;
            self.compile_items(
                context,
                object,
                &mut schema.validators,
                &mut resource_anchors,
            )?;
            self.compile_contains(
                context,
                object,
                &mut schema.validators,
                &mut resource_anchors,
            )?;
        }

        let table = keyword_table(draft);
        for (name, value) in object {
            let Some(entry) = table.get(name.as_str()) else {
                if !is_known(draft, name, self.options.compatibility_mode) {
                    self.record_unknown_keyword(context, name, value);
                }
                continue;
            };
            if entry.compatibility_only && !self.options.compatibility_mode {
                self.record_unknown_keyword(context, name, value);
                continue;
            }
            if !dialect.enables(entry.vocabulary) {
                continue;
            }
            let factory = entry.factory;
            if let Some(validator) = factory(self, context, object, value, &mut resource_anchors)? {
                schema.validators.push(validator);
            }
        }

        self.compile_format(context, object, &mut schema.validators)?;
        self.compile_unevaluated(context, object, &mut schema, &mut resource_anchors)?;

        Ok(self.finish_object(context, schema, resource_anchors, anchors))
    }

    /// Pushes the node and publishes its dynamic anchors to the enclosing resource.
    fn finish_object(
        &mut self,
        context: &CompilationContext,
        mut schema: ObjectSchema,
        resource_anchors: AnchorMap,
        anchors: &mut AnchorMap,
    ) -> SchemaId {
        schema.dynamic_anchors = resource_anchors
            .iter()
            .map(|(name, uri)| (name.clone(), self.reference_slot(uri.clone())))
            .collect();
        schema.id = SchemaId::from_index(self.nodes.len());
        let id = self.push_node(SchemaNode::Object(schema));
        if !context.has_id() {
            anchors.extend(resource_anchors);
        }
        id
    }

    fn compile_defs(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        keyword: &str,
        defs: &mut BTreeMap<String, SchemaId>,
        anchors: &mut AnchorMap,
    ) -> SchemaResult<()> {
        let Some(value) = object.get(keyword) else {
            return Ok(());
        };
        let Value::Object(entries) = value else {
            return Err(SchemaError::invalid_keyword(
                keyword,
                context.keyword_location(keyword),
                "an object of schemas",
            ));
        };
        for (name, schema) in entries {
            let id = self.compile_schema(context, schema, &[keyword, name.as_str()], anchors)?;
            defs.insert(name.clone(), id);
        }
        Ok(())
    }

    fn compile_identity(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        schema: &mut ObjectSchema,
        resource_anchors: &mut AnchorMap,
    ) -> SchemaResult<()> {
        schema.default_value = object.get("default").cloned();

        if context.draft() == Draft::Draft201909 {
            match object.get("$recursiveAnchor") {
                None => {}
                Some(Value::Bool(anchor)) => schema.recursive_anchor = *anchor,
                Some(_) => {
                    return Err(SchemaError::invalid_keyword(
                        "$recursiveAnchor",
                        context.keyword_location("$recursiveAnchor"),
                        "a boolean",
                    ));
                }
            }
        }

        if context.draft() == Draft::Draft202012 {
            // validated while deriving the context
            if let Some(anchor) = object.get("$dynamicAnchor").and_then(Value::as_str) {
                resource_anchors.insert(
                    anchor.to_owned(),
                    context.base_uri().with_fragment(anchor),
                );
                schema.dynamic_anchor = Some(anchor.to_owned());
            }
        }
        Ok(())
    }

    fn reference_target(
        &self,
        context: &CompilationContext,
        keyword: &str,
        value: &Value,
    ) -> SchemaResult<SchemaUri> {
        let reference = value.as_str().ok_or_else(|| {
            SchemaError::invalid_keyword(
                keyword,
                context.keyword_location(keyword),
                "a URI reference string",
            )
        })?;
        context.base_uri().resolve(reference)
    }

    fn compile_references(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        validators: &mut Vec<BoxedKeyword>,
    ) -> SchemaResult<()> {
        if let Some(value) = object.get("$ref") {
            let target = self.reference_target(context, "$ref", value)?;
            let slot = self.reference_slot(target.clone());
            validators.push(Box::new(RefValidator::new(
                context.keyword_location("$ref"),
                target,
                slot,
            )));
        }
        match context.draft() {
            Draft::Draft201909 => {
                if let Some(value) = object.get("$recursiveRef") {
                    let target = self.reference_target(context, "$recursiveRef", value)?;
                    let slot = self.reference_slot(target.clone());
                    validators.push(Box::new(RecursiveRefValidator::new(
                        context.keyword_location("$recursiveRef"),
                        target,
                        slot,
                    )));
                }
            }
            Draft::Draft202012 => {
                if let Some(value) = object.get("$dynamicRef") {
                    let target = self.reference_target(context, "$dynamicRef", value)?;
                    let slot = self.reference_slot(target.clone());
                    validators.push(Box::new(DynamicRefValidator::new(
                        context.keyword_location("$dynamicRef"),
                        target,
                        slot,
                    )));
                }
            }
            Draft::Draft7 => {}
        }
        Ok(())
    }

    fn compile_conditional(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        validators: &mut Vec<BoxedKeyword>,
        anchors: &mut AnchorMap,
    ) -> SchemaResult<()> {
        let mut compile = |builder: &mut Self, keyword: &str| {
            object
                .get(keyword)
                .map(|schema| builder.compile_schema(context, schema, &[keyword], anchors))
                .transpose()
        };
        let if_schema = compile(self, "if")?;
        let then_schema = compile(self, "then")?;
        let else_schema = compile(self, "else")?;

        // without `if`, `then` and `else` are compiled only so references reach them
        if let Some(if_schema) = if_schema {
            validators.push(Box::new(ConditionalValidator::new(
                context.keyword_location("if"),
                if_schema,
                then_schema,
                else_schema,
            )));
        }
        Ok(())
    }

    fn compile_properties(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        validators: &mut Vec<BoxedKeyword>,
        anchors: &mut AnchorMap,
    ) -> SchemaResult<()> {
        let properties = match object.get("properties") {
            None => None,
            Some(Value::Object(entries)) => {
                let mut properties = BTreeMap::new();
                for (name, schema) in entries {
                    let id = self.compile_schema(
                        context,
                        schema,
                        &["properties", name.as_str()],
                        anchors,
                    )?;
                    properties.insert(name.clone(), id);
                }
                Some(PropertiesValidator::new(context.keyword_location("properties"), properties))
            }
            Some(_) => {
                return Err(SchemaError::invalid_keyword(
                    "properties",
                    context.keyword_location("properties"),
                    "an object of schemas",
                ));
            }
        };

        let pattern_properties = match object.get("patternProperties") {
            None => None,
            Some(Value::Object(entries)) => {
                let mut patterns = Vec::with_capacity(entries.len());
                for (pattern, schema) in entries {
                    let id = self.compile_schema(
                        context,
                        schema,
                        &["patternProperties", pattern.as_str()],
                        anchors,
                    )?;
                    match compile_pattern(pattern) {
                        Some(regex) => {
                            patterns.push(PatternProperty::new(pattern.clone(), regex, id))
                        }
                        None => warn!(
                            location = %context.keyword_location("patternProperties"),
                            pattern = %pattern,
                            "Unsupported regular expression, patternProperties entry is not enforced"
                        ),
                    }
                }
                Some(PatternPropertiesValidator::new(
                    context.keyword_location("patternProperties"),
                    patterns,
                ))
            }
            Some(_) => {
                return Err(SchemaError::invalid_keyword(
                    "patternProperties",
                    context.keyword_location("patternProperties"),
                    "an object of schemas",
                ));
            }
        };

        match object.get("additionalProperties") {
            Some(schema) => {
                let id = self.compile_schema(context, schema, &["additionalProperties"], anchors)?;
                validators.push(Box::new(AdditionalPropertiesValidator::new(
                    context.keyword_location("additionalProperties"),
                    properties,
                    pattern_properties,
                    id,
                )));
            }
            None => {
                if let Some(properties) = properties {
                    validators.push(Box::new(properties));
                }
                if let Some(pattern_properties) = pattern_properties {
                    validators.push(Box::new(pattern_properties));
                }
            }
        }
        Ok(())
    }

    fn compile_items(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        validators: &mut Vec<BoxedKeyword>,
        anchors: &mut AnchorMap,
    ) -> SchemaResult<()> {
        let (prefix_keyword, rest_keyword) = match context.draft() {
            Draft::Draft202012 => ("prefixItems", "items"),
            Draft::Draft7 | Draft::Draft201909 => ("items", "additionalItems"),
        };

        let prefix = match object.get(prefix_keyword) {
            Some(Value::Array(schemas)) => {
                let mut prefix = Vec::with_capacity(schemas.len());
                for (index, schema) in schemas.iter().enumerate() {
                    let index = index.to_string();
                    prefix.push(self.compile_schema(
                        context,
                        schema,
                        &[prefix_keyword, index.as_str()],
                        anchors,
                    )?);
                }
                Some(prefix)
            }
            // pre-2020 single-schema `items`
            Some(schema) if prefix_keyword == "items" => {
                let id = self.compile_schema(context, schema, &["items"], anchors)?;
                validators.push(Box::new(ItemsValidator::new(
                    context.keyword_location("items"),
                    id,
                )));
                None
            }
            Some(_) => {
                return Err(SchemaError::invalid_keyword(
                    prefix_keyword,
                    context.keyword_location(prefix_keyword),
                    "an array of schemas",
                ));
            }
            None => None,
        };

        let rest = object
            .get(rest_keyword)
            .map(|schema| self.compile_schema(context, schema, &[rest_keyword], anchors))
            .transpose()?;

        match (prefix, rest) {
            (Some(prefix), rest) => {
                let rest_location = context.keyword_location(rest_keyword);
                let rest = rest.map(|id| (rest_keyword, rest_location, id));
                validators.push(Box::new(PrefixItemsValidator::new(
                    prefix_keyword,
                    context.keyword_location(prefix_keyword),
                    prefix,
                    rest,
                )));
            }
            // 2020-12 `items` without `prefixItems` applies to every item
            (None, Some(id)) if rest_keyword == "items" => {
                validators.push(Box::new(ItemsValidator::new(
                    context.keyword_location("items"),
                    id,
                )));
            }
            // `additionalItems` without array-form `items` has no effect
            (None, _) => {}
        }
        Ok(())
    }

    fn compile_contains(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        validators: &mut Vec<BoxedKeyword>,
        anchors: &mut AnchorMap,
    ) -> SchemaResult<()> {
        let Some(schema) = object.get("contains") else {
            return Ok(());
        };
        let id = self.compile_schema(context, schema, &["contains"], anchors)?;

        let bound = |keyword: &str| -> SchemaResult<Option<(SchemaUri, usize)>> {
            if context.draft() == Draft::Draft7
                || !context.dialect().enables(Vocabulary::Validation)
            {
                return Ok(None);
            }
            match object.get(keyword) {
                Some(value) => Ok(Some((
                    context.keyword_location(keyword),
                    non_negative(context, keyword, value)?,
                ))),
                None => Ok(None),
            }
        };
        let min = bound("minContains")?;
        let max = bound("maxContains")?;

        validators.push(Box::new(ContainsValidator::new(
            context.keyword_location("contains"),
            id,
            min,
            max,
        )));
        Ok(())
    }

    fn compile_format(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        validators: &mut Vec<BoxedKeyword>,
    ) -> SchemaResult<()> {
        let Some(value) = object.get("format") else {
            return Ok(());
        };
        let dialect = context.dialect();
        let asserted = self.options.require_format_validation || dialect.format_assertion;
        if !asserted || !dialect.enables(Vocabulary::Format) {
            return Ok(());
        }
        let location = context.keyword_location("format");
        let Some(format) = value.as_str() else {
            return Err(SchemaError::invalid_keyword("format", location, "a string"));
        };
        match self.options.formats.get(format) {
            Some(checker) => validators.push(Box::new(FormatValidator::new(
                location,
                format.to_owned(),
                checker,
            ))),
            None => debug!(format, %location, "Unknown format, not asserted"),
        }
        Ok(())
    }

    fn compile_unevaluated(
        &mut self,
        context: &CompilationContext,
        object: &Map<String, Value>,
        schema: &mut ObjectSchema,
        anchors: &mut AnchorMap,
    ) -> SchemaResult<()> {
        let vocabulary = match context.draft() {
            Draft::Draft7 => return Ok(()),
            Draft::Draft201909 => Vocabulary::Applicator,
            Draft::Draft202012 => Vocabulary::Unevaluated,
        };
        if !context.dialect().enables(vocabulary) {
            return Ok(());
        }
        if let Some(value) = object.get("unevaluatedProperties") {
            let id = self.compile_schema(context, value, &["unevaluatedProperties"], anchors)?;
            schema.unevaluated_properties = Some(Box::new(UnevaluatedPropertiesValidator::new(
                context.keyword_location("unevaluatedProperties"),
                id,
            )));
        }
        if let Some(value) = object.get("unevaluatedItems") {
            let id = self.compile_schema(context, value, &["unevaluatedItems"], anchors)?;
            schema.unevaluated_items = Some(Box::new(UnevaluatedItemsValidator::new(
                context.keyword_location("unevaluatedItems"),
                id,
            )));
        }
        Ok(())
    }

    /// Remembers a non-keyword member so references into it can compile it later.
    fn record_unknown_keyword(&mut self, context: &CompilationContext, name: &str, value: &Value) {
        for uri in context.uris() {
            if uri.has_plain_name_fragment() {
                continue;
            }
            self.store
                .unknown_keywords
                .entry(uri.append(name))
                .or_insert_with(|| (value.clone(), context.dialect()));
        }
    }

    /// Binds reference slots until no further progress is possible.
    #[instrument(skip(self), fields(pending = self.store.unresolved.len()))]
    fn resolve_references(&mut self) -> SchemaResult<()> {
        loop {
            let pending = std::mem::take(&mut self.store.unresolved);
            let mut progress = false;
            let mut unbound = Vec::new();

            for (target, slot) in pending {
                if let Some(id) = self.lookup_or_compile(&target)? {
                    trace!(%target, schema = id.index(), "Bound reference");
                    self.references[slot.index()] = Some(id);
                    progress = true;
                    continue;
                }
                if self.load_document(&target.base())? {
                    progress = true;
                }
                unbound.push((target, slot));
            }

            self.store.unresolved.extend(unbound);
            if !progress || self.store.unresolved.is_empty() {
                break;
            }
        }

        for (target, _) in &self.store.unresolved {
            warn!(%target, "Schema reference could not be resolved");
        }
        Ok(())
    }

    /// Finds the schema registered for `target`, compiling it from an unknown
    /// keyword when its pointer fragment leads into one.
    fn lookup_or_compile(&mut self, target: &SchemaUri) -> SchemaResult<Option<SchemaId>> {
        if let Some(id) = self.store.identifiers.get(target) {
            return Ok(Some(*id));
        }
        let Some(pointer) = target.pointer() else {
            return Ok(None);
        };

        let tokens = pointer.tokens();
        let base = target.base();
        for split in (1..=tokens.len()).rev() {
            let prefix: JsonPointer = tokens[..split].iter().cloned().collect();
            let prefix_uri = base.with_fragment(&prefix.to_string());
            let Some((value, dialect)) = self.store.unknown_keywords.get(&prefix_uri) else {
                continue;
            };
            let rest: JsonPointer = tokens[split..].iter().cloned().collect();
            let Some(schema) = rest.resolve(value).cloned() else {
                return Ok(None);
            };
            let dialect = *dialect;
            debug!(%target, "Compiling schema found in an unknown keyword");
            let context = CompilationContext::new(target.clone(), dialect)
                .derive(&[], &schema, self.dialect_for(&schema, dialect)?)?;
            let id = self.compile_in_context(&context, &schema, &mut AnchorMap::new())?;
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Fetches and compiles an external document once. Returns whether it was loaded.
    #[instrument(skip(self))]
    fn load_document(&mut self, uri: &SchemaUri) -> SchemaResult<bool> {
        if self.store.identifiers.contains_key(uri)
            || !self.store.loaded_documents.insert(uri.clone())
        {
            return Ok(false);
        }
        let Some(document) = self.options.resolve_document(uri) else {
            debug!(%uri, "No resolver supplied the document");
            return Ok(false);
        };
        debug!(%uri, "Loaded external document");
        let context = CompilationContext::new(uri.clone(), self.default_dialect());
        let id = self.compile_schema(&context, &document, &[], &mut AnchorMap::new())?;
        self.standalone.push(id);
        Ok(true)
    }
}

#[cfg(test)]
pub mod tests {
    use crate::error::SchemaError;
    use crate::keywords::tests::{errors_for, errors_with, keywords};
    use crate::{Draft, EvaluationOptions, JsonSchema, SchemaUri};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn rejects_non_schema_values() {
        let result = JsonSchema::compile(&json!({"properties": {"a": 5}}));

        assert!(matches!(result, Err(SchemaError::InvalidSchemaType { .. })));
    }

    #[test]
    fn rejects_malformed_keywords() {
        let result = JsonSchema::compile(&json!({"minLength": "three"}));

        assert!(matches!(
            result,
            Err(SchemaError::InvalidKeyword { ref keyword, .. }) if keyword == "minLength"
        ));
    }

    #[test]
    fn duplicate_anchor_is_an_error() {
        let result = JsonSchema::compile(&json!({
            "$defs": {"a": {"$anchor": "node"}, "b": {"$anchor": "node"}}
        }));

        assert!(matches!(result, Err(SchemaError::DuplicateAnchor { .. })));
    }

    #[test]
    fn anchors_and_ids_are_addressable() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({
            "$id": "https://example.com/root.json",
            "$defs": {
                "name": {"$anchor": "name", "type": "string"},
                "inner": {"$id": "inner.json", "type": "integer"}
            },
            "properties": {
                "name": {"$ref": "#name"},
                "count": {"$ref": "inner.json"}
            }
        }))?;

        assert!(schema.identifies("https://example.com/inner.json"));
        assert!(schema.identifies("https://example.com/root.json#/$defs/inner"));
        assert!(schema.is_valid(&json!({"name": "x", "count": 1})));
        assert!(!schema.is_valid(&json!({"name": 1})));
        assert!(!schema.is_valid(&json!({"count": "1"})));
        Ok(())
    }

    #[test]
    fn refs_into_unknown_keywords_compile_on_demand() {
        let schema = json!({
            "components": {"port": {"type": "integer"}},
            "properties": {"port": {"$ref": "#/components/port"}}
        });

        assert!(errors_for(&schema, &json!({"port": 1})).is_empty());
        assert_eq!(
            keywords(&errors_for(&schema, &json!({"port": "1"}))),
            vec!["type"]
        );
    }

    #[test]
    fn draft7_ref_ignores_siblings_but_keeps_definitions() {
        let options = EvaluationOptions::default().with_default_version(Draft::Draft7);
        let schema = json!({
            "definitions": {"small": {"maximum": 3}},
            "$ref": "#/definitions/small",
            "minimum": 100
        });

        assert!(errors_with(&schema, options.clone(), &json!(2)).is_empty());
        assert_eq!(
            keywords(&errors_with(&schema, options, &json!(5))),
            vec!["maximum"]
        );
    }

    #[test]
    fn definitions_need_compatibility_mode_after_draft7() {
        let schema = json!({
            "definitions": {"flag": {"type": "boolean"}},
            "dependencies": {"a": ["b"]},
            "properties": {"flag": {"$ref": "#/definitions/flag"}}
        });

        // still reachable as an unknown keyword
        assert_eq!(errors_for(&schema, &json!({"flag": 1})).len(), 1);
        assert!(errors_for(&schema, &json!({"a": 1})).is_empty());
        let options = EvaluationOptions::default().with_compatibility_mode(true);
        assert_eq!(
            keywords(&errors_with(&schema, options, &json!({"a": 1}))),
            vec!["dependencies"]
        );
    }

    #[test]
    fn external_documents_come_from_resolvers() -> Result<(), Box<dyn std::error::Error>> {
        let options = EvaluationOptions::default().with_resolver(|uri: &SchemaUri| {
            (uri.as_str() == "https://example.com/port.json")
                .then(|| json!({"type": "integer", "minimum": 1}))
        });
        let schema = JsonSchema::compile_with_options(
            &json!({"properties": {"port": {"$ref": "https://example.com/port.json"}}}),
            options,
        )?;

        assert!(schema.is_valid(&json!({"port": 80})));
        assert!(!schema.is_valid(&json!({"port": 0})));
        assert!(schema.identifies("https://example.com/port.json"));
        Ok(())
    }

    #[test]
    fn cross_draft_subschema() {
        let schema = json!({
            "$defs": {
                "legacy": {
                    "$schema": "http://json-schema.org/draft-07/schema#",
                    "items": [{"type": "string"}],
                    "additionalItems": false
                }
            },
            "$ref": "#/$defs/legacy"
        });

        assert!(errors_for(&schema, &json!(["a"])).is_empty());
        assert_eq!(
            keywords(&errors_for(&schema, &json!(["a", "b"]))),
            vec!["additionalItems"]
        );
    }

    #[test]
    fn custom_meta_schema_selects_vocabularies() -> Result<(), Box<dyn std::error::Error>> {
        let meta = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "$vocabulary": {
                "https://json-schema.org/draft/2020-12/vocab/core": true,
                "https://json-schema.org/draft/2020-12/vocab/applicator": true
            }
        });
        let options = EvaluationOptions::default().with_resolver(move |uri: &SchemaUri| {
            (uri.as_str() == "https://example.com/meta/no-validation").then(|| meta.clone())
        });
        let schema = JsonSchema::compile_with_options(
            &json!({
                "$schema": "https://example.com/meta/no-validation",
                "minimum": 10,
                "properties": {"a": false}
            }),
            options,
        )?;

        assert!(schema.is_valid(&json!(1)));
        assert!(!schema.is_valid(&json!({"a": 1})));
        Ok(())
    }

    #[test]
    fn unknown_meta_schema_is_unsupported() {
        let result = JsonSchema::compile(&json!({"$schema": "https://example.com/unknown"}));

        assert!(matches!(result, Err(SchemaError::UnsupportedSchemaVersion(_))));
    }
}
