//! Per-draft keyword dispatch tables.
//!
//! Each table maps the keywords that compile independently of their siblings to a
//! factory. Keywords that combine with siblings (`properties` and friends, `items`
//! and friends, `if`/`then`/`else`, `contains`) and the identity/reference keywords
//! are handled by the builder itself; [`is_known`] covers both sets.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use serde_json::{Map, Value};
use tracing::warn;

use crate::compiler::context::CompilationContext;
use crate::compiler::{AnchorMap, SchemaBuilder};
use crate::draft::{Draft, Vocabulary};
use crate::error::{SchemaError, SchemaResult};
use crate::keywords::array::{ItemCountValidator, UniqueItemsValidator};
use crate::keywords::combinators::{Combinator, CombinatorValidator, NotValidator};
use crate::keywords::content::{ContentEncodingValidator, ContentMediaTypeValidator};
use crate::keywords::generic::{ConstValidator, EnumValidator, TypeValidator};
use crate::keywords::numeric::{BoundKind, MultipleOfValidator, NumericBoundValidator};
use crate::keywords::object::{
    DependenciesValidator, DependentRequiredValidator, DependentSchemasValidator,
    PropertyCountValidator, PropertyNamesValidator, RequiredValidator,
};
use crate::keywords::string::{LengthValidator, PatternValidator, compile_pattern};
use crate::keywords::{BoxedKeyword, Limit};
use crate::value::JsonType;

/// Builds the validator for one keyword. Receives the whole schema object so a
/// keyword can read the siblings it depends on.
pub(crate) type KeywordFactory = fn(
    &mut SchemaBuilder,
    &CompilationContext,
    &Map<String, Value>,
    &Value,
    &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>>;

#[derive(Clone, Copy)]
pub(crate) struct KeywordEntry {
    pub vocabulary: Vocabulary,
    /// Only compiled when `compatibility_mode` is on.
    pub compatibility_only: bool,
    pub factory: KeywordFactory,
}

type KeywordTable = HashMap<&'static str, KeywordEntry>;

fn entry(vocabulary: Vocabulary, factory: KeywordFactory) -> KeywordEntry {
    KeywordEntry {
        vocabulary,
        compatibility_only: false,
        factory,
    }
}

fn shared_entries() -> KeywordTable {
    use Vocabulary::{Applicator, Validation};

    let mut table = KeywordTable::new();
    table.insert("type", entry(Validation, type_keyword));
    table.insert("enum", entry(Validation, enum_keyword));
    table.insert("const", entry(Validation, const_keyword));
    table.insert("minimum", entry(Validation, minimum));
    table.insert("maximum", entry(Validation, maximum));
    table.insert("exclusiveMinimum", entry(Validation, exclusive_minimum));
    table.insert("exclusiveMaximum", entry(Validation, exclusive_maximum));
    table.insert("multipleOf", entry(Validation, multiple_of));
    table.insert("minLength", entry(Validation, min_length));
    table.insert("maxLength", entry(Validation, max_length));
    table.insert("pattern", entry(Validation, pattern));
    table.insert("minItems", entry(Validation, min_items));
    table.insert("maxItems", entry(Validation, max_items));
    table.insert("uniqueItems", entry(Validation, unique_items));
    table.insert("minProperties", entry(Validation, min_properties));
    table.insert("maxProperties", entry(Validation, max_properties));
    table.insert("required", entry(Validation, required));
    table.insert("propertyNames", entry(Applicator, property_names));
    table.insert("allOf", entry(Applicator, all_of));
    table.insert("anyOf", entry(Applicator, any_of));
    table.insert("oneOf", entry(Applicator, one_of));
    table.insert("not", entry(Applicator, not));
    table
}

/// The table for `draft`, built once per process.
pub(crate) fn keyword_table(draft: Draft) -> &'static KeywordTable {
    static DRAFT7: OnceLock<KeywordTable> = OnceLock::new();
    static DRAFT201909: OnceLock<KeywordTable> = OnceLock::new();
    static DRAFT202012: OnceLock<KeywordTable> = OnceLock::new();

    match draft {
        Draft::Draft7 => DRAFT7.get_or_init(|| {
            let mut table = shared_entries();
            table.insert("dependencies", entry(Vocabulary::Applicator, dependencies));
            table.insert(
                "contentEncoding",
                entry(Vocabulary::Content, content_encoding),
            );
            table.insert(
                "contentMediaType",
                entry(Vocabulary::Content, content_media_type),
            );
            table
        }),
        Draft::Draft201909 => DRAFT201909.get_or_init(|| {
            let mut table = modern_entries();
            table.insert(
                "contentEncoding",
                entry(Vocabulary::Content, content_encoding),
            );
            table.insert(
                "contentMediaType",
                entry(Vocabulary::Content, content_media_type),
            );
            table
        }),
        Draft::Draft202012 => DRAFT202012.get_or_init(modern_entries),
    }
}

fn modern_entries() -> KeywordTable {
    let mut table = shared_entries();
    table.insert(
        "dependentRequired",
        entry(Vocabulary::Validation, dependent_required),
    );
    table.insert(
        "dependentSchemas",
        entry(Vocabulary::Applicator, dependent_schemas),
    );
    table.insert(
        "dependencies",
        KeywordEntry {
            vocabulary: Vocabulary::Applicator,
            compatibility_only: true,
            factory: dependencies,
        },
    );
    table
}

/// Keywords the builder handles outside the table, per draft.
fn builder_keywords(draft: Draft) -> &'static [&'static str] {
    const SHARED: &[&str] = &[
        "$schema",
        "$id",
        "$ref",
        "$comment",
        "default",
        "title",
        "description",
        "examples",
        "readOnly",
        "writeOnly",
        "if",
        "then",
        "else",
        "properties",
        "patternProperties",
        "additionalProperties",
        "items",
        "contains",
        "format",
    ];
    const DRAFT7: &[&str] = &["definitions", "additionalItems"];
    const DRAFT201909: &[&str] = &[
        "$anchor",
        "$defs",
        "$recursiveRef",
        "$recursiveAnchor",
        "$vocabulary",
        "additionalItems",
        "unevaluatedProperties",
        "unevaluatedItems",
        "minContains",
        "maxContains",
        "deprecated",
        "contentSchema",
    ];
    const DRAFT202012: &[&str] = &[
        "$anchor",
        "$defs",
        "$dynamicRef",
        "$dynamicAnchor",
        "$vocabulary",
        "prefixItems",
        "unevaluatedProperties",
        "unevaluatedItems",
        "minContains",
        "maxContains",
        "deprecated",
        "contentSchema",
        "contentEncoding",
        "contentMediaType",
    ];

    static ALL: OnceLock<[Vec<&'static str>; 3]> = OnceLock::new();
    let all = ALL.get_or_init(|| {
        [DRAFT7, DRAFT201909, DRAFT202012].map(|extra| {
            let mut keywords = SHARED.to_vec();
            keywords.extend_from_slice(extra);
            keywords
        })
    });
    match draft {
        Draft::Draft7 => &all[0],
        Draft::Draft201909 => &all[1],
        Draft::Draft202012 => &all[2],
    }
}

/// Whether `keyword` means something in `draft`. Anything else is recorded as an
/// unknown keyword.
pub(crate) fn is_known(draft: Draft, keyword: &str, compatibility_mode: bool) -> bool {
    if compatibility_mode && draft != Draft::Draft7 && keyword == "definitions" {
        return true;
    }
    if let Some(entry) = keyword_table(draft).get(keyword) {
        return compatibility_mode || !entry.compatibility_only;
    }
    builder_keywords(draft).contains(&keyword)
}

fn type_keyword(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("type");
    let invalid = || {
        SchemaError::invalid_keyword("type", &location, "a type name or array of type names")
    };
    let names: Vec<&Value> = match value {
        Value::Array(names) => names.iter().collect(),
        name => vec![name],
    };
    let expected = names
        .into_iter()
        .map(|name| name.as_str().and_then(JsonType::parse).ok_or_else(invalid))
        .collect::<SchemaResult<Vec<_>>>()?;
    Ok(Some(Box::new(TypeValidator::new(location, expected))))
}

fn enum_keyword(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("enum");
    let Value::Array(values) = value else {
        return Err(SchemaError::invalid_keyword("enum", location, "an array"));
    };
    Ok(Some(Box::new(EnumValidator::new(location, values.clone()))))
}

fn const_keyword(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("const");
    Ok(Some(Box::new(ConstValidator::new(location, value.clone()))))
}

fn numeric_bound(
    context: &CompilationContext,
    kind: BoundKind,
    value: &Value,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location(kind.keyword());
    let Value::Number(limit) = value else {
        return Err(SchemaError::invalid_keyword(kind.keyword(), location, "a number"));
    };
    Ok(Some(Box::new(NumericBoundValidator::new(location, kind, limit.clone()))))
}

fn minimum(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    numeric_bound(context, BoundKind::Minimum, value)
}

fn maximum(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    numeric_bound(context, BoundKind::Maximum, value)
}

fn exclusive_minimum(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    numeric_bound(context, BoundKind::ExclusiveMinimum, value)
}

fn exclusive_maximum(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    numeric_bound(context, BoundKind::ExclusiveMaximum, value)
}

fn multiple_of(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("multipleOf");
    let Value::Number(divisor) = value else {
        return Err(SchemaError::invalid_keyword("multipleOf", location, "a number"));
    };
    Ok(Some(Box::new(MultipleOfValidator::new(location, divisor.clone()))))
}

/// Reads a non-negative integer keyword value; integral doubles such as `2.0` count.
pub(crate) fn non_negative(
    context: &CompilationContext,
    keyword: &str,
    value: &Value,
) -> SchemaResult<usize> {
    let count = match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
                .map(|n| n as u64)
        }),
        _ => None,
    };
    count
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            SchemaError::invalid_keyword(
                keyword,
                context.keyword_location(keyword),
                "a non-negative integer",
            )
        })
}

fn min_length(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let limit = non_negative(context, "minLength", value)?;
    let location = context.keyword_location("minLength");
    Ok(Some(Box::new(LengthValidator::new(location, Limit::Min, limit))))
}

fn max_length(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let limit = non_negative(context, "maxLength", value)?;
    let location = context.keyword_location("maxLength");
    Ok(Some(Box::new(LengthValidator::new(location, Limit::Max, limit))))
}

fn pattern(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("pattern");
    let Some(pattern) = value.as_str() else {
        return Err(SchemaError::invalid_keyword(
            "pattern",
            location,
            "a regular expression string",
        ));
    };
    let Some(regex) = compile_pattern(pattern) else {
        warn!(%location, pattern, "Unsupported regular expression, pattern is not enforced");
        return Ok(None);
    };
    Ok(Some(Box::new(PatternValidator::new(location, pattern.to_owned(), regex))))
}

fn min_items(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let limit = non_negative(context, "minItems", value)?;
    let location = context.keyword_location("minItems");
    Ok(Some(Box::new(ItemCountValidator::new(location, Limit::Min, limit))))
}

fn max_items(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let limit = non_negative(context, "maxItems", value)?;
    let location = context.keyword_location("maxItems");
    Ok(Some(Box::new(ItemCountValidator::new(location, Limit::Max, limit))))
}

fn unique_items(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("uniqueItems");
    match value {
        Value::Bool(true) => Ok(Some(Box::new(UniqueItemsValidator::new(location)))),
        Value::Bool(false) => Ok(None),
        _ => Err(SchemaError::invalid_keyword("uniqueItems", location, "a boolean")),
    }
}

fn min_properties(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let limit = non_negative(context, "minProperties", value)?;
    let location = context.keyword_location("minProperties");
    Ok(Some(Box::new(PropertyCountValidator::new(location, Limit::Min, limit))))
}

fn max_properties(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let limit = non_negative(context, "maxProperties", value)?;
    let location = context.keyword_location("maxProperties");
    Ok(Some(Box::new(PropertyCountValidator::new(location, Limit::Max, limit))))
}

fn string_array(
    context: &CompilationContext,
    keyword: &str,
    value: &Value,
) -> SchemaResult<Vec<String>> {
    let invalid = || {
        SchemaError::invalid_keyword(
            keyword,
            context.keyword_location(keyword),
            "an array of strings",
        )
    };
    let Value::Array(items) = value else {
        return Err(invalid());
    };
    items
        .iter()
        .map(|item| item.as_str().map(str::to_owned).ok_or_else(invalid))
        .collect()
}

fn required(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let required = string_array(context, "required", value)?;
    if required.is_empty() {
        return Ok(None);
    }
    let location = context.keyword_location("required");
    Ok(Some(Box::new(RequiredValidator::new(location, required))))
}

fn dependent_required(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("dependentRequired");
    let Value::Object(entries) = value else {
        return Err(SchemaError::invalid_keyword("dependentRequired", location, "an object"));
    };
    let dependencies = entries
        .iter()
        .map(|(trigger, names)| {
            let names = string_array(context, "dependentRequired", names)?;
            Ok((trigger.clone(), names))
        })
        .collect::<SchemaResult<BTreeMap<_, _>>>()?;
    Ok(Some(Box::new(DependentRequiredValidator::new(location, dependencies))))
}

fn dependent_schemas(
    builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("dependentSchemas");
    let Value::Object(entries) = value else {
        return Err(SchemaError::invalid_keyword("dependentSchemas", location, "an object"));
    };
    let mut schemas = BTreeMap::new();
    for (trigger, schema) in entries {
        let id = builder.compile_schema(
            context,
            schema,
            &["dependentSchemas", trigger.as_str()],
            anchors,
        )?;
        schemas.insert(trigger.clone(), id);
    }
    Ok(Some(Box::new(DependentSchemasValidator::new(location, schemas))))
}

fn dependencies(
    builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("dependencies");
    let Value::Object(entries) = value else {
        return Err(SchemaError::invalid_keyword("dependencies", location, "an object"));
    };
    let mut required = BTreeMap::new();
    let mut schemas = BTreeMap::new();
    for (trigger, dependency) in entries {
        if dependency.is_array() {
            let names = string_array(context, "dependencies", dependency)?;
            required.insert(trigger.clone(), names);
        } else {
            let id = builder.compile_schema(
                context,
                dependency,
                &["dependencies", trigger.as_str()],
                anchors,
            )?;
            schemas.insert(trigger.clone(), id);
        }
    }
    Ok(Some(Box::new(DependenciesValidator::new(location, required, schemas))))
}

fn property_names(
    builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let schema = builder.compile_schema(context, value, &["propertyNames"], anchors)?;
    let location = context.keyword_location("propertyNames");
    Ok(Some(Box::new(PropertyNamesValidator::new(location, schema))))
}

fn combinator(
    builder: &mut SchemaBuilder,
    context: &CompilationContext,
    combinator: Combinator,
    value: &Value,
    anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let keyword = combinator.keyword();
    let location = context.keyword_location(keyword);
    let Value::Array(branches) = value else {
        return Err(SchemaError::invalid_keyword(keyword, location, "an array of schemas"));
    };
    let mut schemas = Vec::with_capacity(branches.len());
    for (index, branch) in branches.iter().enumerate() {
        let index = index.to_string();
        schemas.push(builder.compile_schema(context, branch, &[keyword, index.as_str()], anchors)?);
    }
    Ok(Some(Box::new(CombinatorValidator::new(location, combinator, schemas))))
}

fn all_of(
    builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    combinator(builder, context, Combinator::AllOf, value, anchors)
}

fn any_of(
    builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    combinator(builder, context, Combinator::AnyOf, value, anchors)
}

fn one_of(
    builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    combinator(builder, context, Combinator::OneOf, value, anchors)
}

fn not(
    builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let schema = builder.compile_schema(context, value, &["not"], anchors)?;
    let location = context.keyword_location("not");
    Ok(Some(Box::new(NotValidator::new(location, schema))))
}

fn content_encoding(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    _schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("contentEncoding");
    let Some(encoding) = value.as_str() else {
        return Err(SchemaError::invalid_keyword("contentEncoding", location, "a string"));
    };
    Ok(Some(Box::new(ContentEncodingValidator::new(location, encoding.to_owned()))))
}

fn content_media_type(
    _builder: &mut SchemaBuilder,
    context: &CompilationContext,
    schema: &Map<String, Value>,
    value: &Value,
    _anchors: &mut AnchorMap,
) -> SchemaResult<Option<BoxedKeyword>> {
    let location = context.keyword_location("contentMediaType");
    let Some(media_type) = value.as_str() else {
        return Err(SchemaError::invalid_keyword("contentMediaType", location, "a string"));
    };
    let encoding = schema
        .get("contentEncoding")
        .and_then(Value::as_str)
        .map(str::to_owned);
    Ok(Some(Box::new(ContentMediaTypeValidator::new(location, media_type.to_owned(), encoding))))
}
