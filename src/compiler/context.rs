use serde_json::Value;

use crate::draft::{Dialect, Draft};
use crate::error::{SchemaError, SchemaResult};
use crate::uri::SchemaUri;

/// Identity of the schema being compiled: every URI it can be reached by, the
/// base URI its relative references resolve against and the dialect in effect.
#[derive(Debug, Clone)]
pub(crate) struct CompilationContext {
    uris: Vec<SchemaUri>,
    base: SchemaUri,
    has_id: bool,
    dialect: Dialect,
}

impl CompilationContext {
    pub fn new(uri: SchemaUri, dialect: Dialect) -> Self {
        Self {
            uris: vec![uri.clone()],
            base: uri,
            has_id: false,
            dialect,
        }
    }

    pub fn uris(&self) -> &[SchemaUri] {
        &self.uris
    }

    /// The last identifier that is not an anchor: the nearest `$id`, or the JSON
    /// Pointer location inside the nearest resource.
    pub fn base_uri(&self) -> &SchemaUri {
        &self.base
    }

    /// True when the schema declares its own `$id` and so starts a new resource.
    pub fn has_id(&self) -> bool {
        self.has_id
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn draft(&self) -> Draft {
        self.dialect.draft
    }

    pub fn keyword_location(&self, keyword: &str) -> SchemaUri {
        self.base.append(keyword)
    }

    /// Context for the sub-schema reached through `keys`, absorbing its `$id`,
    /// `$anchor` and `$dynamicAnchor`.
    pub fn derive(&self, keys: &[&str], schema: &Value, dialect: Dialect) -> SchemaResult<Self> {
        let descend = |uri: &SchemaUri| keys.iter().fold(uri.clone(), |uri, key| uri.append(key));
        let mut uris: Vec<SchemaUri> = self
            .uris
            .iter()
            .filter(|uri| !uri.has_plain_name_fragment())
            .map(descend)
            .collect();
        let mut base = match uris.last() {
            Some(uri) => uri.clone(),
            None => descend(&self.base),
        };
        let mut has_id = false;

        let Value::Object(object) = schema else {
            return Ok(Self {
                uris,
                base,
                has_id,
                dialect,
            });
        };

        // draft-07 ignores every sibling of $ref, $id included
        let ignores_id = dialect.draft == Draft::Draft7 && object.contains_key("$ref");
        if let Some(id) = object.get("$id").filter(|_| !ignores_id) {
            let Some(id) = id.as_str() else {
                return Err(SchemaError::invalid_keyword("$id", &base, "a URI reference string"));
            };
            let resolved = base.resolve(id)?;
            if !resolved.has_fragment() {
                base = resolved.clone();
                uris.push(resolved);
                has_id = true;
            } else if dialect.draft.forbids_id_fragment() {
                return Err(SchemaError::IdWithFragment {
                    id: id.to_owned(),
                    draft: dialect.draft,
                });
            } else if resolved.has_plain_name_fragment() {
                if !id.starts_with('#') {
                    base = resolved.base();
                    uris.push(base.clone());
                    has_id = true;
                }
                uris.push(resolved);
            } else {
                uris.push(resolved);
            }
        }

        let anchor_keywords: &[&str] = match dialect.draft {
            Draft::Draft7 => &[],
            Draft::Draft201909 => &["$anchor"],
            Draft::Draft202012 => &["$anchor", "$dynamicAnchor"],
        };
        for keyword in anchor_keywords {
            let Some(anchor) = object.get(*keyword) else {
                continue;
            };
            let anchor = anchor.as_str().ok_or_else(|| {
                SchemaError::invalid_keyword(keyword, base.append(keyword), "an anchor name")
            })?;
            if !dialect.draft.is_valid_anchor(anchor) {
                return Err(SchemaError::InvalidAnchor {
                    anchor: anchor.to_owned(),
                    location: base.append(keyword).to_string(),
                });
            }
            uris.push(base.with_fragment(anchor));
        }

        Ok(Self {
            uris,
            base,
            has_id,
            dialect,
        })
    }
}
