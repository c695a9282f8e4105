use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::draft::Draft;
use crate::format::FormatRegistry;
use crate::uri::SchemaUri;

pub const DEFAULT_BASE_URI: &str = "https://schemata.invalid/root.json";
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Supplies schema documents that are referenced but not embedded, such as
/// remote `$ref` targets or custom meta-schemas.
pub trait SchemaResolver: Send + Sync {
    /// Returns the document identified by `uri` (which carries no fragment).
    fn resolve(&self, uri: &SchemaUri) -> Option<Value>;
}

impl<F> SchemaResolver for F
where
    F: Fn(&SchemaUri) -> Option<Value> + Send + Sync,
{
    fn resolve(&self, uri: &SchemaUri) -> Option<Value> {
        self(uri)
    }
}

/// Compilation and evaluation settings.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluationOptions {
    pub default_version: Draft,
    pub default_base_uri: String,
    pub require_format_validation: bool,
    pub compatibility_mode: bool,
    pub max_depth: usize,
    #[serde(skip)]
    pub formats: FormatRegistry,
    #[serde(skip)]
    resolvers: Vec<Arc<dyn SchemaResolver>>,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            default_version: Draft::Draft202012,
            default_base_uri: DEFAULT_BASE_URI.to_owned(),
            require_format_validation: false,
            compatibility_mode: false,
            max_depth: DEFAULT_MAX_DEPTH,
            formats: FormatRegistry::default(),
            resolvers: Vec::new(),
        }
    }
}

impl EvaluationOptions {
    pub fn with_default_version(mut self, draft: Draft) -> Self {
        self.default_version = draft;
        self
    }

    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.default_base_uri = uri.into();
        self
    }

    pub fn with_format_validation(mut self, required: bool) -> Self {
        self.require_format_validation = required;
        self
    }

    pub fn with_compatibility_mode(mut self, enabled: bool) -> Self {
        self.compatibility_mode = enabled;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_format<F>(mut self, name: impl Into<String>, checker: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.formats.register(name, checker);
        self
    }

    pub fn with_resolver(mut self, resolver: impl SchemaResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Asks each resolver in registration order.
    pub(crate) fn resolve_document(&self, uri: &SchemaUri) -> Option<Value> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(uri))
    }
}

impl fmt::Debug for EvaluationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationOptions")
            .field("default_version", &self.default_version)
            .field("default_base_uri", &self.default_base_uri)
            .field("require_format_validation", &self.require_format_validation)
            .field("compatibility_mode", &self.compatibility_mode)
            .field("max_depth", &self.max_depth)
            .field("formats", &self.formats)
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_with_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let options: EvaluationOptions = serde_json::from_value(json!({
            "defaultVersion": "2019-09",
            "requireFormatValidation": true,
            "maxDepth": 64
        }))?;

        assert_eq!(options.default_version, Draft::Draft201909);
        assert!(options.require_format_validation);
        assert_eq!(options.max_depth, 64);
        assert_eq!(options.default_base_uri, DEFAULT_BASE_URI);
        assert!(options.formats.contains("date-time"));
        Ok(())
    }

    #[test]
    fn resolvers_are_consulted_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let options = EvaluationOptions::default()
            .with_resolver(|uri: &SchemaUri| {
                (uri.as_str() == "https://example.com/a.json").then(|| json!({"type": "string"}))
            })
            .with_resolver(|_: &SchemaUri| Some(json!(true)));

        let a = SchemaUri::parse("https://example.com/a.json")?;
        let b = SchemaUri::parse("https://example.com/b.json")?;

        assert_eq!(
            options.resolve_document(&a),
            Some(json!({"type": "string"}))
        );
        assert_eq!(options.resolve_document(&b), Some(json!(true)));
        Ok(())
    }
}
