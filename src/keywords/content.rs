use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::debug;

use crate::context::EvaluationContext;
use crate::json_pointer::JsonPointer;
use crate::keywords::{KeywordBase, KeywordValidator, keyword_accessors};
use crate::patch::JsonPatch;
use crate::reporter::ErrorReporter;
use crate::results::EvaluationResults;
use crate::uri::SchemaUri;

fn is_base64(encoding: &str) -> bool {
    encoding.eq_ignore_ascii_case("base64")
}

#[derive(Debug)]
pub struct ContentEncodingValidator {
    base: KeywordBase,
    encoding: String,
}

impl ContentEncodingValidator {
    pub fn new(location: SchemaUri, encoding: String) -> Self {
        Self {
            base: KeywordBase::new("contentEncoding", location),
            encoding,
        }
    }
}

impl KeywordValidator for ContentEncodingValidator {
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
        let Value::String(text) = instance else {
            return;
        };
        if !is_base64(&self.encoding) {
            debug!(encoding = %self.encoding, "No decoder for contentEncoding, skipping");
            return;
        }
        if STANDARD.decode(text).is_err() {
            reporter.error(self.base.message(
                context,
                instance_location,
                "Content is not a base64 string",
            ));
        }
    }
}

#[derive(Debug)]
pub struct ContentMediaTypeValidator {
    base: KeywordBase,
    media_type: String,
    encoding: Option<String>,
}

impl ContentMediaTypeValidator {
    pub fn new(location: SchemaUri, media_type: String, encoding: Option<String>) -> Self {
        Self {
            base: KeywordBase::new("contentMediaType", location),
            media_type,
            encoding,
        }
    }
}

impl KeywordValidator for ContentMediaTypeValidator {
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
        let Value::String(text) = instance else {
            return;
        };
        if !self.media_type.eq_ignore_ascii_case("application/json") {
            return;
        }
        let decoded;
        let content: &[u8] = match &self.encoding {
            Some(encoding) if is_base64(encoding) => match STANDARD.decode(text) {
                Ok(bytes) => {
                    decoded = bytes;
                    &decoded
                }
                // contentEncoding reports this one
                Err(_) => return,
            },
            _ => text.as_bytes(),
        };
        if let Err(e) = serde_json::from_slice::<serde::de::IgnoredAny>(content) {
            reporter.error(self.base.message(
                context,
                instance_location,
                format!("Content is not JSON: {e}"),
            ));
        }
    }
}

#[cfg(test)]
pub mod tests {
    use crate::Draft;
    use crate::EvaluationOptions;
    use crate::keywords::tests::{errors_with, keywords};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn draft_2019() -> EvaluationOptions {
        EvaluationOptions::default().with_default_version(Draft::Draft201909)
    }

    #[test]
    fn base64_encoded_json() {
        let schema = json!({"contentEncoding": "base64", "contentMediaType": "application/json"});

        // {"a":1}
        assert!(errors_with(&schema, draft_2019(), &json!("eyJhIjoxfQ==")).is_empty());
        // not base64: the media type check stays quiet
        assert_eq!(
            keywords(&errors_with(&schema, draft_2019(), &json!("%%%"))),
            vec!["contentEncoding"]
        );
        // base64 of "{"
        assert_eq!(
            keywords(&errors_with(&schema, draft_2019(), &json!("ew=="))),
            vec!["contentMediaType"]
        );
    }

    #[test]
    fn plain_json_media_type() {
        let schema = json!({"contentMediaType": "application/json"});

        assert!(errors_with(&schema, draft_2019(), &json!("[1, 2]")).is_empty());
        assert!(errors_with(&schema, draft_2019(), &json!(42)).is_empty());
        assert_eq!(errors_with(&schema, draft_2019(), &json!("{oops")).len(), 1);
    }

    #[test]
    fn content_is_annotation_only_in_2020_12() {
        let schema = json!({"contentEncoding": "base64", "contentMediaType": "application/json"});

        assert!(errors_with(&schema, EvaluationOptions::default(), &json!("%%%")).is_empty());
    }
}
