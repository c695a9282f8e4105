use std::borrow::Cow;

use regex::Regex;
use serde_json::Value;

use crate::context::EvaluationContext;
use crate::format::FormatChecker;
use crate::json_pointer::JsonPointer;
use crate::keywords::{KeywordBase, KeywordValidator, Limit, keyword_accessors};
use crate::patch::JsonPatch;
use crate::reporter::ErrorReporter;
use crate::results::EvaluationResults;
use crate::uri::SchemaUri;

/// `minLength` / `maxLength`, counted in Unicode code points.
#[derive(Debug)]
pub struct LengthValidator {
    base: KeywordBase,
    limit_kind: Limit,
    limit: usize,
}

impl LengthValidator {
    pub fn new(location: SchemaUri, limit_kind: Limit, limit: usize) -> Self {
        let name = match limit_kind {
            Limit::Min => "minLength",
            Limit::Max => "maxLength",
        };
        Self {
            base: KeywordBase::new(name, location),
            limit_kind,
            limit,
        }
    }
}

impl KeywordValidator for LengthValidator {
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
        let length = text.chars().count();
        if !self.limit_kind.is_violated(length, self.limit) {
            return;
        }
        reporter.error(self.base.message(
            context,
            instance_location,
            format!(
                "Expected {}: {}, actual: {}",
                self.base.name(),
                self.limit,
                length
            ),
        ));
    }
}

/// Rewrites ECMAScript-only escapes into their `regex` crate equivalents.
/// `\d` and `\w` are ASCII-only in ECMAScript but Unicode-aware in `regex`.
pub(crate) fn translate_pattern(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains('\\') {
        return Cow::Borrowed(pattern);
    }
    let mut translated = String::with_capacity(pattern.len() + 8);
    let mut in_class = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(escaped) = chars.next() else {
                    translated.push('\\');
                    break;
                };
                match (escaped, in_class) {
                    ('d', false) => translated.push_str("[0-9]"),
                    ('D', false) => translated.push_str("[^0-9]"),
                    ('w', false) => translated.push_str("[0-9A-Za-z_]"),
                    ('W', false) => translated.push_str("[^0-9A-Za-z_]"),
                    ('d', true) => translated.push_str("0-9"),
                    ('w', true) => translated.push_str("0-9A-Za-z_"),
                    _ => {
                        translated.push('\\');
                        translated.push(escaped);
                    }
                }
            }
            '[' if !in_class => {
                in_class = true;
                translated.push(c);
            }
            ']' if in_class => {
                in_class = false;
                translated.push(c);
            }
            _ => translated.push(c),
        }
    }
    Cow::Owned(translated)
}

/// Compiles an ECMAScript pattern, `None` if the `regex` crate cannot express it.
pub(crate) fn compile_pattern(pattern: &str) -> Option<Regex> {
    Regex::new(&translate_pattern(pattern)).ok()
}

#[derive(Debug)]
pub struct PatternValidator {
    base: KeywordBase,
    pattern: String,
    regex: Regex,
}

impl PatternValidator {
    pub fn new(location: SchemaUri, pattern: String, regex: Regex) -> Self {
        Self {
            base: KeywordBase::new("pattern", location),
            pattern,
            regex,
        }
    }
}

impl KeywordValidator for PatternValidator {
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
        if self.regex.is_match(text) {
            return;
        }
        let pattern = &self.pattern;
        reporter.error(self.base.message(
            context,
            instance_location,
            format!("String '{text}' does not match pattern '{pattern}'."),
        ));
    }
}

pub struct FormatValidator {
    base: KeywordBase,
    format: String,
    checker: FormatChecker,
}

impl std::fmt::Debug for FormatValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatValidator")
            .field("base", &self.base)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl FormatValidator {
    pub fn new(location: SchemaUri, format: String, checker: FormatChecker) -> Self {
        Self {
            base: KeywordBase::new("format", location),
            format,
            checker,
        }
    }
}

impl KeywordValidator for FormatValidator {
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
        if let Err(reason) = (self.checker)(text) {
            reporter.error(self.base.message(context, instance_location, reason));
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::EvaluationOptions;
    use crate::keywords::tests::{errors_for, errors_with};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn length_counts_code_points() {
        let schema = json!({"minLength": 2, "maxLength": 3});

        assert!(errors_for(&schema, &json!("日本")).is_empty());
        assert!(errors_for(&schema, &json!("💩💩💩")).is_empty());
        assert_eq!(
            errors_for(&schema, &json!("💩💩💩💩"))[0].message(),
            "Expected maxLength: 3, actual: 4"
        );
        assert_eq!(errors_for(&schema, &json!("a"))[0].keyword(), "minLength");
    }

    #[rstest]
    #[case(r"^\d+$", "123", true)]
    #[case(r"^\d+$", "١٢٣", false)]
    #[case(r"^[\w-]+$", "snake_case-id", true)]
    #[case(r"^\W$", "é", true)]
    #[case("a+", "xxaaxx", true)]
    fn ecma_escapes(#[case] pattern: &str, #[case] text: &str, #[case] matches: bool) {
        let regex = compile_pattern(pattern).expect("pattern compiles");

        assert_eq!(regex.is_match(text), matches);
    }

    #[test]
    fn pattern_search_is_unanchored() {
        let schema = json!({"pattern": "^a*$"});

        assert!(errors_for(&schema, &json!("aaa")).is_empty());
        assert_eq!(
            errors_for(&schema, &json!("abc"))[0].message(),
            "String 'abc' does not match pattern '^a*$'."
        );
        assert!(errors_for(&schema, &json!(12)).is_empty());
    }

    #[test]
    fn unsupported_pattern_is_permissive() {
        // Lookahead is valid ECMAScript but unsupported by the regex crate.
        let schema = json!({"pattern": "^(?=a)"});

        assert!(errors_for(&schema, &json!("zzz")).is_empty());
    }

    #[test]
    fn format_is_annotation_unless_required() {
        let schema = json!({"format": "email"});
        let instance = json!("not-an-email");

        assert!(errors_for(&schema, &instance).is_empty());
        let errors = errors_with(
            &schema,
            EvaluationOptions::default().with_format_validation(true),
            &instance,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].keyword(), "format");
    }

    #[test]
    fn unknown_format_is_ignored() {
        let schema = json!({"format": "made-up"});
        let options = EvaluationOptions::default().with_format_validation(true);

        assert!(errors_with(&schema, options, &json!("anything")).is_empty());
    }
}
