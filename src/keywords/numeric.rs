use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::context::EvaluationContext;
use crate::json_pointer::JsonPointer;
use crate::keywords::{KeywordBase, KeywordValidator, keyword_accessors};
use crate::patch::JsonPatch;
use crate::reporter::ErrorReporter;
use crate::results::EvaluationResults;
use crate::uri::SchemaUri;
use crate::value::compare_numbers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
}

impl BoundKind {
    pub fn keyword(self) -> &'static str {
        match self {
            BoundKind::Minimum => "minimum",
            BoundKind::Maximum => "maximum",
            BoundKind::ExclusiveMinimum => "exclusiveMinimum",
            BoundKind::ExclusiveMaximum => "exclusiveMaximum",
        }
    }

    fn admits(self, ordering: Ordering) -> bool {
        match self {
            BoundKind::Minimum => ordering != Ordering::Less,
            BoundKind::Maximum => ordering != Ordering::Greater,
            BoundKind::ExclusiveMinimum => ordering == Ordering::Greater,
            BoundKind::ExclusiveMaximum => ordering == Ordering::Less,
        }
    }

    fn violation(self) -> &'static str {
        match self {
            BoundKind::Minimum => "is less than minimum",
            BoundKind::Maximum => "is greater than maximum",
            BoundKind::ExclusiveMinimum => "is no greater than exclusiveMinimum",
            BoundKind::ExclusiveMaximum => "is no less than exclusiveMaximum",
        }
    }
}

/// `minimum`, `maximum`, `exclusiveMinimum` and `exclusiveMaximum`.
#[derive(Debug)]
pub struct NumericBoundValidator {
    base: KeywordBase,
    kind: BoundKind,
    limit: Number,
}

impl NumericBoundValidator {
    pub fn new(location: SchemaUri, kind: BoundKind, limit: Number) -> Self {
        Self {
            base: KeywordBase::new(kind.keyword(), location),
            kind,
            limit,
        }
    }
}

impl KeywordValidator for NumericBoundValidator {
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
        let Value::Number(number) = instance else {
            return;
        };
        if self.kind.admits(compare_numbers(number, &self.limit)) {
            return;
        }
        reporter.error(self.base.message(
            context,
            instance_location,
            format!("{} {} {}", number, self.kind.violation(), self.limit),
        ));
    }
}

#[derive(Debug)]
pub struct MultipleOfValidator {
    base: KeywordBase,
    divisor: Number,
}

impl MultipleOfValidator {
    pub fn new(location: SchemaUri, divisor: Number) -> Self {
        Self {
            base: KeywordBase::new("multipleOf", location),
            divisor,
        }
    }
}

/// Exact for integers; for doubles the IEEE remainder must be smaller than the
/// gap between `value` and its neighbour toward zero.
pub(crate) fn is_multiple_of(value: &Number, divisor: &Number) -> bool {
    if let (Some(v), Some(d)) = (value.as_i64(), divisor.as_i64()) {
        return v.checked_rem(d).is_none_or(|remainder| remainder == 0);
    }
    if let (Some(v), Some(d)) = (value.as_u64(), divisor.as_u64()) {
        return v.checked_rem(d).is_none_or(|remainder| remainder == 0);
    }

    let (Some(v), Some(d)) = (value.as_f64(), divisor.as_f64()) else {
        return true;
    };
    if v == 0.0 || d == 0.0 {
        return true;
    }
    let quotient = (v / d).round();
    let remainder = (-quotient).mul_add(d, v);
    let step = f64::from_bits(v.to_bits() - 1) - v;
    remainder.abs() < step.abs()
}

impl KeywordValidator for MultipleOfValidator {
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
        let Value::Number(number) = instance else {
            return;
        };
        if is_multiple_of(number, &self.divisor) {
            return;
        }
        reporter.error(self.base.message(
            context,
            instance_location,
            format!("{} is not a multiple of {}", number, self.divisor),
        ));
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::keywords::tests::errors_for;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn number(text: &str) -> Number {
        serde_json::from_str(text).expect("number literal")
    }

    #[rstest]
    #[case("0.3", "0.1", true)]
    #[case("0", "0.7", true)]
    #[case("0", "3", true)]
    #[case("10", "0", true)]
    #[case("7.5", "2.5", true)]
    #[case("0.31", "0.1", false)]
    #[case("-9", "3", true)]
    #[case("10", "3", false)]
    #[case("19.99", "0.01", true)]
    #[case("18446744073709551615", "5", true)]
    #[case("-9223372036854775808", "-1", true)]
    #[case("-9223372036854775808", "2", true)]
    fn multiple_of(#[case] value: &str, #[case] divisor: &str, #[case] expected: bool) {
        assert_eq!(is_multiple_of(&number(value), &number(divisor)), expected);
    }

    #[test]
    fn exclusive_bounds_reject_equal_values() {
        let schema = json!({"exclusiveMinimum": 0, "exclusiveMaximum": 10});

        assert!(errors_for(&schema, &json!(5)).is_empty());
        assert_eq!(
            errors_for(&schema, &json!(0))[0].message(),
            "0 is no greater than exclusiveMinimum 0"
        );
        assert_eq!(
            errors_for(&schema, &json!(10))[0].message(),
            "10 is no less than exclusiveMaximum 10"
        );
    }

    #[test]
    fn large_integers_are_compared_exactly() {
        let schema = json!({"maximum": 9007199254740992_i64});
        let over: Value = serde_json::from_str("9007199254740993").expect("json");

        assert_eq!(errors_for(&schema, &over).len(), 1);
        assert!(errors_for(&schema, &json!(9007199254740992_i64)).is_empty());
    }

    #[test]
    fn most_negative_integer_with_negative_divisor() {
        assert!(errors_for(&json!({"multipleOf": -1}), &json!(i64::MIN)).is_empty());
        assert_eq!(
            errors_for(&json!({"multipleOf": -3}), &json!(i64::MIN)).len(),
            1
        );
    }

    #[test]
    fn non_numbers_are_ignored() {
        let schema = json!({"minimum": 5, "multipleOf": 2});

        assert!(errors_for(&schema, &json!("3")).is_empty());
        assert_eq!(errors_for(&schema, &json!(3)).len(), 2);
    }
}
