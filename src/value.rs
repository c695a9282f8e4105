//! Helpers over `serde_json::Value` with JSON Schema semantics: numbers compare
//! by value (`1 == 1.0`) and integers keep full 64-bit precision.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Number, Value};

/// The seven JSON Schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "integer" => Some(JsonType::Integer),
            "number" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// The most specific type of an instance. Integral doubles count as integers.
    pub fn of(instance: &Value) -> Self {
        match instance {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(number) if is_integral(number) => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    /// Whether an instance satisfies this type keyword entry.
    pub fn matches(self, instance: &Value) -> bool {
        match (self, instance) {
            (JsonType::Number, Value::Number(_)) => true,
            (JsonType::Integer, Value::Number(number)) => is_integral(number),
            _ => JsonType::of(instance) == self,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn is_integral(number: &Number) -> bool {
    if number.is_i64() || number.is_u64() {
        return true;
    }
    number
        .as_f64()
        .is_some_and(|value| value.is_finite() && value.fract() == 0.0)
}

/// Orders two numbers, exactly when both are integers and as doubles otherwise.
pub fn compare_numbers(left: &Number, right: &Number) -> Ordering {
    match (left.as_i64(), right.as_i64()) {
        (Some(l), Some(r)) => return l.cmp(&r),
        (None, Some(_)) if left.is_u64() => return Ordering::Greater,
        (Some(_), None) if right.is_u64() => return Ordering::Less,
        _ => {}
    }
    if let (Some(l), Some(r)) = (left.as_u64(), right.as_u64()) {
        return l.cmp(&r);
    }
    let l = left.as_f64().unwrap_or(f64::NAN);
    let r = right.as_f64().unwrap_or(f64::NAN);
    l.partial_cmp(&r).unwrap_or(Ordering::Equal)
}

/// Deep equality where numbers compare by value.
pub fn json_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => compare_numbers(l, r) == Ordering::Equal,
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(key, value)| r.get(key).is_some_and(|other| json_equal(value, other)))
        }
        _ => left == right,
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(1), json!(1.0), true)]
    #[case(json!([1, {"a": 2.0}]), json!([1.0, {"a": 2}]), true)]
    #[case(json!({"a": 1}), json!({"a": 1, "b": 2}), false)]
    #[case(json!(false), json!(0), false)]
    #[case(json!(u64::MAX), json!(u64::MAX - 1), false)]
    fn deep_equality(#[case] left: Value, #[case] right: Value, #[case] expected: bool) {
        assert_eq!(json_equal(&left, &right), expected);
    }

    #[test]
    fn large_integers_compare_exactly() -> Result<(), Box<dyn std::error::Error>> {
        let big: Number = serde_json::from_str("9007199254740993")?;
        let neighbour: Number = serde_json::from_str("9007199254740992")?;
        let huge = Number::from(u64::MAX);
        let negative = Number::from(-1);

        assert_eq!(compare_numbers(&big, &neighbour), Ordering::Greater);
        assert_eq!(compare_numbers(&huge, &negative), Ordering::Greater);
        assert_eq!(compare_numbers(&negative, &huge), Ordering::Less);
        Ok(())
    }

    #[rstest]
    #[case(json!(1), JsonType::Integer)]
    #[case(json!(1.0), JsonType::Integer)]
    #[case(json!(1.5), JsonType::Number)]
    #[case(json!("1"), JsonType::String)]
    #[case(json!(null), JsonType::Null)]
    fn instance_types(#[case] instance: Value, #[case] expected: JsonType) {
        assert_eq!(JsonType::of(&instance), expected);
    }

    #[test]
    fn number_matches_integers() {
        assert!(JsonType::Number.matches(&json!(3)));
        assert!(JsonType::Integer.matches(&json!(3.0)));
        assert!(!JsonType::Integer.matches(&json!(3.5)));
    }
}
