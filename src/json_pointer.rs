use std::borrow::Cow;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// One reference token of a JSON Pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointerToken {
    Key(String),
    Index(usize),
}

impl fmt::Display for PointerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerToken::Key(key) => f.write_str(&escape(key)),
            PointerToken::Index(index) => write!(f, "{index}"),
        }
    }
}

/// An RFC 6901 JSON Pointer, used for instance locations and evaluation paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer {
    tokens: Vec<PointerToken>,
}

impl JsonPointer {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses the textual form (`""` or `/a/b~1c/0`). Numeric tokens stay keys,
    /// since a pointer alone cannot tell an array index from an object key.
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return Some(Self::root());
        }
        let rest = text.strip_prefix('/')?;
        let tokens = rest
            .split('/')
            .map(|token| PointerToken::Key(unescape(token).into_owned()))
            .collect();
        Some(Self { tokens })
    }

    pub fn tokens(&self) -> &[PointerToken] {
        &self.tokens
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.tokens.push(PointerToken::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.tokens.push(PointerToken::Index(index));
    }

    pub fn join_key(&self, key: &str) -> Self {
        let mut pointer = self.clone();
        pointer.push_key(key);
        pointer
    }

    pub fn join_index(&self, index: usize) -> Self {
        let mut pointer = self.clone();
        pointer.push_index(index);
        pointer
    }

    /// Splits off the last token, returning the parent pointer and that token.
    pub fn split_last(&self) -> Option<(JsonPointer, &PointerToken)> {
        let (last, parent) = self.tokens.split_last()?;
        Some((
            JsonPointer {
                tokens: parent.to_vec(),
            },
            last,
        ))
    }

    /// Looks the pointer up in a JSON value.
    pub fn resolve<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        let mut current = value;
        for token in &self.tokens {
            current = match current {
                Value::Object(map) => map.get(token.as_key().as_ref())?,
                Value::Array(items) => items.get(token.as_index()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn resolve_mut<'v>(&self, value: &'v mut Value) -> Option<&'v mut Value> {
        let mut current = value;
        for token in &self.tokens {
            current = match current {
                Value::Object(map) => map.get_mut(token.as_key().as_ref())?,
                Value::Array(items) => items.get_mut(token.as_index()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl PointerToken {
    fn as_key(&self) -> Cow<'_, str> {
        match self {
            PointerToken::Key(key) => Cow::Borrowed(key),
            PointerToken::Index(index) => Cow::Owned(index.to_string()),
        }
    }

    fn as_index(&self) -> Option<usize> {
        match self {
            PointerToken::Key(key) => parse_array_index(key),
            PointerToken::Index(index) => Some(*index),
        }
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{token}")?;
        }
        Ok(())
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&[&str]> for JsonPointer {
    fn from(keys: &[&str]) -> Self {
        let tokens = keys
            .iter()
            .map(|key| PointerToken::Key((*key).to_owned()))
            .collect();
        Self { tokens }
    }
}

impl FromIterator<PointerToken> for JsonPointer {
    fn from_iter<I: IntoIterator<Item = PointerToken>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

/// Escapes `~` and `/` in a reference token.
pub fn escape(token: &str) -> Cow<'_, str> {
    if token.contains(['~', '/']) {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

pub fn unescape(token: &str) -> Cow<'_, str> {
    if token.contains('~') {
        Cow::Owned(token.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(token)
    }
}

// Leading zeros are not valid array indices.
fn parse_array_index(token: &str) -> Option<usize> {
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn display_escapes_tokens() {
        let pointer = JsonPointer::root()
            .join_key("a/b")
            .join_key("m~n")
            .join_index(3);

        assert_eq!(pointer.to_string(), "/a~1b/m~0n/3");
        assert_eq!(JsonPointer::root().to_string(), "");
    }

    #[test]
    fn parse_unescapes_tokens() {
        let pointer = JsonPointer::parse("/a~1b/m~0n").expect("valid pointer");

        assert_eq!(
            pointer.tokens(),
            &[
                PointerToken::Key("a/b".to_owned()),
                PointerToken::Key("m~n".to_owned())
            ]
        );
        assert!(JsonPointer::parse("no-slash").is_none());
    }

    #[test]
    fn resolve_walks_objects_and_arrays() {
        let document = json!({"ports": [{"containerPort": 8080}], "0": "zero"});

        let port = JsonPointer::parse("/ports/0/containerPort")
            .and_then(|p| p.resolve(&document).cloned());
        assert_eq!(port, Some(json!(8080)));

        let by_index = JsonPointer::root().join_index(0);
        assert_eq!(by_index.resolve(&document), Some(&json!("zero")));

        let leading_zero = JsonPointer::parse("/ports/00");
        assert_eq!(
            leading_zero.and_then(|p| p.resolve(&document).cloned()),
            None
        );
    }

    #[test]
    fn split_last_returns_parent() {
        let pointer = JsonPointer::root().join_key("a").join_index(1);
        let (parent, last) = pointer.split_last().expect("non-root");

        assert_eq!(parent.to_string(), "/a");
        assert_eq!(last, &PointerToken::Index(1));
        assert!(JsonPointer::root().split_last().is_none());
    }
}
