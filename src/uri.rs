use std::fmt;

use serde::{Serialize, Serializer};
use url::Url;

use crate::error::{SchemaError, SchemaResult};
use crate::json_pointer::{self, JsonPointer};

/// An absolute schema identifier: a base URI plus an optional fragment that is
/// either a JSON Pointer (`#/properties/a`) or a plain name (`#node`).
///
/// An empty fragment is dropped, so `https://x/s#` and `https://x/s` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaUri(Url);

impl SchemaUri {
    pub fn parse(text: &str) -> SchemaResult<Self> {
        Url::parse(text)
            .map(Self::normalized)
            .map_err(|source| SchemaError::InvalidUri {
                uri: text.to_owned(),
                source,
            })
    }

    fn normalized(mut url: Url) -> Self {
        if url.fragment() == Some("") {
            url.set_fragment(None);
        }
        Self(url)
    }

    /// Resolves a (possibly relative) reference against this URI.
    pub fn resolve(&self, reference: &str) -> SchemaResult<Self> {
        self.0
            .join(reference)
            .map(Self::normalized)
            .map_err(|source| SchemaError::InvalidUri {
                uri: reference.to_owned(),
                source,
            })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.0.fragment()
    }

    pub fn has_fragment(&self) -> bool {
        self.fragment().is_some()
    }

    /// True for anchor-style fragments such as `#node`.
    pub fn has_plain_name_fragment(&self) -> bool {
        matches!(self.fragment(), Some(fragment) if !fragment.starts_with('/'))
    }

    pub fn has_pointer_fragment(&self) -> bool {
        matches!(self.fragment(), Some(fragment) if fragment.starts_with('/'))
    }

    /// The decoded JSON Pointer carried in the fragment, root when there is none.
    pub fn pointer(&self) -> Option<JsonPointer> {
        match self.fragment() {
            None => Some(JsonPointer::root()),
            Some(fragment) if fragment.starts_with('/') => {
                let decoded = urlencoding::decode(fragment).ok()?;
                JsonPointer::parse(&decoded)
            }
            Some(_) => None,
        }
    }

    /// The same resource without any fragment.
    pub fn base(&self) -> Self {
        let mut url = self.0.clone();
        url.set_fragment(None);
        Self(url)
    }

    pub fn with_fragment(&self, fragment: &str) -> Self {
        let mut url = self.0.clone();
        url.set_fragment(Some(fragment));
        Self::normalized(url)
    }

    /// Appends one token to the pointer fragment. Plain-name URIs have no pointer
    /// to extend, so they are returned unchanged.
    pub fn append(&self, key: &str) -> Self {
        if self.has_plain_name_fragment() {
            return self.clone();
        }
        let mut pointer = self.fragment().unwrap_or_default().to_owned();
        pointer.push('/');
        pointer.push_str(&json_pointer::escape(key));
        self.with_fragment(&pointer)
    }
}

impl fmt::Display for SchemaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SchemaUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_fragment_is_normalized() -> Result<(), Box<dyn std::error::Error>> {
        let with_hash = SchemaUri::parse("https://example.com/schema#")?;
        let without = SchemaUri::parse("https://example.com/schema")?;

        assert_eq!(with_hash, without);
        assert!(!with_hash.has_fragment());
        Ok(())
    }

    #[test]
    fn append_extends_pointer_fragment() -> Result<(), Box<dyn std::error::Error>> {
        let root = SchemaUri::parse("https://example.com/root.json")?;
        let child = root.append("properties").append("a/b");

        assert_eq!(
            child.as_str(),
            "https://example.com/root.json#/properties/a~1b"
        );
        assert!(child.has_pointer_fragment());
        Ok(())
    }

    #[test]
    fn plain_name_fragments_are_not_extended() -> Result<(), Box<dyn std::error::Error>> {
        let anchor = SchemaUri::parse("https://example.com/root.json#node")?;

        assert!(anchor.has_plain_name_fragment());
        assert_eq!(anchor.append("items"), anchor);
        assert_eq!(anchor.pointer(), None);
        Ok(())
    }

    #[test]
    fn resolve_relative_reference() -> Result<(), Box<dyn std::error::Error>> {
        let base = SchemaUri::parse("https://example.com/schemas/root.json#/items")?;

        assert_eq!(
            base.resolve("child.json")?.as_str(),
            "https://example.com/schemas/child.json"
        );
        assert_eq!(
            base.resolve("#/$defs/a")?.as_str(),
            "https://example.com/schemas/root.json#/$defs/a"
        );
        Ok(())
    }

    #[test]
    fn pointer_fragment_is_percent_decoded() -> Result<(), Box<dyn std::error::Error>> {
        let uri = SchemaUri::parse("https://example.com/s#/$defs/a%20b")?;
        let pointer = uri.pointer().ok_or("expected pointer")?;

        assert_eq!(pointer.to_string(), "/$defs/a b");
        Ok(())
    }
}
