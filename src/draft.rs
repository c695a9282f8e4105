use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A supported JSON Schema dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Draft {
    #[serde(rename = "draft-07", alias = "draft7")]
    Draft7,
    #[serde(rename = "2019-09")]
    Draft201909,
    #[serde(rename = "2020-12")]
    Draft202012,
}

impl Draft {
    /// Recognises the standard meta-schema URIs, with or without a trailing `#`.
    pub fn from_meta_schema(uri: &str) -> Option<Draft> {
        static META_SCHEMA_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = META_SCHEMA_REGEX.get_or_init(|| {
            // Capture the draft segment of http(s)://json-schema.org/...
            Regex::new(r"^https?://json-schema\.org/(draft-07|draft/2019-09|draft/2020-12)/schema#?$")
                .expect("Valid regex")
        });

        let captures = regex.captures(uri)?;
        match captures.get(1)?.as_str() {
            "draft-07" => Some(Draft::Draft7),
            "draft/2019-09" => Some(Draft::Draft201909),
            "draft/2020-12" => Some(Draft::Draft202012),
            _ => None,
        }
    }

    pub fn meta_schema_uri(self) -> &'static str {
        match self {
            Draft::Draft7 => "http://json-schema.org/draft-07/schema#",
            Draft::Draft201909 => "https://json-schema.org/draft/2019-09/schema",
            Draft::Draft202012 => "https://json-schema.org/draft/2020-12/schema",
        }
    }

    /// Whether `$id` may only identify resources, never carry a fragment.
    pub(crate) fn forbids_id_fragment(self) -> bool {
        !matches!(self, Draft::Draft7)
    }

    pub(crate) fn is_valid_anchor(self, anchor: &str) -> bool {
        static ANCHOR_2019_REGEX: OnceLock<Regex> = OnceLock::new();
        static ANCHOR_2020_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = match self {
            Draft::Draft202012 => ANCHOR_2020_REGEX
                .get_or_init(|| Regex::new(r"^[A-Za-z_][-A-Za-z0-9._]*$").expect("Valid regex")),
            _ => ANCHOR_2019_REGEX
                .get_or_init(|| Regex::new(r"^[A-Za-z][-A-Za-z0-9._:]*$").expect("Valid regex")),
        };
        regex.is_match(anchor)
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Draft::Draft7 => "draft-07",
            Draft::Draft201909 => "2019-09",
            Draft::Draft202012 => "2020-12",
        };
        f.write_str(name)
    }
}

/// A keyword family that a meta-schema can switch on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocabulary {
    Core,
    Applicator,
    Unevaluated,
    Validation,
    MetaData,
    Format,
    Content,
}

impl Vocabulary {
    const ALL: [Vocabulary; 7] = [
        Vocabulary::Core,
        Vocabulary::Applicator,
        Vocabulary::Unevaluated,
        Vocabulary::Validation,
        Vocabulary::MetaData,
        Vocabulary::Format,
        Vocabulary::Content,
    ];

    /// Maps a `$vocabulary` URI such as `https://json-schema.org/draft/2020-12/vocab/applicator`.
    pub fn from_uri(uri: &str) -> Option<Vocabulary> {
        let name = uri
            .strip_prefix("https://json-schema.org/draft/2020-12/vocab/")
            .or_else(|| uri.strip_prefix("https://json-schema.org/draft/2019-09/vocab/"))?;
        match name {
            "core" => Some(Vocabulary::Core),
            "applicator" => Some(Vocabulary::Applicator),
            "unevaluated" => Some(Vocabulary::Unevaluated),
            "validation" => Some(Vocabulary::Validation),
            "meta-data" => Some(Vocabulary::MetaData),
            "format" | "format-annotation" | "format-assertion" => Some(Vocabulary::Format),
            "content" => Some(Vocabulary::Content),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// The set of enabled vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VocabularySet(u8);

impl VocabularySet {
    pub fn all() -> Self {
        Self(Vocabulary::ALL.iter().fold(0, |bits, v| bits | v.bit()))
    }

    /// Builds the set from a meta-schema's `$vocabulary` object. Listed vocabularies
    /// are enabled whether required or optional; core is always on.
    pub fn from_declaration(declaration: &serde_json::Map<String, Value>) -> Self {
        let bits = declaration
            .keys()
            .filter_map(|uri| Vocabulary::from_uri(uri))
            .fold(Vocabulary::Core.bit(), |bits, v| bits | v.bit());
        Self(bits)
    }

    pub fn contains(self, vocabulary: Vocabulary) -> bool {
        self.0 & vocabulary.bit() != 0
    }

    pub(crate) fn asserts_format(declaration: &serde_json::Map<String, Value>) -> bool {
        declaration
            .keys()
            .any(|uri| uri.ends_with("/vocab/format-assertion"))
    }
}

/// The draft plus the keyword families in effect for a schema subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dialect {
    pub draft: Draft,
    pub vocabularies: VocabularySet,
    pub format_assertion: bool,
}

impl Dialect {
    pub fn new(draft: Draft) -> Self {
        Self {
            draft,
            vocabularies: VocabularySet::all(),
            format_assertion: false,
        }
    }

    pub fn enables(&self, vocabulary: Vocabulary) -> bool {
        self.vocabularies.contains(vocabulary)
    }
}

/// Returns the `$schema` declared by a schema object, if any.
pub fn extract_schema_reference(schema: &Value) -> Option<&str> {
    schema.get("$schema")?.as_str()
}
