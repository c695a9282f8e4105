use thiserror::Error;

use crate::draft::Draft;

#[derive(Error, Debug)]
pub enum SchemaError {
    /// Schema text could not be parsed as JSON
    #[error("Failed to parse JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    /// A schema position holds something other than an object or a boolean
    #[error("invalid JSON-type for a schema at {location}, expected: boolean or object")]
    InvalidSchemaType { location: String },

    /// A keyword value has the wrong shape
    #[error("Invalid value for '{keyword}' at {location}: expected {expected}")]
    InvalidKeyword {
        keyword: String,
        location: String,
        expected: &'static str,
    },

    /// `$id`, `$ref` or a base URI could not be parsed or resolved
    #[error("Invalid URI '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    /// `$anchor` or `$dynamicAnchor` does not follow the anchor grammar
    #[error("Invalid anchor '{anchor}' at {location}")]
    InvalidAnchor { anchor: String, location: String },

    /// `$id` carries a fragment in a draft that forbids it
    #[error("Draft {draft} does not allow $id with fragment: '{id}'")]
    IdWithFragment { id: String, draft: Draft },

    /// Two different schemas claim the same anchor
    #[error("Duplicate anchor definition: {uri}")]
    DuplicateAnchor { uri: String },

    /// `$schema` names neither a supported draft nor a resolvable meta-schema
    #[error("Unsupported schema version: {0}")]
    UnsupportedSchemaVersion(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

impl SchemaError {
    /// True when the schema document itself is wrong, as opposed to the text it came from
    pub fn is_schema_defect(&self) -> bool {
        !matches!(self, SchemaError::JsonParseError(_))
    }

    pub(crate) fn invalid_keyword(
        keyword: &str,
        location: impl ToString,
        expected: &'static str,
    ) -> Self {
        SchemaError::InvalidKeyword {
            keyword: keyword.to_owned(),
            location: location.to_string(),
            expected,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PatchError {
    /// The parent of an `add` target does not exist
    #[error("Patch path not found: {0}")]
    PathNotFound(String),

    /// The parent of an `add` target is neither an object nor an array
    #[error("Patch target is not a container: {0}")]
    NotAContainer(String),
}
