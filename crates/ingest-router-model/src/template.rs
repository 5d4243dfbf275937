//! Parameter templates.
//!
//! A template maps parameter names to [`FieldPath`] expressions over
//! [`IngestionEvent`](crate::IngestionEvent) fields. Expressions read literal
//! field values only; there is no scripting.
//!
//! ```text
//! $.bucket          -> event.bucket
//! $.key             -> event.key
//! $.size            -> event.size (decimal)
//! $.createdAt       -> event.created_at (RFC 3339)
//! $.eventId         -> event.event_id
//! $.metadata.<name> -> event.metadata[<name>]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A field read over an ingestion event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldPath {
    /// `$.bucket`
    Bucket,
    /// `$.key`
    Key,
    /// `$.size`
    Size,
    /// `$.createdAt`
    CreatedAt,
    /// `$.eventId`
    EventId,
    /// `$.metadata.<name>`
    Metadata(String),
}

/// An expression that is not a supported field path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported field expression `{0}` (expected $.bucket, $.key, $.size, $.createdAt, $.eventId or $.metadata.<name>)")]
pub struct FieldPathError(String);

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.trim();
        let field = path
            .strip_prefix("$.")
            .ok_or_else(|| FieldPathError(s.to_owned()))?;
        match field {
            "bucket" => Ok(Self::Bucket),
            "key" => Ok(Self::Key),
            "size" => Ok(Self::Size),
            "createdAt" => Ok(Self::CreatedAt),
            "eventId" => Ok(Self::EventId),
            other => match other.strip_prefix("metadata.") {
                Some(name) if !name.is_empty() => Ok(Self::Metadata(name.to_owned())),
                _ => Err(FieldPathError(s.to_owned())),
            },
        }
    }
}

impl TryFrom<String> for FieldPath {
    type Error = FieldPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bucket => f.write_str("$.bucket"),
            Self::Key => f.write_str("$.key"),
            Self::Size => f.write_str("$.size"),
            Self::CreatedAt => f.write_str("$.createdAt"),
            Self::EventId => f.write_str("$.eventId"),
            Self::Metadata(name) => write!(f, "$.metadata.{name}"),
        }
    }
}

/// Ordered mapping of parameter name to field expression.
///
/// The default template extracts `bucket` and `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamTemplate(BTreeMap<String, FieldPath>);

impl ParamTemplate {
    /// An empty template.
    #[must_use]
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Add an entry.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, path: FieldPath) -> Self {
        self.0.insert(name.into(), path);
        self
    }

    /// Iterate entries in parameter-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldPath)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the template has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ParamTemplate {
    fn default() -> Self {
        Self::empty()
            .with("bucket", FieldPath::Bucket)
            .with("key", FieldPath::Key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_field_paths() {
        assert_eq!("$.bucket".parse::<FieldPath>().unwrap(), FieldPath::Bucket);
        assert_eq!("$.createdAt".parse::<FieldPath>().unwrap(), FieldPath::CreatedAt);
        assert_eq!(
            "$.metadata.owner".parse::<FieldPath>().unwrap(),
            FieldPath::Metadata("owner".into())
        );
    }

    #[test]
    fn test_should_reject_unsupported_expressions() {
        for expr in ["bucket", "$.", "$.metadata.", "$.size + 1", "$.records[0]"] {
            assert!(expr.parse::<FieldPath>().is_err(), "accepted {expr}");
        }
    }

    #[test]
    fn test_should_deserialize_template_from_map() {
        let template: ParamTemplate = serde_json::from_value(serde_json::json!({
            "bucket_name": "$.bucket",
            "csv_key": "$.key"
        }))
        .unwrap();
        let entries: Vec<_> = template.iter().collect();
        assert_eq!(
            entries,
            vec![("bucket_name", &FieldPath::Bucket), ("csv_key", &FieldPath::Key)]
        );
    }

    #[test]
    fn test_should_fail_deserializing_bad_expression() {
        let result: Result<ParamTemplate, _> =
            serde_json::from_value(serde_json::json!({"x": "eval(key)"}));
        assert!(result.is_err());
    }
}
