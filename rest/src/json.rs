//! Identifiers and call arguments
//!
//! Resource operations accept several call shapes (nothing, an id, a
//! payload, an id with a payload, or a key path with a value). They are
//! carried as an explicit [`Argument`] so nothing downstream has to sniff
//! the runtime type of a value.

use crate::path::KeyPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier of a record: an integer or a string (usually a UUID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// Integer identifier
    Number(i64),
    /// String identifier
    Text(String),
}

impl Id {
    /// Read an identifier out of a JSON value
    ///
    /// Integers and strings qualify; everything else (including floats) does not.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// JSON form of the identifier
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Whether a JSON value is equal to this identifier
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Number(n), Value::Number(v)) => v.as_i64() == Some(*n),
            (Self::Text(s), Value::String(v)) => s == v,
            _ => false,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<Uuid> for Id {
    fn from(value: Uuid) -> Self {
        Self::Text(value.hyphenated().to_string())
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Whether a string is a hyphenated RFC 4122 UUID of version 1 to 5
#[must_use]
pub fn is_uuid(s: &str) -> bool {
    // Uuid::parse_str also accepts simple, braced and URN forms
    if s.len() != 36 {
        return false;
    }
    Uuid::try_parse(s).is_ok_and(|uuid| {
        matches!(uuid.get_version_num(), 1..=5) && uuid.get_variant() == uuid::Variant::RFC4122
    })
}

/// Whether a JSON value has the shape of an identifier
///
/// ```
/// use composable_rest::json::is_id;
/// use serde_json::json;
///
/// assert!(is_id(&json!(3)));
/// assert!(is_id(&json!("123e4567-e89b-12d3-a456-426614174000")));
/// assert!(!is_id(&json!("Lorem")));
/// ```
#[must_use]
pub fn is_id(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => is_uuid(s),
        _ => false,
    }
}

/// Shape of the records a resource holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// Records are structured objects; bare integers and UUIDs are identifiers
    #[default]
    Object,
    /// Records are bare values (strings, numbers); nothing is inferred as an id
    Primitive,
}

/// Argument of a resource operation
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Argument {
    /// No argument
    #[default]
    None,
    /// An identifier only
    Id(Id),
    /// A payload only; it may carry its own identity field
    Data(Value),
    /// An identifier and a payload
    IdAndData {
        /// Identifier of the target record
        id: Id,
        /// Payload to send
        data: Value,
    },
    /// A key path into the current data and the value to write there
    Path {
        /// Path to the written value
        path: KeyPath,
        /// Value to write
        value: Value,
    },
}

impl Argument {
    /// Classify an untyped value
    ///
    /// With a [`SchemaKind::Primitive`] schema every value is a payload.
    /// Otherwise integers and UUID strings are identifiers and everything
    /// else is a payload.
    #[must_use]
    pub fn infer(value: Value, schema: SchemaKind) -> Self {
        if schema == SchemaKind::Object && is_id(&value) {
            if let Some(id) = Id::from_value(&value) {
                return Self::Id(id);
            }
        }
        Self::Data(value)
    }

    /// Identifier and payload together
    #[must_use]
    pub fn with_id(id: impl Into<Id>, data: Value) -> Self {
        Self::IdAndData {
            id: id.into(),
            data,
        }
    }

    /// Explicit identifier, if the argument carries one
    #[must_use]
    pub const fn id(&self) -> Option<&Id> {
        match self {
            Self::Id(id) | Self::IdAndData { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Payload, if the argument carries one
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        match self {
            Self::Data(data) | Self::IdAndData { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Short name of the variant, for logs and errors
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Id(_) => "id",
            Self::Data(_) => "data",
            Self::IdAndData { .. } => "id_and_data",
            Self::Path { .. } => "path",
        }
    }
}

impl From<Id> for Argument {
    fn from(id: Id) -> Self {
        Self::Id(id)
    }
}

impl From<i64> for Argument {
    fn from(id: i64) -> Self {
        Self::Id(Id::Number(id))
    }
}

impl From<Uuid> for Argument {
    fn from(id: Uuid) -> Self {
        Self::Id(id.into())
    }
}

impl From<Value> for Argument {
    fn from(data: Value) -> Self {
        Self::Data(data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::key_path;
    use serde_json::json;

    #[test]
    fn integers_and_uuids_are_ids() {
        assert!(is_id(&json!(3)));
        assert!(is_id(&json!(0)));
        assert!(is_id(&json!("123e4567-e89b-12d3-a456-426614174000")));
        assert!(is_id(&json!("123E4567-E89B-42D3-A456-426614174000")));
    }

    #[test]
    fn other_values_are_not_ids() {
        assert!(!is_id(&json!("Lorem")));
        assert!(!is_id(&json!(1.5)));
        assert!(!is_id(&json!(null)));
        assert!(!is_id(&json!({"id": 3})));
        // Simple form without hyphens
        assert!(!is_id(&json!("123e4567e89b12d3a456426614174000")));
        // Version 0 and the nil UUID are not RFC 4122 versions 1 to 5
        assert!(!is_id(&json!("123e4567-e89b-02d3-a456-426614174000")));
        assert!(!is_id(&json!("00000000-0000-0000-0000-000000000000")));
    }

    #[test]
    fn infer_depends_on_schema() {
        assert_eq!(Argument::infer(json!(3), SchemaKind::Object), Argument::Id(Id::Number(3)));
        assert_eq!(Argument::infer(json!(3), SchemaKind::Primitive), Argument::Data(json!(3)));
        assert_eq!(
            Argument::infer(json!("Lorem"), SchemaKind::Object),
            Argument::Data(json!("Lorem"))
        );
        assert_eq!(
            Argument::infer(json!({"id": 3}), SchemaKind::Object),
            Argument::Data(json!({"id": 3}))
        );
    }

    #[test]
    fn typed_conversions_never_infer() {
        let text: Argument = Value::String("123e4567-e89b-12d3-a456-426614174000".to_owned()).into();
        assert!(matches!(text, Argument::Data(_)));

        let uuid = Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap();
        let id: Argument = uuid.into();
        assert_eq!(id.id(), Some(&Id::Text("123e4567-e89b-12d3-a456-426614174000".to_owned())));
    }

    #[test]
    fn accessors() {
        let arg = Argument::with_id(3_i64, json!({"name": "Fifi"}));
        assert_eq!(arg.id(), Some(&Id::Number(3)));
        assert_eq!(arg.data(), Some(&json!({"name": "Fifi"})));
        assert_eq!(arg.kind(), "id_and_data");

        let path = Argument::Path {
            path: key_path!["owner", "name"],
            value: json!("Ann"),
        };
        assert_eq!(path.id(), None);
        assert_eq!(path.data(), None);
    }

    #[test]
    fn id_matches_only_same_type() {
        assert!(Id::Number(3).matches(&json!(3)));
        assert!(!Id::Number(3).matches(&json!("3")));
        assert!(Id::from("abc").matches(&json!("abc")));
        assert_eq!(Id::Number(3).to_string(), "3");
        assert_eq!(Id::from_value(&json!(3)).map(|id| id.to_value()), Some(json!(3)));
    }
}
