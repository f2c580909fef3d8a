//! Decoded exchange-string payloads.
//!
//! The game does not tag its JSON with a type field: a payload is a blueprint
//! if its root object has a `blueprint` key, and a book if it has a
//! `blueprint_book` key. [`DecodedPayload::from_value`] inspects the root once
//! and everything downstream matches on the variant.
//!
//! The body under the root key is kept as opaque JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::CoreError;

/// Discriminator for the two payload roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Blueprint,
    BlueprintBook,
}

impl PayloadKind {
    /// The JSON root key for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Blueprint => "blueprint",
            PayloadKind::BlueprintBook => "blueprint_book",
        }
    }

    /// Parse a root key or `item` value.
    ///
    /// Accepts the game's hyphenated `blueprint-book` item name as well.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "blueprint" => Some(PayloadKind::Blueprint),
            "blueprint_book" | "blueprint-book" => Some(PayloadKind::BlueprintBook),
            _ => None,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded payload: the body of either a blueprint or a blueprint book.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    Blueprint(Map<String, Value>),
    BlueprintBook(Map<String, Value>),
}

impl DecodedPayload {
    /// Classify a parsed JSON document by its root key.
    ///
    /// Fails with [`CoreError::InvalidPayload`] if the root is not an object,
    /// carries both roots or neither, or if the body is not an object.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let Value::Object(mut root) = value else {
            return Err(CoreError::InvalidPayload(
                "payload root is not a JSON object".into(),
            ));
        };

        let blueprint = root.remove(PayloadKind::Blueprint.as_str());
        let book = root.remove(PayloadKind::BlueprintBook.as_str());

        match (blueprint, book) {
            (Some(body), None) => Ok(Self::Blueprint(into_body(body, PayloadKind::Blueprint)?)),
            (None, Some(body)) => Ok(Self::BlueprintBook(into_body(
                body,
                PayloadKind::BlueprintBook,
            )?)),
            (Some(_), Some(_)) => Err(CoreError::InvalidPayload(
                "payload has both a blueprint and a blueprint_book root".into(),
            )),
            (None, None) => Err(CoreError::InvalidPayload(
                "payload has neither a blueprint nor a blueprint_book root".into(),
            )),
        }
    }

    /// Build a payload from a kind and a body.
    pub fn new(kind: PayloadKind, body: Map<String, Value>) -> Self {
        match kind {
            PayloadKind::Blueprint => Self::Blueprint(body),
            PayloadKind::BlueprintBook => Self::BlueprintBook(body),
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Blueprint(_) => PayloadKind::Blueprint,
            Self::BlueprintBook(_) => PayloadKind::BlueprintBook,
        }
    }

    pub fn is_book(&self) -> bool {
        matches!(self, Self::BlueprintBook(_))
    }

    /// The object under the root key.
    pub fn body(&self) -> &Map<String, Value> {
        match self {
            Self::Blueprint(body) | Self::BlueprintBook(body) => body,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.body().get("label").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.body().get("description").and_then(Value::as_str)
    }

    /// The packed 64-bit game version the payload was exported from.
    pub fn version(&self) -> Option<u64> {
        self.body().get("version").and_then(Value::as_u64)
    }

    /// The game version as `major.minor.patch.build`.
    pub fn game_version(&self) -> Option<String> {
        self.version().map(format_game_version)
    }

    /// Rebuild the full JSON document, root key included.
    pub fn to_value(&self) -> Value {
        let mut root = Map::with_capacity(1);
        root.insert(self.kind().as_str().to_owned(), Value::Object(self.body().clone()));
        Value::Object(root)
    }

    pub fn into_value(self) -> Value {
        let kind = self.kind();
        let body = match self {
            Self::Blueprint(body) | Self::BlueprintBook(body) => body,
        };
        let mut root = Map::with_capacity(1);
        root.insert(kind.as_str().to_owned(), Value::Object(body));
        Value::Object(root)
    }
}

/// Unpack a game version: four 16-bit fields, most significant first.
pub fn format_game_version(version: u64) -> String {
    format!(
        "{}.{}.{}.{}",
        (version >> 48) & 0xffff,
        (version >> 32) & 0xffff,
        (version >> 16) & 0xffff,
        version & 0xffff
    )
}

fn into_body(value: Value, kind: PayloadKind) -> Result<Map<String, Value>, CoreError> {
    match value {
        Value::Object(body) => Ok(body),
        _ => Err(CoreError::InvalidPayload(format!(
            "{} body is not a JSON object",
            kind
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classifies_blueprint_root() {
        let payload =
            DecodedPayload::from_value(json!({"blueprint": {"label": "Belt", "item": "blueprint"}}))
                .unwrap();
        assert_eq!(payload.kind(), PayloadKind::Blueprint);
        assert_eq!(payload.label(), Some("Belt"));
    }

    #[test]
    fn test_classifies_book_root() {
        let payload = DecodedPayload::from_value(json!({"blueprint_book": {"label": "Book"}}))
            .unwrap();
        assert!(payload.is_book());
        assert_eq!(payload.description(), None);
    }

    #[test]
    fn test_rejects_ambiguous_or_missing_root() {
        let both = json!({"blueprint": {}, "blueprint_book": {}});
        assert!(matches!(
            DecodedPayload::from_value(both),
            Err(CoreError::InvalidPayload(_))
        ));

        let neither = json!({"upgrade_planner": {}});
        assert!(matches!(
            DecodedPayload::from_value(neither),
            Err(CoreError::InvalidPayload(_))
        ));

        assert!(DecodedPayload::from_value(json!([1, 2])).is_err());
        assert!(DecodedPayload::from_value(json!({"blueprint": "nope"})).is_err());
    }

    #[test]
    fn test_to_value_restores_root_key() {
        let original = json!({"blueprint_book": {"label": "B", "blueprints": []}});
        let payload = DecodedPayload::from_value(original.clone()).unwrap();
        assert_eq!(payload.to_value(), original);
        assert_eq!(payload.into_value(), original);
    }

    #[test]
    fn test_game_version_unpacking() {
        let payload =
            DecodedPayload::from_value(json!({"blueprint": {"version": 281479274823680u64}}))
                .unwrap();
        assert_eq!(payload.game_version().as_deref(), Some("1.1.48.0"));
        assert_eq!(format_game_version(0), "0.0.0.0");
    }

    #[test]
    fn test_kind_from_key() {
        assert_eq!(PayloadKind::from_key("blueprint-book"), Some(PayloadKind::BlueprintBook));
        assert_eq!(PayloadKind::from_key("blueprint_book"), Some(PayloadKind::BlueprintBook));
        assert_eq!(PayloadKind::from_key("blueprint"), Some(PayloadKind::Blueprint));
        assert_eq!(PayloadKind::from_key("deconstruction_planner"), None);
    }
}
