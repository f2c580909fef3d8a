//! Persisted record types.
//!
//! Records are plain data: the store owns them, callers get clones. All
//! timestamps are Unix seconds.

use serde::{Deserialize, Serialize};

use blueprint_exchange_core::{ChildTree, ContentHash, PayloadKind, RecordId};

use crate::error::{Result, StoreError};

/// A single stored blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: RecordId,
    pub label: String,
    pub description: Option<String>,
    pub game_version: Option<String>,
    /// Hash of the blueprint's exchange string.
    pub blueprint_hash: ContentHash,
    /// Key of the rendered image.
    pub image_hash: ContentHash,
    pub tags: Vec<String>,
    /// Id of the listing this record was migrated from, if any.
    #[serde(default)]
    pub factorioprints_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A stored blueprint book, with its child tree materialized at import time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintBook {
    pub id: RecordId,
    pub label: String,
    pub description: Option<String>,
    pub child_tree: ChildTree,
    pub blueprint_hash: ContentHash,
    pub is_modded: bool,
    #[serde(default)]
    pub factorioprints_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// What a page points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageTarget {
    Blueprint(RecordId),
    BlueprintBook(RecordId),
}

impl PageTarget {
    pub fn kind(&self) -> PayloadKind {
        match self {
            PageTarget::Blueprint(_) => PayloadKind::Blueprint,
            PageTarget::BlueprintBook(_) => PayloadKind::BlueprintBook,
        }
    }

    pub fn id(&self) -> &RecordId {
        match self {
            PageTarget::Blueprint(id) | PageTarget::BlueprintBook(id) => id,
        }
    }
}

/// A user-facing page wrapping exactly one blueprint or book.
///
/// `blueprint_id` and `blueprint_book_id` are mutually exclusive; use
/// [`BlueprintPage::target`] rather than reading them directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintPage {
    pub id: RecordId,
    pub blueprint_id: Option<RecordId>,
    pub blueprint_book_id: Option<RecordId>,
    pub title: String,
    pub description_markdown: String,
    pub tags: Vec<String>,
    /// External listing id; unique across pages when set.
    #[serde(default)]
    pub factorioprints_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BlueprintPage {
    /// Create a page for the given target, stamped with the current time.
    pub fn new(
        target: PageTarget,
        title: impl Into<String>,
        description_markdown: impl Into<String>,
    ) -> Self {
        let now = now_secs();
        let (blueprint_id, blueprint_book_id) = match target {
            PageTarget::Blueprint(id) => (Some(id), None),
            PageTarget::BlueprintBook(id) => (None, Some(id)),
        };
        Self {
            id: RecordId::generate(),
            blueprint_id,
            blueprint_book_id,
            title: title.into(),
            description_markdown: description_markdown.into(),
            tags: Vec::new(),
            factorioprints_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The page's target, or `None` if both or neither ids are set.
    pub fn target(&self) -> Option<PageTarget> {
        match (&self.blueprint_id, &self.blueprint_book_id) {
            (Some(id), None) => Some(PageTarget::Blueprint(id.clone())),
            (None, Some(id)) => Some(PageTarget::BlueprintBook(id.clone())),
            _ => None,
        }
    }
}

/// A raw exchange string, stored under its content hash.
///
/// `blueprint_id` names the owning blueprint; strings of books leave it
/// unset. Every string is revision 1 with empty change notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintString {
    pub blueprint_hash: ContentHash,
    pub exchange_string: String,
    #[serde(default)]
    pub blueprint_id: Option<RecordId>,
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default)]
    pub changes_markdown: String,
    pub created_at: i64,
}

fn first_version() -> u32 {
    1
}

/// One page of a page listing, plus the total match count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageListing {
    pub count: u64,
    pub rows: Vec<BlueprintPage>,
}

/// Reject an exchange string that does not hash to the record's key.
pub(crate) fn check_string_hash(expected: &ContentHash, exchange: &str) -> Result<()> {
    let actual = ContentHash::compute(exchange.as_bytes());
    if &actual != expected {
        return Err(StoreError::InvalidData(format!(
            "exchange string hashes to {}, record says {}",
            actual, expected
        )));
    }
    Ok(())
}

/// The page's target, or `InvalidData` if the id pair is malformed.
pub(crate) fn require_target(page: &BlueprintPage) -> Result<PageTarget> {
    page.target().ok_or_else(|| {
        StoreError::InvalidData(format!(
            "page {} must point at exactly one blueprint or book",
            page.id
        ))
    })
}

/// Current time in Unix seconds.
pub fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_target_is_exclusive() {
        let page = BlueprintPage::new(PageTarget::BlueprintBook(RecordId::new("b1")), "t", "d");
        assert_eq!(page.target(), Some(PageTarget::BlueprintBook(RecordId::new("b1"))));
        assert!(page.blueprint_id.is_none());

        let mut both = page.clone();
        both.blueprint_id = Some(RecordId::new("x"));
        assert_eq!(both.target(), None);

        let mut neither = page;
        neither.blueprint_book_id = None;
        assert_eq!(neither.target(), None);
    }

    #[test]
    fn test_book_record_serializes_child_tree_as_array() {
        let book = BlueprintBook {
            id: RecordId::new("b"),
            label: "Book".into(),
            description: None,
            child_tree: ChildTree::new(),
            blueprint_hash: ContentHash::compute(b"0abc"),
            is_modded: false,
            factorioprints_id: None,
            created_at: 1,
            updated_at: 1,
        };
        let value = serde_json::to_value(&book).unwrap();
        assert!(value["child_tree"].is_array());
        assert_eq!(value["blueprint_hash"].as_str().unwrap().len(), 40);
    }

    #[test]
    fn test_string_record_defaults_to_first_revision() {
        let value = serde_json::json!({
            "blueprint_hash": ContentHash::compute(b"0abc").to_hex(),
            "exchange_string": "0abc",
            "created_at": 1,
        });
        let string: BlueprintString = serde_json::from_value(value).unwrap();
        assert_eq!(string.version, 1);
        assert!(string.blueprint_id.is_none());
        assert!(string.changes_markdown.is_empty());
    }
}
