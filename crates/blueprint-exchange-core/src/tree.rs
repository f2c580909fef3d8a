//! Child trees: the nested listing of a blueprint book's contents.
//!
//! A book's whole structure is embedded in its one exchange string, so the
//! tree is built from the decoded payload alone, with no lookups. The JSON is
//! tree-shaped, so the walk cannot revisit a node; recursion depth is bounded
//! by the nesting of the payload (and serde_json's parser limit before that).
//!
//! Persisted shape, consumed as-is by the UI:
//!
//! ```json
//! [
//!   {"type": "blueprint", "id": "…", "name": "A"},
//!   {"type": "blueprint_book", "id": "…", "name": "B", "children": [ … ]}
//! ]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::encode;
use crate::error::CoreError;
use crate::hash::hash;
use crate::payload::{DecodedPayload, PayloadKind};
use crate::types::RecordId;

/// One node of a [`ChildTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChildNode {
    Blueprint {
        id: RecordId,
        name: String,
    },
    BlueprintBook {
        id: RecordId,
        name: String,
        children: ChildTree,
    },
}

impl ChildNode {
    pub fn id(&self) -> &RecordId {
        match self {
            ChildNode::Blueprint { id, .. } | ChildNode::BlueprintBook { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ChildNode::Blueprint { name, .. } | ChildNode::BlueprintBook { name, .. } => name,
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            ChildNode::Blueprint { .. } => PayloadKind::Blueprint,
            ChildNode::BlueprintBook { .. } => PayloadKind::BlueprintBook,
        }
    }

    /// Nested children; `None` for blueprint leaves.
    pub fn children(&self) -> Option<&ChildTree> {
        match self {
            ChildNode::Blueprint { .. } => None,
            ChildNode::BlueprintBook { children, .. } => Some(children),
        }
    }
}

/// Ordered sequence of child nodes. Serializes as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildTree(pub Vec<ChildNode>);

impl ChildTree {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChildNode> {
        self.0.iter()
    }

    /// Depth-first search for a node by id.
    pub fn find(&self, id: &RecordId) -> Option<&ChildNode> {
        for node in &self.0 {
            if node.id() == id {
                return Some(node);
            }
            if let Some(found) = node.children().and_then(|c| c.find(id)) {
                return Some(found);
            }
        }
        None
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.find(id).is_some()
    }

    /// Total number of nodes at every level.
    pub fn node_count(&self) -> usize {
        self.0
            .iter()
            .map(|n| 1 + n.children().map_or(0, ChildTree::node_count))
            .sum()
    }

    /// Nesting depth; an empty tree has depth 0.
    pub fn depth(&self) -> usize {
        self.0
            .iter()
            .map(|n| 1 + n.children().map_or(0, ChildTree::depth))
            .max()
            .unwrap_or(0)
    }

    /// Rewrite every id in the tree, preserving shape and order.
    pub fn map_ids<F>(&self, f: &mut F) -> ChildTree
    where
        F: FnMut(&RecordId) -> RecordId,
    {
        let mut nodes = Vec::with_capacity(self.0.len());
        for node in &self.0 {
            nodes.push(match node {
                ChildNode::Blueprint { id, name } => ChildNode::Blueprint {
                    id: f(id),
                    name: name.clone(),
                },
                ChildNode::BlueprintBook { id, name, children } => ChildNode::BlueprintBook {
                    id: f(id),
                    name: name.clone(),
                    children: children.map_ids(&mut *f),
                },
            });
        }
        ChildTree(nodes)
    }
}

impl<'a> IntoIterator for &'a ChildTree {
    type Item = &'a ChildNode;
    type IntoIter = std::slice::Iter<'a, ChildNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<ChildNode>> for ChildTree {
    fn from(nodes: Vec<ChildNode>) -> Self {
        Self(nodes)
    }
}

/// A child found while walking a book payload, handed to [`ChildIdentity`].
///
/// Books are reported after their own children have been resolved, so the
/// identity can see the finished subtree.
#[derive(Debug)]
pub enum ChildEntry<'a> {
    Blueprint {
        body: &'a Map<String, Value>,
    },
    BlueprintBook {
        body: &'a Map<String, Value>,
        children: &'a ChildTree,
    },
}

impl ChildEntry<'_> {
    pub fn kind(&self) -> PayloadKind {
        match self {
            ChildEntry::Blueprint { .. } => PayloadKind::Blueprint,
            ChildEntry::BlueprintBook { .. } => PayloadKind::BlueprintBook,
        }
    }

    pub fn body(&self) -> &Map<String, Value> {
        match self {
            ChildEntry::Blueprint { body } | ChildEntry::BlueprintBook { body, .. } => body,
        }
    }

    /// Label shown as the node name; empty when the entry has none.
    pub fn name(&self) -> String {
        self.body()
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    }

    /// The entry as a standalone payload, ready to encode.
    pub fn to_payload(&self) -> DecodedPayload {
        DecodedPayload::new(self.kind(), self.body().clone())
    }
}

/// Assigns record ids to children as the tree is built.
pub trait ChildIdentity {
    fn assign(&mut self, entry: &ChildEntry<'_>) -> Result<RecordId, CoreError>;
}

/// Identifies each child by the content hash of its own re-encoded string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentIdentity;

impl ChildIdentity for ContentIdentity {
    fn assign(&mut self, entry: &ChildEntry<'_>) -> Result<RecordId, CoreError> {
        let exchange = encode(&entry.to_payload())?;
        Ok(RecordId::from_hash(&hash(exchange.as_bytes())))
    }
}

impl<F> ChildIdentity for F
where
    F: FnMut(&ChildEntry<'_>) -> Result<RecordId, CoreError>,
{
    fn assign(&mut self, entry: &ChildEntry<'_>) -> Result<RecordId, CoreError> {
        self(entry)
    }
}

/// Builds a [`ChildTree`] from a book payload.
#[derive(Debug)]
pub struct ChildTreeResolver<I = ContentIdentity> {
    identity: I,
}

impl ChildTreeResolver<ContentIdentity> {
    pub fn new() -> Self {
        Self {
            identity: ContentIdentity,
        }
    }
}

impl Default for ChildTreeResolver<ContentIdentity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ChildIdentity> ChildTreeResolver<I> {
    pub fn with_identity(identity: I) -> Self {
        Self { identity }
    }

    pub fn into_identity(self) -> I {
        self.identity
    }

    /// Resolve the children of a decoded book payload.
    ///
    /// A blueprint payload has no children and is rejected.
    pub fn resolve(&mut self, payload: &DecodedPayload) -> Result<ChildTree, CoreError> {
        match payload {
            DecodedPayload::BlueprintBook(body) => self.resolve_book(body),
            DecodedPayload::Blueprint(_) => Err(CoreError::InvalidPayload(
                "child trees can only be built for blueprint books".into(),
            )),
        }
    }

    /// Resolve the `blueprints` list of a book body, depth-first.
    ///
    /// Entries are ordered by their `index` field (source position when it is
    /// absent); ties keep source order. Entries that are neither blueprints
    /// nor books, such as upgrade or deconstruction planners, are skipped.
    pub fn resolve_book(&mut self, book: &Map<String, Value>) -> Result<ChildTree, CoreError> {
        let entries = match book.get("blueprints") {
            None | Some(Value::Null) => return Ok(ChildTree::new()),
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(CoreError::InvalidPayload(
                    "book `blueprints` field is not an array".into(),
                ))
            }
        };

        let mut ordered = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            let Value::Object(entry) = entry else {
                return Err(CoreError::InvalidPayload(format!(
                    "book entry {} is not a JSON object",
                    position
                )));
            };
            let index = entry
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(position as u64);
            ordered.push((index, entry));
        }
        ordered.sort_by_key(|(index, _)| *index);

        let mut tree = Vec::with_capacity(ordered.len());
        for (_, entry) in ordered {
            let Some((kind, body)) = classify_entry(entry)? else {
                continue;
            };

            let node = match kind {
                PayloadKind::Blueprint => {
                    let child = ChildEntry::Blueprint { body };
                    ChildNode::Blueprint {
                        id: self.identity.assign(&child)?,
                        name: child.name(),
                    }
                }
                PayloadKind::BlueprintBook => {
                    let children = self.resolve_book(body)?;
                    let child = ChildEntry::BlueprintBook {
                        body,
                        children: &children,
                    };
                    let id = self.identity.assign(&child)?;
                    let name = child.name();
                    ChildNode::BlueprintBook { id, name, children }
                }
            };
            tree.push(node);
        }

        Ok(ChildTree(tree))
    }
}

/// Work out which kind of child an entry holds and where its body lives.
///
/// The game nests the body under a `blueprint` / `blueprint_book` key. Flat
/// entries carrying an `item` discriminator alongside the body fields are
/// accepted too.
fn classify_entry(
    entry: &Map<String, Value>,
) -> Result<Option<(PayloadKind, &Map<String, Value>)>, CoreError> {
    for kind in [PayloadKind::Blueprint, PayloadKind::BlueprintBook] {
        if let Some(body) = entry.get(kind.as_str()) {
            return match body {
                Value::Object(body) => Ok(Some((kind, body))),
                _ => Err(CoreError::InvalidPayload(format!(
                    "{} entry body is not a JSON object",
                    kind
                ))),
            };
        }
    }

    Ok(entry
        .get("item")
        .and_then(Value::as_str)
        .and_then(PayloadKind::from_key)
        .map(|kind| (kind, entry)))
}
