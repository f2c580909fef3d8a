//! Expansion of book trees through persisted records.
//!
//! A stored book's `child_tree` names nested books by id. Following those ids
//! through the store, rather than trusting the embedded subtrees, can loop if
//! the stored links are inconsistent, so the walk carries the set of book ids
//! on the current path and fails on a revisit.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use blueprint_exchange_core::{ChildNode, ChildTree, RecordId};
use blueprint_exchange_store::{BlueprintBook, RecordStore};

use crate::error::{ExchangeError, Result};
use crate::lookup::with_retries;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Rebuild the tree of `book_id` from stored records.
///
/// Shared subtrees are fine; only a book that contains itself, directly or
/// through descendants, is rejected with [`ExchangeError::CyclicTree`].
pub(crate) async fn expand_linked_tree<S>(
    store: &S,
    book_id: &RecordId,
    retries: u32,
) -> Result<ChildTree>
where
    S: RecordStore + ?Sized,
{
    let mut path = HashSet::new();
    path.insert(book_id.clone());

    let root = load_book(store, book_id, retries).await?;
    expand(store, &root.child_tree, &mut path, retries).await
}

fn expand<'a, S>(
    store: &'a S,
    tree: &'a ChildTree,
    path: &'a mut HashSet<RecordId>,
    retries: u32,
) -> BoxFuture<'a, Result<ChildTree>>
where
    S: RecordStore + ?Sized,
{
    Box::pin(async move {
        let mut nodes = Vec::with_capacity(tree.len());

        for node in tree {
            match node {
                ChildNode::Blueprint { .. } => nodes.push(node.clone()),
                ChildNode::BlueprintBook { id, name, .. } => {
                    if !path.insert(id.clone()) {
                        tracing::warn!(book = %id, "book tree links back to an ancestor");
                        return Err(ExchangeError::CyclicTree(id.clone()));
                    }

                    let book = load_book(store, id, retries).await?;
                    let children = expand(store, &book.child_tree, &mut *path, retries).await?;
                    path.remove(id);

                    nodes.push(ChildNode::BlueprintBook {
                        id: id.clone(),
                        name: name.clone(),
                        children,
                    });
                }
            }
        }

        Ok(ChildTree::from(nodes))
    })
}

async fn load_book<S>(store: &S, id: &RecordId, retries: u32) -> Result<BlueprintBook>
where
    S: RecordStore + ?Sized,
{
    with_retries("blueprint book", retries, move || store.get_blueprint_book(id))
        .await?
        .ok_or_else(|| ExchangeError::NotFound(format!("blueprint book {}", id)))
}
