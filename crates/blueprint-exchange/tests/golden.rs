//! Golden exchange strings checked end to end.
//!
//! Every implementation must agree on:
//! - the content hash of the raw string
//! - the decoded root kind and label
//! - the order and nesting of a book's children

use blueprint_exchange::store::{MemoryStore, RecordStore, SqliteStore};
use blueprint_exchange::{
    decode, decode_with_hash, encode, hash, ChildNode, ChildTree, ChildTreeResolver, ContentHash,
    Exchange, ExchangeConfig, PageInfo, PayloadKind, SelectionQuery,
};
use blueprint_exchange_testkit::generators::book_payload;
use blueprint_exchange_testkit::vectors::{all_vectors, EMPTY_BOOK, NESTED_BOOK};
use proptest::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn shape(tree: &ChildTree) -> Vec<String> {
    tree.iter()
        .map(|node| match node {
            ChildNode::Blueprint { name, .. } => name.clone(),
            ChildNode::BlueprintBook { name, children, .. } => {
                format!("{}[{}]", name, shape(children).join(","))
            }
        })
        .collect()
}

#[test]
fn test_golden_hashes() {
    for vector in all_vectors() {
        let (computed, payload) = decode_with_hash(vector.exchange).unwrap();

        let expected = hex::decode(vector.expected_hash).unwrap();
        assert_eq!(
            computed.as_bytes().as_slice(),
            expected.as_slice(),
            "hash mismatch for {}",
            vector.name
        );
        assert_eq!(computed, ContentHash::from_hex(vector.expected_hash).unwrap());
        assert_eq!(payload.kind(), vector.kind, "kind mismatch for {}", vector.name);
        assert_eq!(payload.label(), Some(vector.label));
    }
}

#[test]
fn test_reencoding_is_stable() {
    for vector in all_vectors() {
        let payload = decode(vector.exchange).unwrap();
        let reencoded = encode(&payload).unwrap();

        assert_eq!(decode(&reencoded).unwrap(), payload);
        assert_eq!(
            hash(reencoded.as_bytes()),
            hash(encode(&payload).unwrap().as_bytes()),
            "encoding is not deterministic for {}",
            vector.name
        );
    }
}

#[test]
fn test_surrounding_whitespace_changes_hash_only() {
    let padded = format!("  {}\n", NESTED_BOOK.exchange);

    let (padded_hash, padded_payload) = decode_with_hash(&padded).unwrap();
    let (hash, payload) = decode_with_hash(NESTED_BOOK.exchange).unwrap();

    assert_eq!(padded_payload, payload);
    assert_ne!(padded_hash, hash);
}

#[test]
fn test_nested_book_tree() {
    let payload = decode(NESTED_BOOK.exchange).unwrap();
    let tree = ChildTreeResolver::new().resolve(&payload).unwrap();

    assert_eq!(shape(&tree), vec!["A", "B[C]"]);
    assert_eq!(tree.node_count(), 3);
    assert_eq!(tree.depth(), 2);
}

#[test]
fn test_empty_book_tree() {
    let payload = decode(EMPTY_BOOK.exchange).unwrap();
    assert_eq!(payload.kind(), PayloadKind::BlueprintBook);

    let tree = ChildTreeResolver::new().resolve(&payload).unwrap();
    assert!(tree.is_empty());
}

#[tokio::test]
async fn test_import_vectors_into_sqlite() {
    init_tracing();
    let exchange = Exchange::new(SqliteStore::open_memory().unwrap(), ExchangeConfig::default());

    for vector in all_vectors() {
        let imported = exchange
            .import(vector.exchange, PageInfo::new(""))
            .await
            .unwrap();
        assert!(imported.created, "{} was not created", vector.name);
        assert_eq!(imported.hash.to_hex(), vector.expected_hash);
        assert_eq!(imported.page.title, vector.label);

        let stored = exchange.exchange_string(&imported.hash).await.unwrap();
        assert_eq!(stored, vector.exchange);

        let again = exchange
            .import(vector.exchange, PageInfo::new("Again"))
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.target, imported.target);
    }

    let listing = exchange.recent_pages(1, 10, None).await.unwrap();
    assert_eq!(listing.count, 2 * all_vectors().len() as u64);
}

#[tokio::test]
async fn test_nested_book_survives_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blueprints.db");

    let (page_id, book_id) = {
        let exchange = Exchange::new(SqliteStore::open(&path).unwrap(), ExchangeConfig::default());
        let imported = exchange
            .import(NESTED_BOOK.exchange, PageInfo::new("Nested"))
            .await
            .unwrap();
        assert_eq!(imported.children_created, 3);
        (imported.page.id, imported.target.id().clone())
    };

    let exchange = Exchange::new(SqliteStore::open(&path).unwrap(), ExchangeConfig::default());

    let expanded = exchange.expand_linked_tree(&book_id).await.unwrap();
    assert_eq!(shape(&expanded), vec!["A", "B[C]"]);

    let nested = match expanded.iter().nth(1) {
        Some(ChildNode::BlueprintBook { id, .. }) => id.clone(),
        other => panic!("expected a nested book, got {:?}", other),
    };
    let view = exchange
        .resolve_selection(&page_id, &SelectionQuery::book(nested.clone()))
        .await
        .unwrap();
    assert_eq!(view.selected.id(), &nested);

    let payload = exchange.decode_selected(&view.selected).await.unwrap();
    assert_eq!(payload.label(), Some("B"));
    assert!(payload.is_book());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_imported_tree_matches_linked_records(book in book_payload(2)) {
        let exchange_string = encode(&book).unwrap();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();

        rt.block_on(async {
            let exchange = Exchange::new(MemoryStore::new(), ExchangeConfig::default());
            let imported = exchange
                .import(&exchange_string, PageInfo::new("Generated"))
                .await
                .unwrap();

            let stored = exchange
                .store()
                .get_blueprint_book(imported.target.id())
                .await
                .unwrap()
                .unwrap();
            let resolved = ChildTreeResolver::new().resolve(&book).unwrap();
            assert_eq!(stored.child_tree.node_count(), resolved.node_count());
            assert!(imported.children_created <= resolved.node_count());

            let expanded = exchange.expand_linked_tree(imported.target.id()).await.unwrap();
            assert_eq!(expanded, stored.child_tree);
        });
    }
}
