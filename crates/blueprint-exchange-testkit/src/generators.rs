//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use blueprint_exchange_core::{DecodedPayload, PayloadKind};

use crate::fixtures::GAME_VERSION;

/// Generate a label, possibly empty or non-ASCII.
pub fn label() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9 _-]{0,24}".prop_map(String::from),
        "\\PC{1,12}".prop_map(String::from),
    ]
}

/// Generate an entity name.
pub fn entity_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "transport-belt",
        "inserter",
        "assembling-machine-2",
        "stone-furnace",
        "small-electric-pole",
    ])
}

/// Generate a coordinate: either on the half-tile grid or an arbitrary
/// decimal, as rail and curved-belt layouts produce.
pub fn coordinate() -> impl Strategy<Value = f64> {
    prop_oneof![
        (-64i32..64).prop_map(|n| f64::from(n) + 0.5),
        -1000.0f64..1000.0,
    ]
}

/// Generate a list of entities.
pub fn entities(max_len: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(
        (entity_name(), coordinate(), coordinate(), prop::option::of(0.0f64..1.0)),
        0..=max_len,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (name, x, y, orientation))| {
                let mut entity = json!({
                    "entity_number": i + 1,
                    "name": name,
                    "position": {"x": x, "y": y},
                });
                if let Some(orientation) = orientation {
                    entity["orientation"] = json!(orientation);
                }
                entity
            })
            .collect()
    })
}

/// Generate a blueprint body.
pub fn blueprint_body() -> impl Strategy<Value = Map<String, Value>> {
    (label(), prop::option::of(label()), entities(8)).prop_map(|(label, description, entities)| {
        let mut body = Map::new();
        body.insert("item".into(), json!("blueprint"));
        body.insert("label".into(), json!(label));
        if let Some(description) = description {
            body.insert("description".into(), json!(description));
        }
        body.insert("entities".into(), Value::Array(entities));
        body.insert("version".into(), json!(GAME_VERSION));
        body
    })
}

/// Generate a blueprint payload.
pub fn blueprint_payload() -> impl Strategy<Value = DecodedPayload> {
    blueprint_body().prop_map(|body| DecodedPayload::new(PayloadKind::Blueprint, body))
}

/// Generate a book body nested at most `depth` books deep.
pub fn book_body(depth: u32) -> BoxedStrategy<Map<String, Value>> {
    let child: BoxedStrategy<(PayloadKind, Map<String, Value>)> = if depth == 0 {
        blueprint_body()
            .prop_map(|body| (PayloadKind::Blueprint, body))
            .boxed()
    } else {
        prop_oneof![
            3 => blueprint_body().prop_map(|body| (PayloadKind::Blueprint, body)),
            1 => book_body(depth - 1).prop_map(|body| (PayloadKind::BlueprintBook, body)),
        ]
        .boxed()
    };

    (label(), prop::collection::vec(child, 0..4))
        .prop_map(|(label, children)| {
            let entries: Vec<Value> = children
                .into_iter()
                .enumerate()
                .map(|(index, (kind, body))| {
                    let mut entry = Map::new();
                    entry.insert("index".into(), json!(index));
                    entry.insert(kind.as_str().into(), Value::Object(body));
                    Value::Object(entry)
                })
                .collect();

            let mut body = Map::new();
            body.insert("item".into(), json!("blueprint-book"));
            body.insert("label".into(), json!(label));
            body.insert("blueprints".into(), Value::Array(entries));
            body.insert("version".into(), json!(GAME_VERSION));
            body
        })
        .boxed()
}

/// Generate a book payload nested at most `depth` books deep.
pub fn book_payload(depth: u32) -> impl Strategy<Value = DecodedPayload> {
    book_body(depth).prop_map(|body| DecodedPayload::new(PayloadKind::BlueprintBook, body))
}

/// Generate either kind of payload.
pub fn payload() -> impl Strategy<Value = DecodedPayload> {
    prop_oneof![blueprint_payload(), book_payload(2)]
}

/// Count the blueprint and book entries nested anywhere under a book body.
pub fn count_entries(body: &Map<String, Value>) -> usize {
    let Some(Value::Array(entries)) = body.get("blueprints") else {
        return 0;
    };
    entries
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| match entry.get("blueprint_book").and_then(Value::as_object) {
            Some(book) => 1 + count_entries(book),
            None => 1,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_exchange_core::{decode, encode, ChildTreeResolver};

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(payload in payload()) {
            let exchange = encode(&payload).unwrap();
            prop_assert_eq!(decode(&exchange).unwrap(), payload);
        }

        #[test]
        fn prop_tree_covers_every_entry(book in book_payload(3)) {
            let tree = ChildTreeResolver::new().resolve(&book).unwrap();
            prop_assert_eq!(tree.node_count(), count_entries(book.body()));
            prop_assert!(tree.depth() <= 4);
        }
    }
}
