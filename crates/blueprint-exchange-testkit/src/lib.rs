//! # Blueprint Exchange Testkit
//!
//! Testing utilities for the blueprint exchange.
//!
//! ## Overview
//!
//! - **Golden vectors**: exchange strings with their expected content hashes
//! - **Generators**: Proptest strategies for blueprint and book payloads
//! - **Fixtures**: payload builders, a seeded store, and fault-injecting store wrappers
//!
//! ## Golden Vectors
//!
//! ```rust
//! use blueprint_exchange_testkit::vectors::all_vectors;
//! use blueprint_exchange_core::hash;
//!
//! for vector in all_vectors() {
//!     assert_eq!(hash(vector.exchange.as_bytes()).to_hex(), vector.expected_hash);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use blueprint_exchange_testkit::generators::payload;
//!
//! proptest! {
//!     #[test]
//!     fn decode_inverts_encode(p in payload()) {
//!         let s = blueprint_exchange_core::encode(&p).unwrap();
//!         prop_assert_eq!(blueprint_exchange_core::decode(&s).unwrap(), p);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    sample_blueprint, sample_book, seeded_store, FlakyStore, SeededStore, StaleReadStore,
};
pub use generators::{book_payload, payload};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
