//! Golden exchange strings with known content hashes.
//!
//! Each string was produced by the game's own encoder settings (zlib level 9,
//! compact JSON). The hashes are SHA-1 over the exact string bytes, so they pin
//! both the hash function and the "hash the raw string" rule.

use blueprint_exchange_core::{decode, hash, PayloadKind};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The exchange string.
    pub exchange: &'static str,
    /// Expected content hash (lowercase hex).
    pub expected_hash: &'static str,
    /// Expected root kind.
    pub kind: PayloadKind,
    /// Expected root label.
    pub label: &'static str,
}

/// A single blueprint with one belt entity.
pub const BELT: GoldenVector = GoldenVector {
    name: "blueprint with one belt",
    exchange: "0eNp1jsEOgjAMht+l52kAUXBHX8MYM7QxTUa3bMVAyN5dBh68eGr7p9+Xf4bODugDsYCeAVlICCPo6/eY7jz0HQbQpQI2PYIGCYajd0F2HVoBBd7FBXOcFSPoYn9UMK0zpZsCejjelMRPHFdVpBcbm4F/Upl8zkmwh02TN/1TWIE1y/OSXTbkjSGuNaq2rJtz1dRtdTi1RUof6dpMPw==",
    expected_hash: "171af11311e028eda8bdbadefab7782bcddb667d",
    kind: PayloadKind::Blueprint,
    label: "Belt",
};

/// Book `[blueprint A, book B [blueprint C]]`.
pub const NESTED_BOOK: GoldenVector = GoldenVector {
    name: "book with a nested book",
    exchange: "0eNrNj0EOgjAQRe8y62oAUbA79BjGEKqzaISWtIVImt7dUky6wYSlq/bPzH8z3wJrB+wVF6ZmUr6AWmgeho9Yc/HEN9CExBEN9GajnIdRGG44Lp0gploMHUMFNCUgmg6BAhcalfE1Ar3U3iDFbJ7x+yOBKbzO3Qlwg503xB0E2oZh62uV/4+odDBnZZoX56zIy+xwKhPnnd97HbErof4kw3VjhhXKLkSJqMsmVLoJtcifNPcBKhixug==",
    expected_hash: "03a9eed36204232d5eb112dd0c4bf9875bd76e63",
    kind: PayloadKind::BlueprintBook,
    label: "Book",
};

/// A book with no `blueprints` key at all.
pub const EMPTY_BOOK: GoldenVector = GoldenVector {
    name: "empty book",
    exchange: "0eNqrVkrKKU0tKMrMK4lPys/PVrKqVsosSc1VskJI6IIldJRyEpNSc4ASrrkFJZVAfllqUXFmfp6SlZGFoYm5pZG5iYWRsZmFQW0tACMQHDA=",
    expected_hash: "1480fdd151a3e4f3b510c0f72586d09a7c9d397a",
    kind: PayloadKind::BlueprintBook,
    label: "Empty",
};

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![BELT, NESTED_BOOK, EMPTY_BOOK]
}

/// Check every vector: it must decode to the expected kind and label, and
/// hash to the expected digest.
///
/// Returns `(name, ok, computed hash or error)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let computed = hash(v.exchange.as_bytes()).to_hex();
            let ok = match decode(v.exchange) {
                Ok(payload) => {
                    computed == v.expected_hash
                        && payload.kind() == v.kind
                        && payload.label() == Some(v.label)
                }
                Err(e) => return (v.name.to_string(), false, e.to_string()),
            };
            (v.name.to_string(), ok, computed)
        })
        .collect()
}
