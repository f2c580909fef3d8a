//! Exchange-string codec.
//!
//! Wire format: `<version:1 ASCII digit><base64(zlib(utf8(json)))>`.
//!
//! - Version `'0'` is the only one defined; anything else is rejected.
//! - Base64 is the standard alphabet with padding.
//! - The compressed stream is zlib-wrapped DEFLATE (no gzip header).
//!
//! Encoding is not byte-stable against strings produced elsewhere: key order,
//! whitespace and compression parameters may differ. Only the decoded
//! payloads are guaranteed equal across `decode(encode(decode(s)))`.

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

use crate::error::CoreError;
use crate::hash::{hash, ContentHash};
use crate::payload::DecodedPayload;

/// The only supported format-version tag.
pub const VERSION_TAG: char = '0';

/// Decode an exchange string into its payload.
///
/// Surrounding ASCII whitespace is ignored; pasted strings often carry a
/// trailing newline.
pub fn decode(exchange: &str) -> Result<DecodedPayload, CoreError> {
    let exchange = exchange.trim_matches(|c: char| c.is_ascii_whitespace());

    let mut chars = exchange.chars();
    let version = chars
        .next()
        .ok_or_else(|| CoreError::MalformedEncoding("empty exchange string".into()))?;
    if version != VERSION_TAG {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let body = chars.as_str();
    if body.is_empty() {
        return Err(CoreError::MalformedEncoding(
            "exchange string has no body after the version tag".into(),
        ));
    }

    let compressed = STANDARD
        .decode(body)
        .map_err(|e| CoreError::MalformedEncoding(e.to_string()))?;

    let json = inflate(&compressed)?;

    let text = String::from_utf8(json)
        .map_err(|e| CoreError::InvalidPayload(format!("payload is not UTF-8: {}", e)))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| CoreError::InvalidPayload(e.to_string()))?;

    DecodedPayload::from_value(value)
}

/// Decode an exchange string and compute its content hash in one step.
///
/// The hash covers the raw input, untrimmed.
pub fn decode_with_hash(exchange: &str) -> Result<(ContentHash, DecodedPayload), CoreError> {
    let payload = decode(exchange)?;
    Ok((hash(exchange.as_bytes()), payload))
}

/// Encode a payload into a version-`'0'` exchange string.
pub fn encode(payload: &DecodedPayload) -> Result<String, CoreError> {
    let json =
        serde_json::to_vec(&payload.to_value()).map_err(|e| CoreError::Encoding(e.to_string()))?;

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(json.len() / 2), Compression::best());
    encoder
        .write_all(&json)
        .map_err(|e| CoreError::Encoding(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CoreError::Encoding(e.to_string()))?;

    let mut out = String::with_capacity(1 + compressed.len() * 4 / 3 + 4);
    out.push(VERSION_TAG);
    STANDARD.encode_string(&compressed, &mut out);
    Ok(out)
}

/// Inflate a complete zlib stream.
///
/// A stream that ends before its terminator is reported as corrupt rather
/// than returning the partial output.
fn inflate(compressed: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(compressed.len().saturating_mul(4).max(256));

    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity());
        }

        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();

        let status = inflater
            .decompress_vec(&compressed[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| CoreError::CorruptPayload(e.to_string()))?;

        if status == Status::StreamEnd {
            return Ok(out);
        }

        let stalled = inflater.total_in() as usize == consumed && inflater.total_out() == produced;
        if stalled && out.len() < out.capacity() {
            return Err(CoreError::CorruptPayload("truncated deflate stream".into()));
        }
    }
}
