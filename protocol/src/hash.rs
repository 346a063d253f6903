//! # Hashing Utilities
//!
//! BLAKE3 helpers used for identifier derivation throughout USDX. The
//! protocol never needs a second hash function: ids are internal to the
//! protocol, so there is no interoperability pressure, and BLAKE3 is fast
//! on every platform that matters.
//!
//! Two properties matter for idempotency keys:
//!
//! - **Determinism** — the same inputs always produce the same id, so a
//!   relayer retrying a delivery carries the same key and the target
//!   ledger can reject the duplicate.
//! - **Domain separation** — a transfer id and a mint id derived from
//!   coincidentally identical field bytes must never collide. We use
//!   BLAKE3's `derive_key` mode with a per-id-type context string, which
//!   makes cross-context collisions impossible by construction.

/// Compute the BLAKE3 hash of the input data.
///
/// Returns the 32-byte digest as a fixed-size array.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Compute a domain-separated BLAKE3 hash over multiple byte slices.
///
/// The parts are fed sequentially into the hasher — same result as
/// hashing the concatenation, without the temporary buffer. Callers are
/// responsible for making their encoding unambiguous (fixed-width
/// integers, separator bytes between variable-length fields).
///
/// The `context` string selects a distinct internal IV via BLAKE3's
/// `derive_key` mode. Do not prepend the context to the data manually;
/// that is a weaker construction.
pub fn derive_id(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
