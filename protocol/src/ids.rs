//! # Chain Identifiers & Idempotency Keys
//!
//! Defines the identifier types that hold the protocol together across
//! domains: [`ChainId`] names a domain, and [`MintId`] / [`TransferId`]
//! are the 32-byte idempotency keys that make at-least-once message
//! delivery safe.
//!
//! The keys are content-addressed BLAKE3 hashes of the operation's
//! canonical fields. A relayer that retries a delivery necessarily
//! carries the same key, so the receiving ledger can reject the duplicate
//! without any coordination with the sender — no shared memory, no
//! distributed locks, just a write-once set on the receiving side.
//!
//! Fixed-width integers are encoded little-endian; variable-length string
//! fields are separated by `0x00` bytes so that one field's suffix can
//! never be confused with the next field's prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hash::derive_id;

// ---------------------------------------------------------------------------
// ChainId
// ---------------------------------------------------------------------------

/// Identifies a domain (an independent, serially-consistent ledger).
///
/// The numbering follows the EVM convention the protocol grew up with
/// (1 = hub, 137 = the first spoke), but any distinct `u64` works — the
/// protocol only ever compares chain ids for equality and registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// 32-byte id plumbing
// ---------------------------------------------------------------------------

macro_rules! impl_id_bytes {
    ($name:ident) => {
        impl $name {
            /// Creates an id from raw 32 bytes.
            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Returns the raw 32-byte identifier.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Returns the hex-encoded id.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parses a hex-encoded id.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({}...)"), &self.to_hex()[..12])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// MintId
// ---------------------------------------------------------------------------

/// Idempotency key for a spoke mint.
///
/// Supplied by the caller (in practice, the relayer) and consumed exactly
/// once by a [`SpokePositionMinter`]. Any 32 bytes are a valid key; the
/// [`MintId::derive`] constructor exists so relayers can build keys
/// deterministically from a user and a locally-unique seed.
///
/// [`SpokePositionMinter`]: https://docs.rs/usdx-contracts
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MintId([u8; 32]);

impl_id_bytes!(MintId);

impl MintId {
    /// Derives a mint id from the target user and a caller-chosen seed.
    ///
    /// The seed must be unique per intended mint (a UUID, a request id, a
    /// sequence number). Reusing a seed for the same user reproduces the
    /// same id — which is exactly what a retry wants, and exactly what a
    /// second, distinct mint must avoid.
    pub fn derive(user: &str, seed: &str) -> Self {
        Self(derive_id(
            "usdx-mint-id",
            &[user.as_bytes(), &[0x00], seed.as_bytes()],
        ))
    }
}

// ---------------------------------------------------------------------------
// TransferId
// ---------------------------------------------------------------------------

/// Idempotency key for a cross-domain bridge transfer.
///
/// Derived by the source-side [`BridgeTransferManager`] at initiation from
/// the transfer's canonical fields plus a per-manager monotonic nonce and
/// the initiation timestamp. The id travels inside the
/// `TransferInitiated` event; relayers submit completions with the id they
/// observed rather than re-deriving it (the timestamp input makes
/// independent reconstruction fragile by design — see the repository
/// design notes).
///
/// [`BridgeTransferManager`]: https://docs.rs/usdx-contracts
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId([u8; 32]);

impl_id_bytes!(TransferId);

impl TransferId {
    /// Derives a transfer id from the canonical transfer fields.
    ///
    /// `timestamp_unix` is the initiation time in whole seconds since the
    /// Unix epoch. Two transfers that agree on every other field are still
    /// distinguished by the nonce, which the source bridge increments on
    /// every initiation.
    pub fn derive(
        source_chain: ChainId,
        dest_chain: ChainId,
        sender: &str,
        recipient: &str,
        amount: u64,
        nonce: u64,
        timestamp_unix: i64,
    ) -> Self {
        Self(derive_id(
            "usdx-transfer-id",
            &[
                &source_chain.0.to_le_bytes(),
                &dest_chain.0.to_le_bytes(),
                sender.as_bytes(),
                &[0x00],
                recipient.as_bytes(),
                &[0x00],
                &amount.to_le_bytes(),
                &nonce.to_le_bytes(),
                &timestamp_unix.to_le_bytes(),
            ],
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
