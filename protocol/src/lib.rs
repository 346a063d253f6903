// Copyright (c) 2026 USDX Protocol Contributors. MIT License.
// See LICENSE for details.

//! # USDX Protocol — Core Primitives
//!
//! USDX is a two-domain value-accounting protocol: a hub domain holds USDC
//! collateral and mints the yield-bearing USDX token 1:1 against deposits;
//! spoke domains mint USDX against a relayer-attested snapshot of a user's
//! hub position; a bridge moves already-minted USDX between domains by
//! burning on the source and minting on the destination.
//!
//! This crate holds the primitives shared by every domain:
//!
//! - **token** — The per-domain token ledger: balances, supply, and
//!   role-gated mint/burn. Every asset on every domain is one of these.
//! - **roles** — Role-based authorization. An explicit table maps roles to
//!   the ledger operations they permit; every mutating entrypoint checks
//!   it first.
//! - **ids** — Chain identifiers and the 32-byte idempotency keys
//!   (`MintId`, `TransferId`) that make at-least-once delivery safe.
//! - **events** — The events domains append to their logs and relayers
//!   consume.
//! - **hash** — BLAKE3 helpers for deterministic id derivation.
//! - **config** — Protocol constants and well-known addresses.
//!
//! ## Design Principles
//!
//! 1. **All amounts are `u64` in smallest-unit denomination.** No floating
//!    point anywhere near the books. Decimals exist for display only.
//! 2. **Idempotency keys are the only concurrency control.** Domains never
//!    share memory and never block on each other; a duplicate key is
//!    rejected as a no-op, never merged into a second effect.
//! 3. **Authorization is a pure predicate.** Role checks happen as the
//!    first step of every mutating call, against an explicit table.
//! 4. **Serializable state.** Every struct derives `Serialize` and
//!    `Deserialize` so domain state can be snapshotted for recovery or
//!    shipped over the wire.

pub mod config;
pub mod events;
pub mod hash;
pub mod ids;
pub mod roles;
pub mod token;

pub use events::LedgerEvent;
pub use ids::{ChainId, MintId, TransferId};
pub use roles::{LedgerOp, Role, RoleError, RoleTable};
pub use token::{TokenError, TokenLedger};
