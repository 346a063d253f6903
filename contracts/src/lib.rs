//! # USDX Contracts — Accounting State Machines
//!
//! The state machines that carry the protocol's invariants, written as
//! plain Rust structs with synchronous, all-or-nothing operations:
//!
//! - [`yield_vault`] — The yield venue the hub forwards collateral into.
//!   Share-priced; accrual mints yield onto the collateral ledger so the
//!   books always balance.
//! - [`hub_vault`] — The hub collateral vault: 1:1 deposit/withdraw
//!   between USDC and USDX, per-user collateral positions, and the
//!   authoritative "hub position" snapshot the relayer attests to spokes.
//! - [`spoke_minter`] — Mints USDX on a spoke bounded by an attested hub
//!   position snapshot, idempotent under caller-supplied mint ids.
//! - [`bridge`] — Burn-then-mint cross-domain transfers, idempotent under
//!   derived transfer ids.
//! - [`domain`] — Assembles the above into `HubDomain` / `SpokeDomain`:
//!   one serially-applied operation log per domain, which is all a relayer
//!   ever gets to see.
//!
//! Every operation takes an explicit `now: DateTime<Utc>`. State
//! transitions are pure functions of `(state, operation, now)`, which is
//! what makes the yield and idempotency properties testable without
//! sleeping in tests.

pub mod bridge;
pub mod domain;
pub mod hub_vault;
pub mod spoke_minter;
pub mod yield_vault;

pub use bridge::{
    BridgeError, BridgeTransferManager, CompletionRecord, TransferRecord, TransferStatus,
};
pub use domain::{DomainError, HubDomain, SpokeDomain};
pub use hub_vault::{CollateralPosition, HubVaultLedger, VaultError};
pub use spoke_minter::{MintError, MintRecord, SpokePositionMinter};
pub use yield_vault::{YieldError, YieldVault};
