//! # Spoke Position Minter
//!
//! A spoke domain cannot read hub state. What it gets instead is a
//! relayer-attested snapshot of a user's hub position, delivered alongside
//! each mint request, and a caller-supplied [`MintId`] making the request
//! safe to deliver more than once.
//!
//! The minter enforces two things and only two things:
//!
//! 1. **Idempotency** — a `MintId` is consumed at most once, ever. A retry
//!    with the same id is rejected as `DuplicateMint`, which a relayer
//!    treats as "already done", not as a failure.
//! 2. **The snapshot bound** — cumulative mints for a user never exceed
//!    the snapshot attested with the current request.
//!
//! The bound is checked against the attested value, not a live hub read —
//! there is no live hub read. A relayer attesting stale snapshots is a
//! trust-boundary problem, not something this state machine can detect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use usdx_protocol::events::LedgerEvent;
use usdx_protocol::ids::{ChainId, MintId};
use usdx_protocol::roles::{Role, RoleError, RoleTable};
use usdx_protocol::token::{TokenError, TokenLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during spoke mint operations.
#[derive(Debug, Error)]
pub enum MintError {
    /// The caller does not hold the Relayer role.
    #[error(transparent)]
    Access(#[from] RoleError),

    /// Zero-amount mints are caller bugs.
    #[error("zero-amount mints are not permitted")]
    ZeroAmount,

    /// The mint id was already consumed. Permanent for this id; a retry
    /// carrying it is the at-least-once delivery case working as intended.
    #[error("mint already processed: {mint_id}")]
    DuplicateMint {
        /// The consumed idempotency key.
        mint_id: MintId,
    },

    /// The mint would push the user's cumulative spoke mints above the
    /// attested hub position.
    #[error(
        "insufficient hub position for {user}: minted {minted_total} + requested {requested} \
         exceeds snapshot {snapshot}"
    )]
    InsufficientHubPosition {
        /// The user being minted for.
        user: String,
        /// Cumulative amount already minted for them on this spoke.
        minted_total: u64,
        /// The amount requested now.
        requested: u64,
        /// The hub position attested with this request.
        snapshot: u64,
    },

    /// Cumulative mint accounting would overflow.
    #[error("amount overflow in minted-total accounting")]
    AmountOverflow,

    /// The underlying USDX ledger rejected the mint.
    #[error(transparent)]
    Token(#[from] TokenError),
}

// ---------------------------------------------------------------------------
// MintRecord
// ---------------------------------------------------------------------------

/// Write-once record of one consumed mint id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRecord {
    /// The user the mint credited.
    pub user: String,
    /// The amount minted.
    pub amount: u64,
    /// The hub position attested with the request.
    pub hub_position_snapshot: u64,
    /// When the mint was applied.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SpokePositionMinter
// ---------------------------------------------------------------------------

/// Mints USDX on a spoke domain, bounded by attested hub positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpokePositionMinter {
    /// The minter's ledger address (holds the Vault role on the spoke
    /// USDX ledger).
    address: String,
    /// The hub this spoke trusts snapshots of.
    hub_chain_id: ChainId,
    /// Gates the relayer-only entrypoints.
    roles: RoleTable,
    /// Cumulative mints per user.
    minted_total: HashMap<String, u64>,
    /// Consumed mint ids, write-once.
    records: HashMap<MintId, MintRecord>,
    /// Relayer-synced view of hub positions. Advisory only: refreshed on
    /// hub activity so spoke-side callers can size requests, never used to
    /// relax the per-mint snapshot bound.
    hub_positions: HashMap<String, u64>,
}

impl SpokePositionMinter {
    /// Creates a minter for snapshots of `hub_chain_id`, with its role
    /// table administered by `admin`.
    pub fn new(address: &str, hub_chain_id: ChainId, admin: &str) -> Self {
        Self {
            address: address.to_string(),
            hub_chain_id,
            roles: RoleTable::new(admin),
            minted_total: HashMap::new(),
            records: HashMap::new(),
            hub_positions: HashMap::new(),
        }
    }

    /// The minter's ledger address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The hub chain this minter accepts snapshots of.
    pub fn hub_chain_id(&self) -> ChainId {
        self.hub_chain_id
    }

    /// The minter's role table, for genesis wiring.
    pub fn roles_mut(&mut self) -> &mut RoleTable {
        &mut self.roles
    }

    /// Mints `amount` USDX to `user`, bounded by the attested
    /// `hub_position_snapshot` and idempotent under `mint_id`.
    ///
    /// Check order is authorization, then amount validity, then
    /// idempotency, then the snapshot bound — so a duplicate delivery is
    /// reported as a duplicate even when the snapshot has since moved.
    pub fn mint_from_hub_position(
        &mut self,
        usdx: &mut TokenLedger,
        caller: &str,
        user: &str,
        amount: u64,
        hub_position_snapshot: u64,
        mint_id: MintId,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, MintError> {
        self.roles.require(caller, Role::Relayer)?;
        if amount == 0 {
            return Err(MintError::ZeroAmount);
        }
        if self.records.contains_key(&mint_id) {
            return Err(MintError::DuplicateMint { mint_id });
        }

        let minted = self.minted_total.get(user).copied().unwrap_or(0);
        let new_minted = minted
            .checked_add(amount)
            .ok_or(MintError::AmountOverflow)?;
        if new_minted > hub_position_snapshot {
            return Err(MintError::InsufficientHubPosition {
                user: user.to_string(),
                minted_total: minted,
                requested: amount,
                snapshot: hub_position_snapshot,
            });
        }

        usdx.mint(&self.address, user, amount)?;
        self.minted_total.insert(user.to_string(), new_minted);
        self.records.insert(
            mint_id,
            MintRecord {
                user: user.to_string(),
                amount,
                hub_position_snapshot,
                timestamp: now,
            },
        );

        Ok(LedgerEvent::MintFromPosition {
            user: user.to_string(),
            amount,
            hub_position: hub_position_snapshot,
            mint_id,
        })
    }

    /// Refreshes the cached hub position for `user`. Relayer only.
    pub fn update_hub_position(
        &mut self,
        caller: &str,
        user: &str,
        position: u64,
    ) -> Result<LedgerEvent, MintError> {
        self.roles.require(caller, Role::Relayer)?;
        self.hub_positions.insert(user.to_string(), position);
        Ok(LedgerEvent::HubPositionUpdated {
            user: user.to_string(),
            position,
        })
    }

    /// The last hub position the relayer synced for `user`, if any.
    pub fn hub_position(&self, user: &str) -> Option<u64> {
        self.hub_positions.get(user).copied()
    }

    /// Cumulative USDX minted for `user` on this spoke.
    pub fn minted_total(&self, user: &str) -> u64 {
        self.minted_total.get(user).copied().unwrap_or(0)
    }

    /// The record behind a consumed mint id, if it was ever applied.
    pub fn mint_record(&self, mint_id: &MintId) -> Option<&MintRecord> {
        self.records.get(mint_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINTER: &str = "usdx:spoke-minter";
    const RELAYER: &str = "usdx:relayer";

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn setup() -> (TokenLedger, SpokePositionMinter) {
        let mut usdx = TokenLedger::new("USDX", 6, "admin");
        usdx.roles_mut().grant("admin", MINTER, Role::Vault).unwrap();
        let mut minter = SpokePositionMinter::new(MINTER, ChainId(1), "admin");
        minter.roles_mut().grant("admin", RELAYER, Role::Relayer).unwrap();
        (usdx, minter)
    }

    #[test]
    fn mint_requires_relayer_role() {
        let (mut usdx, mut minter) = setup();
        let err = minter
            .mint_from_hub_position(
                &mut usdx,
                "mallory",
                "alice",
                100,
                1_000,
                MintId::derive("alice", "m1"),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, MintError::Access(_)));
        assert_eq!(usdx.total_supply(), 0);
    }

    #[test]
    fn mint_within_snapshot_succeeds() {
        let (mut usdx, mut minter) = setup();
        let event = minter
            .mint_from_hub_position(
                &mut usdx,
                RELAYER,
                "alice",
                600,
                1_000,
                MintId::derive("alice", "m1"),
                now(),
            )
            .unwrap();

        assert_eq!(usdx.balance_of("alice"), 600);
        assert_eq!(minter.minted_total("alice"), 600);
        assert!(matches!(
            event,
            LedgerEvent::MintFromPosition {
                amount: 600,
                hub_position: 1_000,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_mint_id_rejected_with_no_second_effect() {
        let (mut usdx, mut minter) = setup();
        let id = MintId::derive("alice", "m1");

        minter
            .mint_from_hub_position(&mut usdx, RELAYER, "alice", 500, 2_000, id, now())
            .unwrap();
        let supply_after_first = usdx.total_supply();
        let minted_after_first = minter.minted_total("alice");

        let err = minter
            .mint_from_hub_position(&mut usdx, RELAYER, "alice", 500, 2_000, id, now())
            .unwrap_err();

        assert!(matches!(err, MintError::DuplicateMint { mint_id } if mint_id == id));
        // Identical observable state after the second call.
        assert_eq!(usdx.total_supply(), supply_after_first);
        assert_eq!(minter.minted_total("alice"), minted_after_first);
    }

    #[test]
    fn duplicate_reported_even_when_amount_differs() {
        // The id is the identity of the operation; a conflicting payload
        // under the same key must not create a second effect.
        let (mut usdx, mut minter) = setup();
        let id = MintId::derive("alice", "m1");
        minter
            .mint_from_hub_position(&mut usdx, RELAYER, "alice", 500, 2_000, id, now())
            .unwrap();
        let err = minter
            .mint_from_hub_position(&mut usdx, RELAYER, "alice", 999, 2_000, id, now())
            .unwrap_err();
        assert!(matches!(err, MintError::DuplicateMint { .. }));
        assert_eq!(usdx.balance_of("alice"), 500);
    }

    #[test]
    fn cumulative_mints_never_exceed_snapshot() {
        let (mut usdx, mut minter) = setup();
        let snapshot = 1_000;

        minter
            .mint_from_hub_position(
                &mut usdx,
                RELAYER,
                "alice",
                700,
                snapshot,
                MintId::derive("alice", "m1"),
                now(),
            )
            .unwrap();

        // 700 + 400 > 1000: over the bound, rejected.
        let err = minter
            .mint_from_hub_position(
                &mut usdx,
                RELAYER,
                "alice",
                400,
                snapshot,
                MintId::derive("alice", "m2"),
                now(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            MintError::InsufficientHubPosition {
                minted_total: 700,
                requested: 400,
                snapshot: 1_000,
                ..
            }
        ));

        // 700 + 300 == 1000: exactly at the bound, allowed.
        minter
            .mint_from_hub_position(
                &mut usdx,
                RELAYER,
                "alice",
                300,
                snapshot,
                MintId::derive("alice", "m3"),
                now(),
            )
            .unwrap();
        assert_eq!(minter.minted_total("alice"), snapshot);
    }

    #[test]
    fn single_mint_above_snapshot_rejected() {
        let (mut usdx, mut minter) = setup();
        let err = minter
            .mint_from_hub_position(
                &mut usdx,
                RELAYER,
                "alice",
                1_001,
                1_000,
                MintId::derive("alice", "m1"),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, MintError::InsufficientHubPosition { .. }));
        assert_eq!(usdx.balance_of("alice"), 0);
    }

    #[test]
    fn zero_amount_rejected() {
        let (mut usdx, mut minter) = setup();
        let err = minter
            .mint_from_hub_position(
                &mut usdx,
                RELAYER,
                "alice",
                0,
                1_000,
                MintId::derive("alice", "m1"),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, MintError::ZeroAmount));
    }

    #[test]
    fn mint_record_is_written_once() {
        let (mut usdx, mut minter) = setup();
        let id = MintId::derive("alice", "m1");
        minter
            .mint_from_hub_position(&mut usdx, RELAYER, "alice", 500, 2_000, id, now())
            .unwrap();

        let record = minter.mint_record(&id).expect("record exists");
        assert_eq!(record.user, "alice");
        assert_eq!(record.amount, 500);
        assert_eq!(record.hub_position_snapshot, 2_000);
    }

    #[test]
    fn position_cache_updates_are_relayer_only() {
        let (_, mut minter) = setup();
        assert!(minter.update_hub_position("mallory", "alice", 5_000).is_err());
        assert_eq!(minter.hub_position("alice"), None);

        minter.update_hub_position(RELAYER, "alice", 5_000).unwrap();
        assert_eq!(minter.hub_position("alice"), Some(5_000));

        // Downward refreshes overwrite; the cache mirrors, never ratchets.
        minter.update_hub_position(RELAYER, "alice", 1_000).unwrap();
        assert_eq!(minter.hub_position("alice"), Some(1_000));
    }

    #[test]
    fn per_user_bounds_are_independent() {
        let (mut usdx, mut minter) = setup();
        minter
            .mint_from_hub_position(
                &mut usdx,
                RELAYER,
                "alice",
                1_000,
                1_000,
                MintId::derive("alice", "m1"),
                now(),
            )
            .unwrap();
        // Alice being at her bound says nothing about Bob.
        minter
            .mint_from_hub_position(
                &mut usdx,
                RELAYER,
                "bob",
                800,
                800,
                MintId::derive("bob", "m1"),
                now(),
            )
            .unwrap();
        assert_eq!(minter.minted_total("alice"), 1_000);
        assert_eq!(minter.minted_total("bob"), 800);
    }
}
