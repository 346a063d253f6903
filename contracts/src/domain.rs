//! # Domain Assemblies
//!
//! A *domain* is an independent, serially-consistent ledger: one USDX
//! token ledger plus the contracts that may move it, applying exactly one
//! operation at a time. [`HubDomain`] and [`SpokeDomain`] wire the
//! contract pieces together, hold the role grants made at genesis, and —
//! crucially — keep the append-only event log that is the *only* thing
//! another domain (via the relayer) ever gets to observe.
//!
//! Exclusive ownership does the serialization: every mutating operation
//! takes `&mut self`, so a domain behind a single actor task is a total
//! order of operations by construction. `height()` counts applied
//! operations and doubles as the "block height" relayers report in
//! heartbeats and persist as checkpoints.
//!
//! ## Genesis wiring
//!
//! | Grant                          | Where             | Why                        |
//! |--------------------------------|-------------------|----------------------------|
//! | vault → Vault                  | hub USDX ledger   | 1:1 deposit mint/burn      |
//! | venue → Minter                 | hub USDC ledger   | realized yield accrual     |
//! | admin → Minter (faucet)        | hub USDC ledger   | devnet collateral faucet   |
//! | bridge → Bridge                | each USDX ledger  | burn-then-mint transfers   |
//! | minter → Vault                 | spoke USDX ledger | snapshot-bounded mints     |
//! | relayer → Relayer              | minter + bridges  | relayer-only entrypoints   |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use usdx_protocol::config::{
    ADMIN_ADDRESS, BRIDGE_ADDRESS, SPOKE_MINTER_ADDRESS, TOKEN_DECIMALS, USDC_SYMBOL, USDX_SYMBOL,
    VAULT_ADDRESS, VENUE_ADDRESS,
};
use usdx_protocol::events::LedgerEvent;
use usdx_protocol::ids::{ChainId, MintId, TransferId};
use usdx_protocol::roles::Role;
use usdx_protocol::token::{TokenError, TokenLedger};

use crate::bridge::{BridgeError, BridgeTransferManager};
use crate::hub_vault::{HubVaultLedger, VaultError};
use crate::spoke_minter::{MintError, SpokePositionMinter};
use crate::yield_vault::YieldVault;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Union of the contract errors a domain operation can surface.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Hub vault rejected the operation.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Spoke minter rejected the operation.
    #[error(transparent)]
    Minter(#[from] MintError),

    /// Bridge manager rejected the operation.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A direct token ledger operation failed.
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl DomainError {
    /// Whether this error is the at-least-once duplicate-delivery case:
    /// the operation's idempotency key was already consumed, meaning its
    /// effect has already been applied. Relayers treat these as success.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            DomainError::Bridge(BridgeError::DuplicateCompletion { .. })
                | DomainError::Minter(MintError::DuplicateMint { .. })
        )
    }
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Append-only event log with absolute offsets. What a relayer polls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    fn append(&mut self, event: LedgerEvent) -> LedgerEvent {
        self.events.push(event.clone());
        event
    }

    fn since(&self, offset: u64, limit: usize) -> (u64, Vec<LedgerEvent>) {
        let start = (offset as usize).min(self.events.len());
        let end = (start + limit).min(self.events.len());
        (end as u64, self.events[start..end].to_vec())
    }

    fn height(&self) -> u64 {
        self.events.len() as u64
    }
}

// ---------------------------------------------------------------------------
// HubDomain
// ---------------------------------------------------------------------------

/// The hub: USDC collateral, the vault, the yield venue, and a bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubDomain {
    chain_id: ChainId,
    usdc: TokenLedger,
    usdx: TokenLedger,
    venue: YieldVault,
    vault: HubVaultLedger,
    bridge: BridgeTransferManager,
    log: EventLog,
}

impl HubDomain {
    /// Creates a hub domain with all genesis role grants in place, a
    /// registered `peer_chain` on the bridge, and `relayer` authorized
    /// for completions.
    ///
    /// The grants cannot fail — the caller of every grant is the freshly
    /// created table's own admin — so genesis is infallible.
    pub fn genesis(
        chain_id: ChainId,
        peer_chain: ChainId,
        relayer: &str,
        apr_bps: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let mut usdc = TokenLedger::new(USDC_SYMBOL, TOKEN_DECIMALS, ADMIN_ADDRESS);
        usdc.roles_mut()
            .grant(ADMIN_ADDRESS, VENUE_ADDRESS, Role::Minter)
            .expect("genesis grant by table admin");
        // The admin doubles as the devnet collateral faucet.
        usdc.roles_mut()
            .grant(ADMIN_ADDRESS, ADMIN_ADDRESS, Role::Minter)
            .expect("genesis grant by table admin");

        let mut usdx = TokenLedger::new(USDX_SYMBOL, TOKEN_DECIMALS, ADMIN_ADDRESS);
        usdx.roles_mut()
            .grant(ADMIN_ADDRESS, VAULT_ADDRESS, Role::Vault)
            .expect("genesis grant by table admin");
        usdx.roles_mut()
            .grant(ADMIN_ADDRESS, BRIDGE_ADDRESS, Role::Bridge)
            .expect("genesis grant by table admin");

        let mut bridge = BridgeTransferManager::new(BRIDGE_ADDRESS, chain_id, ADMIN_ADDRESS);
        bridge
            .roles_mut()
            .grant(ADMIN_ADDRESS, relayer, Role::Relayer)
            .expect("genesis grant by table admin");
        bridge
            .set_supported_chain(ADMIN_ADDRESS, peer_chain, true)
            .expect("genesis registration by admin");

        Self {
            chain_id,
            usdc,
            usdx,
            venue: YieldVault::new(VENUE_ADDRESS, apr_bps, now),
            vault: HubVaultLedger::new(VAULT_ADDRESS),
            bridge,
            log: EventLog::default(),
        }
    }

    /// This domain's chain id.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Number of operations applied — the domain's "block height".
    pub fn height(&self) -> u64 {
        self.log.height()
    }

    /// Events from absolute `offset`, up to `limit`. Returns the next
    /// offset alongside so callers can checkpoint.
    pub fn events_since(&self, offset: u64, limit: usize) -> (u64, Vec<LedgerEvent>) {
        self.log.since(offset, limit)
    }

    /// Devnet faucet: mints USDC collateral to `user`. Stands in for the
    /// external USDC supply of a real deployment; not a protocol event.
    pub fn fund(&mut self, user: &str, amount: u64) -> Result<(), DomainError> {
        self.usdc.mint(ADMIN_ADDRESS, user, amount)?;
        Ok(())
    }

    /// Deposits USDC, mints USDX 1:1. See [`HubVaultLedger::deposit`].
    pub fn deposit(
        &mut self,
        user: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, DomainError> {
        let event = self.vault.deposit(
            &mut self.usdc,
            &mut self.usdx,
            &mut self.venue,
            user,
            amount,
            now,
        )?;
        Ok(self.log.append(event))
    }

    /// Burns USDX, pays out USDC at the current share price. See
    /// [`HubVaultLedger::withdraw`].
    pub fn withdraw(
        &mut self,
        user: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, DomainError> {
        let event = self.vault.withdraw(
            &mut self.usdc,
            &mut self.usdx,
            &mut self.venue,
            user,
            amount,
            now,
        )?;
        Ok(self.log.append(event))
    }

    /// The authoritative hub position snapshot for `user`.
    pub fn user_position(&self, user: &str, now: DateTime<Utc>) -> u64 {
        self.vault.user_position(&self.venue, user, now)
    }

    /// The user's principal only.
    pub fn user_collateral(&self, user: &str) -> u64 {
        self.vault.user_collateral(user)
    }

    /// Σ principal over all users.
    pub fn total_collateral(&self) -> u64 {
        self.vault.total_collateral()
    }

    /// The user's venue exposure as `(share_units, asset_value)`.
    pub fn user_yield_position(&self, user: &str, now: DateTime<Utc>) -> (u64, u64) {
        self.vault.user_yield_position(&self.venue, user, now)
    }

    /// Initiates a cross-domain transfer: burn here, Pending record, id.
    pub fn transfer_cross_chain(
        &mut self,
        sender: &str,
        amount: u64,
        dest_chain_id: ChainId,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, DomainError> {
        let event = self.bridge.transfer_cross_chain(
            &mut self.usdx,
            sender,
            amount,
            dest_chain_id,
            recipient,
            now,
        )?;
        Ok(self.log.append(event))
    }

    /// Completes a transfer burned on another domain: mint here.
    #[allow(clippy::too_many_arguments)]
    pub fn complete_transfer(
        &mut self,
        caller: &str,
        transfer_id: TransferId,
        source_chain_id: ChainId,
        original_sender: &str,
        amount: u64,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, DomainError> {
        let event = self.bridge.complete_transfer(
            &mut self.usdx,
            caller,
            transfer_id,
            source_chain_id,
            original_sender,
            amount,
            recipient,
            now,
        )?;
        Ok(self.log.append(event))
    }

    /// USDC balance of `address`.
    pub fn usdc_balance(&self, address: &str) -> u64 {
        self.usdc.balance_of(address)
    }

    /// USDX balance of `address`.
    pub fn usdx_balance(&self, address: &str) -> u64 {
        self.usdx.balance_of(address)
    }

    /// Total USDX supply on this domain.
    pub fn usdx_total_supply(&self) -> u64 {
        self.usdx.total_supply()
    }

    /// Read access to the vault, for tests and status endpoints.
    pub fn vault(&self) -> &HubVaultLedger {
        &self.vault
    }

    /// Read access to the bridge, for tests and status endpoints.
    pub fn bridge(&self) -> &BridgeTransferManager {
        &self.bridge
    }
}

// ---------------------------------------------------------------------------
// SpokeDomain
// ---------------------------------------------------------------------------

/// A spoke: a USDX ledger, the position minter, and a bridge. No
/// collateral — that is the point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpokeDomain {
    chain_id: ChainId,
    usdx: TokenLedger,
    minter: SpokePositionMinter,
    bridge: BridgeTransferManager,
    log: EventLog,
}

impl SpokeDomain {
    /// Creates a spoke domain trusting snapshots of `hub_chain`, with all
    /// genesis grants in place and `relayer` authorized on the minter and
    /// the bridge.
    pub fn genesis(chain_id: ChainId, hub_chain: ChainId, relayer: &str) -> Self {
        let mut usdx = TokenLedger::new(USDX_SYMBOL, TOKEN_DECIMALS, ADMIN_ADDRESS);
        usdx.roles_mut()
            .grant(ADMIN_ADDRESS, SPOKE_MINTER_ADDRESS, Role::Vault)
            .expect("genesis grant by table admin");
        usdx.roles_mut()
            .grant(ADMIN_ADDRESS, BRIDGE_ADDRESS, Role::Bridge)
            .expect("genesis grant by table admin");

        let mut minter = SpokePositionMinter::new(SPOKE_MINTER_ADDRESS, hub_chain, ADMIN_ADDRESS);
        minter
            .roles_mut()
            .grant(ADMIN_ADDRESS, relayer, Role::Relayer)
            .expect("genesis grant by table admin");

        let mut bridge = BridgeTransferManager::new(BRIDGE_ADDRESS, chain_id, ADMIN_ADDRESS);
        bridge
            .roles_mut()
            .grant(ADMIN_ADDRESS, relayer, Role::Relayer)
            .expect("genesis grant by table admin");
        bridge
            .set_supported_chain(ADMIN_ADDRESS, hub_chain, true)
            .expect("genesis registration by admin");

        Self {
            chain_id,
            usdx,
            minter,
            bridge,
            log: EventLog::default(),
        }
    }

    /// This domain's chain id.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Number of operations applied.
    pub fn height(&self) -> u64 {
        self.log.height()
    }

    /// Events from absolute `offset`, up to `limit`.
    pub fn events_since(&self, offset: u64, limit: usize) -> (u64, Vec<LedgerEvent>) {
        self.log.since(offset, limit)
    }

    /// Mints USDX against an attested hub position. See
    /// [`SpokePositionMinter::mint_from_hub_position`].
    #[allow(clippy::too_many_arguments)]
    pub fn mint_from_hub_position(
        &mut self,
        caller: &str,
        user: &str,
        amount: u64,
        hub_position_snapshot: u64,
        mint_id: MintId,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, DomainError> {
        let event = self.minter.mint_from_hub_position(
            &mut self.usdx,
            caller,
            user,
            amount,
            hub_position_snapshot,
            mint_id,
            now,
        )?;
        Ok(self.log.append(event))
    }

    /// Refreshes the cached hub position for `user`. Relayer only.
    pub fn update_hub_position(
        &mut self,
        caller: &str,
        user: &str,
        position: u64,
    ) -> Result<LedgerEvent, DomainError> {
        let event = self.minter.update_hub_position(caller, user, position)?;
        Ok(self.log.append(event))
    }

    /// The last hub position the relayer synced for `user`, if any.
    pub fn hub_position(&self, user: &str) -> Option<u64> {
        self.minter.hub_position(user)
    }

    /// Cumulative USDX minted for `user` on this spoke.
    pub fn minted_total(&self, user: &str) -> u64 {
        self.minter.minted_total(user)
    }

    /// Initiates a cross-domain transfer back toward the hub (or any
    /// registered destination).
    pub fn transfer_cross_chain(
        &mut self,
        sender: &str,
        amount: u64,
        dest_chain_id: ChainId,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, DomainError> {
        let event = self.bridge.transfer_cross_chain(
            &mut self.usdx,
            sender,
            amount,
            dest_chain_id,
            recipient,
            now,
        )?;
        Ok(self.log.append(event))
    }

    /// Completes a transfer burned on another domain: mint here.
    #[allow(clippy::too_many_arguments)]
    pub fn complete_transfer(
        &mut self,
        caller: &str,
        transfer_id: TransferId,
        source_chain_id: ChainId,
        original_sender: &str,
        amount: u64,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, DomainError> {
        let event = self.bridge.complete_transfer(
            &mut self.usdx,
            caller,
            transfer_id,
            source_chain_id,
            original_sender,
            amount,
            recipient,
            now,
        )?;
        Ok(self.log.append(event))
    }

    /// USDX balance of `address`.
    pub fn usdx_balance(&self, address: &str) -> u64 {
        self.usdx.balance_of(address)
    }

    /// Total USDX supply on this domain.
    pub fn usdx_total_supply(&self) -> u64 {
        self.usdx.total_supply()
    }

    /// Read access to the minter, for tests and status endpoints.
    pub fn minter(&self) -> &SpokePositionMinter {
        &self.minter
    }

    /// Read access to the bridge, for tests and status endpoints.
    pub fn bridge(&self) -> &BridgeTransferManager {
        &self.bridge
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
