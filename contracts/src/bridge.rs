//! # Bridge Transfer Manager
//!
//! Moves already-minted USDX between domains by burning on the source and
//! minting on the destination once a relayer submits the completion. Each
//! domain runs its own manager; the two never share state.
//!
//! A transfer's life:
//!
//! 1. **Initiation (source domain)** — burn from the sender, derive the
//!    [`TransferId`] from the canonical fields plus a per-manager monotonic
//!    nonce, store a `Pending` [`TransferRecord`], emit `TransferInitiated`.
//! 2. **Completion (destination domain)** — relayer submits the id it
//!    observed; the destination mints to the recipient and marks the id
//!    consumed. A second submission of the same id is rejected as
//!    `DuplicateCompletion` with no second mint.
//!
//! `Pending → Completed` is terminal and one-way. There is deliberately no
//! timeout or refund edge: once the source burn happened, the only exit is
//! a completion (see the design notes on this gap).
//!
//! Conservation: for every completed transfer, source supply dropped by
//! the amount at initiation and destination supply rose by the same amount
//! at completion. Total cross-domain supply is unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use usdx_protocol::events::LedgerEvent;
use usdx_protocol::ids::{ChainId, TransferId};
use usdx_protocol::roles::{Role, RoleError, RoleTable};
use usdx_protocol::token::{TokenError, TokenLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The caller does not hold the required role (Relayer for
    /// completions, admin for chain registration).
    #[error(transparent)]
    Access(#[from] RoleError),

    /// Zero-amount transfers are caller bugs.
    #[error("zero-amount transfers are not permitted")]
    ZeroAmount,

    /// The destination chain is not registered with this manager.
    #[error("unsupported destination chain: {chain_id}")]
    UnsupportedChain {
        /// The unregistered chain id.
        chain_id: ChainId,
    },

    /// The transfer id was already completed on this domain. Permanent;
    /// a relayer retry carrying it has already had its effect.
    #[error("transfer already processed: {transfer_id}")]
    DuplicateCompletion {
        /// The consumed transfer id.
        transfer_id: TransferId,
    },

    /// The underlying USDX ledger rejected the burn or mint.
    #[error(transparent)]
    Token(#[from] TokenError),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Lifecycle state of a transfer on its source domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Burned on the source; completion not yet observed here.
    Pending,
    /// Completion applied. Terminal.
    Completed,
}

/// Source-side record of an initiated transfer. Created `Pending`, never
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Lifecycle state.
    pub status: TransferStatus,
    /// The domain the burn happened on.
    pub source_chain_id: ChainId,
    /// The domain the mint is destined for.
    pub dest_chain_id: ChainId,
    /// Who was burned.
    pub sender: String,
    /// Who gets minted on the destination.
    pub recipient: String,
    /// The amount, identical on both sides.
    pub amount: u64,
    /// The per-manager nonce this transfer consumed.
    pub nonce: u64,
    /// When the burn was applied.
    pub created_at: DateTime<Utc>,
}

/// Destination-side record of an applied completion. The destination
/// never saw the initiation, so this is its whole memory of the transfer
/// — and the write-once set that makes completions idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// The domain the transfer was burned on.
    pub source_chain_id: ChainId,
    /// The sender as reported by the relayer.
    pub original_sender: String,
    /// Who was minted.
    pub recipient: String,
    /// The amount minted.
    pub amount: u64,
    /// When the completion was applied.
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// BridgeTransferManager
// ---------------------------------------------------------------------------

/// One domain's side of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeTransferManager {
    /// The manager's ledger address (holds the Bridge role on the local
    /// USDX ledger).
    address: String,
    /// The domain this manager lives on.
    chain_id: ChainId,
    /// Gates completions (Relayer) and chain registration (admin).
    roles: RoleTable,
    /// Destinations transfers may be initiated toward.
    supported_chains: HashSet<ChainId>,
    /// Monotonic initiation counter, consumed by id derivation.
    nonce: u64,
    /// Transfers initiated on this domain, by id.
    records: HashMap<TransferId, TransferRecord>,
    /// Completions applied on this domain, by id.
    completions: HashMap<TransferId, CompletionRecord>,
}

impl BridgeTransferManager {
    /// Creates a manager for `chain_id` with no registered destinations.
    pub fn new(address: &str, chain_id: ChainId, admin: &str) -> Self {
        Self {
            address: address.to_string(),
            chain_id,
            roles: RoleTable::new(admin),
            supported_chains: HashSet::new(),
            nonce: 0,
            records: HashMap::new(),
            completions: HashMap::new(),
        }
    }

    /// The manager's ledger address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The domain this manager lives on.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// The manager's role table, for genesis wiring.
    pub fn roles_mut(&mut self) -> &mut RoleTable {
        &mut self.roles
    }

    /// Registers or deregisters a destination chain. Admin only.
    pub fn set_supported_chain(
        &mut self,
        caller: &str,
        chain_id: ChainId,
        enabled: bool,
    ) -> Result<(), BridgeError> {
        if caller != self.roles.admin() {
            return Err(BridgeError::Access(RoleError::NotAdmin {
                subject: caller.to_string(),
            }));
        }
        if enabled {
            self.supported_chains.insert(chain_id);
        } else {
            self.supported_chains.remove(&chain_id);
        }
        Ok(())
    }

    /// Whether transfers may be initiated toward `chain_id`.
    pub fn is_chain_supported(&self, chain_id: ChainId) -> bool {
        self.supported_chains.contains(&chain_id)
    }

    /// Burns `amount` from `sender` and records a Pending transfer toward
    /// `dest_chain_id`. Open to any sender with the balance.
    pub fn transfer_cross_chain(
        &mut self,
        usdx: &mut TokenLedger,
        sender: &str,
        amount: u64,
        dest_chain_id: ChainId,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, BridgeError> {
        if !self.supported_chains.contains(&dest_chain_id) {
            return Err(BridgeError::UnsupportedChain {
                chain_id: dest_chain_id,
            });
        }
        if amount == 0 {
            return Err(BridgeError::ZeroAmount);
        }

        usdx.burn_from(&self.address, sender, amount)?;

        let nonce = self.nonce;
        let transfer_id = TransferId::derive(
            self.chain_id,
            dest_chain_id,
            sender,
            recipient,
            amount,
            nonce,
            now.timestamp(),
        );
        self.records.insert(
            transfer_id,
            TransferRecord {
                status: TransferStatus::Pending,
                source_chain_id: self.chain_id,
                dest_chain_id,
                sender: sender.to_string(),
                recipient: recipient.to_string(),
                amount,
                nonce,
                created_at: now,
            },
        );
        self.nonce += 1;

        Ok(LedgerEvent::TransferInitiated {
            transfer_id,
            sender: sender.to_string(),
            amount,
            source_chain_id: self.chain_id,
            dest_chain_id,
            recipient: recipient.to_string(),
        })
    }

    /// Mints `amount` to `recipient` for a transfer burned on
    /// `source_chain_id`. Relayer only; idempotent under `transfer_id`.
    pub fn complete_transfer(
        &mut self,
        usdx: &mut TokenLedger,
        caller: &str,
        transfer_id: TransferId,
        source_chain_id: ChainId,
        original_sender: &str,
        amount: u64,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, BridgeError> {
        self.roles.require(caller, Role::Relayer)?;
        if amount == 0 {
            return Err(BridgeError::ZeroAmount);
        }
        if self.completions.contains_key(&transfer_id) {
            return Err(BridgeError::DuplicateCompletion { transfer_id });
        }

        usdx.mint(&self.address, recipient, amount)?;
        self.completions.insert(
            transfer_id,
            CompletionRecord {
                source_chain_id,
                original_sender: original_sender.to_string(),
                recipient: recipient.to_string(),
                amount,
                completed_at: now,
            },
        );
        // A same-domain round trip also closes the local source record.
        if let Some(record) = self.records.get_mut(&transfer_id) {
            record.status = TransferStatus::Completed;
        }

        Ok(LedgerEvent::TransferCompleted {
            transfer_id,
            recipient: recipient.to_string(),
            amount,
            source_chain_id,
            timestamp: now,
        })
    }

    /// The source-side record for `transfer_id`, if it was initiated here.
    pub fn transfer_record(&self, transfer_id: &TransferId) -> Option<&TransferRecord> {
        self.records.get(transfer_id)
    }

    /// The completion record for `transfer_id`, if it was completed here.
    pub fn completion(&self, transfer_id: &TransferId) -> Option<&CompletionRecord> {
        self.completions.get(transfer_id)
    }

    /// The next nonce an initiation will consume.
    pub fn transfer_nonce(&self) -> u64 {
        self.nonce
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
