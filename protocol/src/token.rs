//! # Token Ledger
//!
//! One [`TokenLedger`] per asset per domain: the hub runs one for USDC
//! collateral and one for USDX; each spoke runs one for USDX. A ledger is
//! nothing more than balances, a supply counter, and a role table deciding
//! who may move the supply line — which is exactly as much trust surface
//! as a value-accounting protocol should carry.
//!
//! Supply only changes through [`mint`](TokenLedger::mint) and
//! [`burn_from`](TokenLedger::burn_from), both gated by the authorization
//! table in [`crate::roles`]. Transfers between addresses conserve supply
//! and are gated only by balance — the protocol models no signatures, so
//! callers (the vault, the bridge) are trusted to act for an already
//! authenticated user.
//!
//! All arithmetic is checked. An overflow is not a rounding concern, it's
//! a corrupted book.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::roles::{LedgerOp, RoleError, RoleTable};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Zero-amount mints, burns, and transfers are no-ops and almost
    /// certainly a caller bug.
    #[error("zero-amount ledger operations are not permitted")]
    ZeroAmount,

    /// The caller's roles do not permit the operation.
    #[error(transparent)]
    Access(#[from] RoleError),

    /// An address tried to move or burn more than it holds.
    #[error("insufficient balance: {address} holds {available}, requested {requested}")]
    InsufficientBalance {
        /// The address being debited.
        address: String,
        /// Its current balance.
        available: u64,
        /// The amount requested.
        requested: u64,
    },

    /// A credit would overflow a balance or the total supply.
    #[error("amount overflow: {context}")]
    AmountOverflow {
        /// Which counter would have overflowed.
        context: &'static str,
    },
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// Balances and supply for one asset on one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Ticker symbol, for logs and display only.
    symbol: String,
    /// Display decimal places. The ledger itself never divides.
    decimals: u8,
    /// Balances in smallest units, per address.
    balances: HashMap<String, u64>,
    /// Sum of all balances. Maintained, not recomputed.
    total_supply: u64,
    /// Who may mint and burn.
    roles: RoleTable,
}

impl TokenLedger {
    /// Creates an empty ledger whose role table is administered by `admin`.
    pub fn new(symbol: &str, decimals: u8, admin: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            balances: HashMap::new(),
            total_supply: 0,
            roles: RoleTable::new(admin),
        }
    }

    /// Ticker symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Display decimals.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Balance of `address`, zero if it never held this asset.
    pub fn balance_of(&self, address: &str) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Current total supply.
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// The ledger's role table, for grants at genesis and checks in tests.
    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    /// Mutable access to the role table, for genesis wiring.
    pub fn roles_mut(&mut self) -> &mut RoleTable {
        &mut self.roles
    }

    /// Mints `amount` to `to`. The caller must hold a role permitting
    /// [`LedgerOp::Mint`].
    ///
    /// # Errors
    ///
    /// [`TokenError::Access`] on an unauthorized caller,
    /// [`TokenError::ZeroAmount`] on zero, [`TokenError::AmountOverflow`]
    /// if the credit would overflow the balance or the supply.
    pub fn mint(&mut self, caller: &str, to: &str, amount: u64) -> Result<(), TokenError> {
        self.roles.authorize(caller, LedgerOp::Mint)?;
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }

        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::AmountOverflow {
                context: "total supply",
            })?;
        let balance = self.balances.entry(to.to_string()).or_insert(0);
        let new_balance = balance
            .checked_add(amount)
            .ok_or(TokenError::AmountOverflow {
                context: "recipient balance",
            })?;

        *balance = new_balance;
        self.total_supply = new_supply;
        Ok(())
    }

    /// Burns `amount` from `from`. The caller must hold a role permitting
    /// [`LedgerOp::Burn`].
    ///
    /// # Errors
    ///
    /// [`TokenError::Access`] on an unauthorized caller,
    /// [`TokenError::ZeroAmount`] on zero,
    /// [`TokenError::InsufficientBalance`] if `from` holds less than
    /// `amount`.
    pub fn burn_from(&mut self, caller: &str, from: &str, amount: u64) -> Result<(), TokenError> {
        self.roles.authorize(caller, LedgerOp::Burn)?;
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }

        let balance = self.balances.entry(from.to_string()).or_insert(0);
        if *balance < amount {
            return Err(TokenError::InsufficientBalance {
                address: from.to_string(),
                available: *balance,
                requested: amount,
            });
        }

        *balance -= amount;
        // Supply is the sum of balances, so it cannot underflow here.
        self.total_supply -= amount;
        Ok(())
    }

    /// Moves `amount` from `from` to `to`. Supply-conserving; gated only
    /// by `from`'s balance.
    ///
    /// # Errors
    ///
    /// [`TokenError::ZeroAmount`] on zero,
    /// [`TokenError::InsufficientBalance`] on overdraft.
    pub fn transfer(&mut self, from: &str, to: &str, amount: u64) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }

        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                address: from.to_string(),
                available: from_balance,
                requested: amount,
            });
        }

        // Self-transfers must not double-apply through the two map entries.
        if from == to {
            return Ok(());
        }

        let to_balance = self.balance_of(to);
        let new_to = to_balance
            .checked_add(amount)
            .ok_or(TokenError::AmountOverflow {
                context: "recipient balance",
            })?;

        self.balances.insert(from.to_string(), from_balance - amount);
        self.balances.insert(to.to_string(), new_to);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    /// A USDX ledger with `vault` granted the Vault role.
    fn ledger_with_vault() -> TokenLedger {
        let mut ledger = TokenLedger::new("USDX", 6, "admin");
        ledger.roles_mut().grant("admin", "vault", Role::Vault).unwrap();
        ledger
    }

    #[test]
    fn mint_requires_authorized_role() {
        let mut ledger = TokenLedger::new("USDX", 6, "admin");
        let err = ledger.mint("nobody", "alice", 100).unwrap_err();
        assert!(matches!(err, TokenError::Access(_)));
        assert_eq!(ledger.total_supply(), 0);
    }

    #[test]
    fn mint_credits_balance_and_supply() {
        let mut ledger = ledger_with_vault();
        ledger.mint("vault", "alice", 1_000).unwrap();
        assert_eq!(ledger.balance_of("alice"), 1_000);
        assert_eq!(ledger.total_supply(), 1_000);
    }

    #[test]
    fn mint_zero_rejected() {
        let mut ledger = ledger_with_vault();
        assert!(matches!(
            ledger.mint("vault", "alice", 0).unwrap_err(),
            TokenError::ZeroAmount
        ));
    }

    #[test]
    fn burn_requires_authorized_role() {
        let mut ledger = ledger_with_vault();
        ledger.mint("vault", "alice", 100).unwrap();
        assert!(matches!(
            ledger.burn_from("alice", "alice", 100).unwrap_err(),
            TokenError::Access(_)
        ));
    }

    #[test]
    fn burn_debits_balance_and_supply() {
        let mut ledger = ledger_with_vault();
        ledger.mint("vault", "alice", 1_000).unwrap();
        ledger.burn_from("vault", "alice", 400).unwrap();
        assert_eq!(ledger.balance_of("alice"), 600);
        assert_eq!(ledger.total_supply(), 600);
    }

    #[test]
    fn burn_more_than_held_rejected() {
        let mut ledger = ledger_with_vault();
        ledger.mint("vault", "alice", 100).unwrap();
        let err = ledger.burn_from("vault", "alice", 200).unwrap_err();
        assert!(matches!(
            err,
            TokenError::InsufficientBalance {
                available: 100,
                requested: 200,
                ..
            }
        ));
        // Failed burns leave the books untouched.
        assert_eq!(ledger.balance_of("alice"), 100);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn minter_role_cannot_burn() {
        let mut ledger = TokenLedger::new("USDC", 6, "admin");
        ledger.roles_mut().grant("admin", "venue", Role::Minter).unwrap();
        ledger.mint("venue", "venue", 100).unwrap();
        assert!(ledger.burn_from("venue", "venue", 100).is_err());
    }

    #[test]
    fn transfer_conserves_supply() {
        let mut ledger = ledger_with_vault();
        ledger.mint("vault", "alice", 1_000).unwrap();
        ledger.transfer("alice", "bob", 300).unwrap();
        assert_eq!(ledger.balance_of("alice"), 700);
        assert_eq!(ledger.balance_of("bob"), 300);
        assert_eq!(ledger.total_supply(), 1_000);
    }

    #[test]
    fn transfer_overdraft_rejected() {
        let mut ledger = ledger_with_vault();
        ledger.mint("vault", "alice", 100).unwrap();
        assert!(ledger.transfer("alice", "bob", 101).is_err());
        assert_eq!(ledger.balance_of("alice"), 100);
        assert_eq!(ledger.balance_of("bob"), 0);
    }

    #[test]
    fn self_transfer_is_a_balance_preserving_noop() {
        let mut ledger = ledger_with_vault();
        ledger.mint("vault", "alice", 500).unwrap();
        ledger.transfer("alice", "alice", 200).unwrap();
        assert_eq!(ledger.balance_of("alice"), 500);
    }

    #[test]
    fn supply_overflow_rejected() {
        let mut ledger = ledger_with_vault();
        ledger.mint("vault", "alice", u64::MAX).unwrap();
        let err = ledger.mint("vault", "bob", 1).unwrap_err();
        assert!(matches!(err, TokenError::AmountOverflow { .. }));
    }

    #[test]
    fn ledger_serialization_roundtrip() {
        let mut ledger = ledger_with_vault();
        ledger.mint("vault", "alice", 42).unwrap();
        let json = serde_json::to_string(&ledger).expect("serialize");
        let recovered: TokenLedger = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered.balance_of("alice"), 42);
        assert_eq!(recovered.total_supply(), 42);
        assert_eq!(recovered.symbol(), "USDX");
    }
}
