//! # Hub Collateral Vault
//!
//! The source of truth for "hub position". Users deposit USDC, receive
//! USDX 1:1, and the vault forwards the USDC into the yield venue. On
//! withdrawal the USDX is burned 1:1 against principal and the payout is
//! taken at the venue's current share price — which is where the yield
//! shows up.
//!
//! ## Invariants
//!
//! - Cumulative vault-minted USDX equals Σ principal over all users at all
//!   times: deposits mint exactly the deposited amount, withdrawals burn
//!   exactly the principal they release.
//! - A withdrawal of `amount` succeeds only when `amount ≤ principal`,
//!   and its payout is `amount`'s proportional slice of the user's share
//!   units, valued at the current price — at least `amount` once any
//!   yield has accrued.
//! - Positions are zeroed, never deleted. A user who fully exits keeps an
//!   empty [`CollateralPosition`] row.
//!
//! Every operation validates balances and overflow bounds before the
//! first ledger movement; the movements that follow cannot fail for any
//! reason the preflight did not already cover, so observers never see a
//! half-applied deposit or withdrawal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use usdx_protocol::events::LedgerEvent;
use usdx_protocol::token::{TokenError, TokenLedger};

use crate::yield_vault::{YieldError, YieldVault};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Zero-amount deposits and withdrawals are caller bugs.
    #[error("zero-amount vault operations are not permitted")]
    ZeroAmount,

    /// Withdrawal request exceeds the user's deposited principal.
    #[error("insufficient collateral: {user} has {available}, requested {requested}")]
    InsufficientCollateral {
        /// The withdrawing user.
        user: String,
        /// Their current principal.
        available: u64,
        /// The amount they asked for.
        requested: u64,
    },

    /// Principal or collateral counters would overflow.
    #[error("amount overflow in collateral accounting")]
    AmountOverflow,

    /// An underlying token ledger operation failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A yield venue operation failed.
    #[error(transparent)]
    Yield(#[from] YieldError),
}

// ---------------------------------------------------------------------------
// CollateralPosition
// ---------------------------------------------------------------------------

/// One user's collateral record. Created on first deposit, mutated on
/// every deposit and withdrawal, zeroed on full exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralPosition {
    /// The owning user.
    pub user: String,
    /// Deposited principal still outstanding, in USDC units.
    pub principal: u64,
    /// Venue share units backing this principal.
    pub yield_share_units: u64,
    /// Timestamp of the last deposit or withdrawal.
    pub last_updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// HubVaultLedger
// ---------------------------------------------------------------------------

/// The hub vault: per-user collateral positions plus the 1:1 mint/burn
/// path between USDC and USDX.
///
/// The vault does not own the ledgers or the venue — the domain does, and
/// passes them in per call. That keeps each operation an explicit function
/// of all the state it touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubVaultLedger {
    /// The vault's ledger address (custodies USDC in flight, holds the
    /// Vault role on the USDX ledger).
    address: String,
    /// Collateral positions by user.
    positions: HashMap<String, CollateralPosition>,
    /// Σ principal over all users.
    total_collateral: u64,
    /// Cumulative net USDX minted by this vault. Equal to
    /// `total_collateral` by construction; tracked separately so the
    /// invariant is checkable rather than definitional.
    total_minted: u64,
}

impl HubVaultLedger {
    /// Creates an empty vault operating as `address`.
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            positions: HashMap::new(),
            total_collateral: 0,
            total_minted: 0,
        }
    }

    /// The vault's ledger address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Deposits `amount` USDC from `user`, mints `amount` USDX to them,
    /// and forwards the USDC into the yield venue.
    ///
    /// # Errors
    ///
    /// [`VaultError::ZeroAmount`] on zero; [`VaultError::Token`] when the
    /// user's USDC balance is short; [`VaultError::AmountOverflow`] /
    /// [`VaultError::Yield`] on accounting overflow.
    pub fn deposit(
        &mut self,
        usdc: &mut TokenLedger,
        usdx: &mut TokenLedger,
        venue: &mut YieldVault,
        user: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, VaultError> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }

        // Preflight: everything that could fail, before anything moves.
        let user_balance = usdc.balance_of(user);
        if user_balance < amount {
            return Err(VaultError::Token(TokenError::InsufficientBalance {
                address: user.to_string(),
                available: user_balance,
                requested: amount,
            }));
        }
        let shares = venue.preview_deposit(amount, now)?;
        let (new_principal, new_share_units) = match self.positions.get(user) {
            Some(p) => (
                p.principal.checked_add(amount),
                p.yield_share_units.checked_add(shares),
            ),
            None => (Some(amount), Some(shares)),
        };
        let new_principal = new_principal.ok_or(VaultError::AmountOverflow)?;
        let new_share_units = new_share_units.ok_or(VaultError::AmountOverflow)?;
        let new_total = self
            .total_collateral
            .checked_add(amount)
            .ok_or(VaultError::AmountOverflow)?;
        if usdx.total_supply().checked_add(amount).is_none() {
            return Err(VaultError::AmountOverflow);
        }

        // Commit: pull collateral, record the position, mint 1:1, and
        // forward into the venue last.
        usdc.transfer(user, &self.address, amount)?;
        let position = self
            .positions
            .entry(user.to_string())
            .or_insert_with(|| CollateralPosition {
                user: user.to_string(),
                principal: 0,
                yield_share_units: 0,
                last_updated: now,
            });
        position.principal = new_principal;
        position.yield_share_units = new_share_units;
        position.last_updated = now;
        self.total_collateral = new_total;
        self.total_minted = self.total_minted.saturating_add(amount);
        usdx.mint(&self.address, user, amount)?;
        venue.deposit(usdc, &self.address, amount, now)?;

        Ok(LedgerEvent::Deposited {
            user: user.to_string(),
            usdc_amount: amount,
            usdx_amount: amount,
        })
    }

    /// Burns `amount` USDX from `user` and pays out the proportional slice
    /// of their venue shares in USDC. The payout is at least `amount` once
    /// yield has accrued.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientCollateral`] when `amount` exceeds the
    /// user's principal; [`VaultError::Token`] when the user no longer
    /// holds `amount` USDX to burn (e.g. it was bridged away).
    pub fn withdraw(
        &mut self,
        usdc: &mut TokenLedger,
        usdx: &mut TokenLedger,
        venue: &mut YieldVault,
        user: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<LedgerEvent, VaultError> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }

        let available = self.user_collateral(user);
        if available < amount {
            return Err(VaultError::InsufficientCollateral {
                user: user.to_string(),
                available,
                requested: amount,
            });
        }

        // The released principal's proportional slice of the share units,
        // rounded up so even a dust withdrawal redeems at least one unit.
        // Withdrawing the full principal releases every share unit exactly.
        let Some(position) = self.positions.get_mut(user) else {
            return Err(VaultError::InsufficientCollateral {
                user: user.to_string(),
                available: 0,
                requested: amount,
            });
        };
        let share_units = position.yield_share_units;
        let principal = position.principal;
        let redeem_units = (((share_units as u128) * (amount as u128) + (principal as u128) - 1)
            / (principal as u128)) as u64;
        let redeem_units = redeem_units.min(share_units);

        // Burn first: a user whose USDX went to another domain cannot
        // withdraw the collateral that backs it here.
        usdx.burn_from(&self.address, user, amount)?;
        let payout = venue.redeem(usdc, &self.address, redeem_units, now)?;

        position.principal -= amount;
        position.yield_share_units -= redeem_units;
        position.last_updated = now;
        self.total_collateral -= amount;
        self.total_minted -= amount;

        usdc.transfer(&self.address, user, payout)?;

        Ok(LedgerEvent::Withdrawn {
            user: user.to_string(),
            usdc_amount: payout,
            usdx_amount: amount,
        })
    }

    /// The user's principal (deposited collateral, excluding yield).
    pub fn user_collateral(&self, user: &str) -> u64 {
        self.positions.get(user).map(|p| p.principal).unwrap_or(0)
    }

    /// The user's full hub position: principal plus accrued yield, i.e.
    /// their share units valued at the venue's current price. This is the
    /// snapshot the relayer attests to spoke minters.
    pub fn user_position(&self, venue: &YieldVault, user: &str, now: DateTime<Utc>) -> u64 {
        self.positions
            .get(user)
            .map(|p| venue.preview_assets_for(p.yield_share_units, now))
            .unwrap_or(0)
    }

    /// The user's venue exposure as `(share_units, asset_value)`.
    pub fn user_yield_position(
        &self,
        venue: &YieldVault,
        user: &str,
        now: DateTime<Utc>,
    ) -> (u64, u64) {
        match self.positions.get(user) {
            Some(p) => (
                p.yield_share_units,
                venue.preview_assets_for(p.yield_share_units, now),
            ),
            None => (0, 0),
        }
    }

    /// The full position record, if the user ever deposited.
    pub fn position(&self, user: &str) -> Option<&CollateralPosition> {
        self.positions.get(user)
    }

    /// Σ principal over all users.
    pub fn total_collateral(&self) -> u64 {
        self.total_collateral
    }

    /// Cumulative net vault-minted USDX.
    pub fn total_minted(&self) -> u64 {
        self.total_minted
    }

    /// Collateral per minted USDX in 1e6 fixed point. Always 1.0 by
    /// construction; exposed for dashboards that want to see the books
    /// say so.
    pub fn collateral_ratio(&self) -> u64 {
        if self.total_minted == 0 {
            return 1_000_000;
        }
        ((self.total_collateral as u128) * 1_000_000 / (self.total_minted as u128)) as u64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
