//! # Yield Venue
//!
//! The venue the hub vault forwards deposited USDC into. Share-priced in
//! the familiar way: depositors receive share units at the current price,
//! the price is `total_assets / total_share_units`, and accrual pushes
//! `total_assets` up over time, so the price is monotonically
//! non-decreasing absent redemptions.
//!
//! Accrual is linear at a configured APR and is *realized on the ledger*:
//! the accrued delta is minted to the venue's own address (the venue holds
//! the Minter role on the collateral ledger). Yield that only existed as a
//! number inside the venue would make the collateral ledger lie about
//! where USDC actually is; minting it keeps every unit of `total_assets`
//! backed by a visible balance.
//!
//! The accrual clock only advances when at least one whole unit accrues.
//! Frequent small polls therefore accumulate elapsed time instead of
//! flooring each sliver of yield to zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use usdx_protocol::config::{BPS_DENOMINATOR, SECONDS_PER_YEAR};
use usdx_protocol::token::{TokenError, TokenLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur in the yield venue.
#[derive(Debug, Error)]
pub enum YieldError {
    /// Zero-amount deposits and redemptions are caller bugs.
    #[error("zero-amount venue operations are not permitted")]
    ZeroAmount,

    /// The deposit is worth less than one share unit at the current price.
    #[error("deposit of {assets} is below one share unit at the current price")]
    BelowOneShare {
        /// The asset amount that was offered.
        assets: u64,
    },

    /// Tried to redeem more share units than exist.
    #[error("insufficient share units: requested {requested}, outstanding {outstanding}")]
    InsufficientShares {
        /// Share units requested.
        requested: u64,
        /// Share units outstanding.
        outstanding: u64,
    },

    /// Arithmetic overflow in share or asset accounting.
    #[error("amount overflow in venue accounting")]
    AmountOverflow,

    /// An underlying collateral ledger operation failed.
    #[error(transparent)]
    Token(#[from] TokenError),
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `a * b / d` with a u128 intermediate, flooring. `None` on division by
/// zero or if the result exceeds `u64::MAX`.
fn mul_div(a: u64, b: u64, d: u64) -> Option<u64> {
    if d == 0 {
        return None;
    }
    let wide = (a as u128) * (b as u128) / (d as u128);
    u64::try_from(wide).ok()
}

// ---------------------------------------------------------------------------
// YieldVault
// ---------------------------------------------------------------------------

/// Share-priced yield venue holding the hub's forwarded collateral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldVault {
    /// The venue's address on the collateral ledger.
    address: String,
    /// Total asset value backing all share units, in collateral units.
    total_assets: u64,
    /// Share units outstanding.
    total_share_units: u64,
    /// Annual yield in basis points.
    apr_bps: u32,
    /// Accrual has been applied up to this instant.
    last_accrual: DateTime<Utc>,
}

impl YieldVault {
    /// Creates an empty venue accruing at `apr_bps` from `genesis` onward.
    pub fn new(address: &str, apr_bps: u32, genesis: DateTime<Utc>) -> Self {
        Self {
            address: address.to_string(),
            total_assets: 0,
            total_share_units: 0,
            apr_bps,
            last_accrual: genesis,
        }
    }

    /// The venue's address on the collateral ledger.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Total assets currently booked (excluding pending accrual).
    pub fn total_assets(&self) -> u64 {
        self.total_assets
    }

    /// Share units outstanding.
    pub fn total_share_units(&self) -> u64 {
        self.total_share_units
    }

    /// Yield not yet booked: linear APR over the time since `last_accrual`.
    fn pending_accrual(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - self.last_accrual).num_seconds();
        if elapsed <= 0 || self.total_assets == 0 {
            return 0;
        }
        // total_assets * apr_bps * elapsed / (10_000 * seconds_per_year),
        // kept in u128 until the final narrowing.
        let numerator =
            (self.total_assets as u128) * (self.apr_bps as u128) * (elapsed as u128);
        let denominator = (BPS_DENOMINATOR as u128) * (SECONDS_PER_YEAR as u128);
        u64::try_from(numerator / denominator).unwrap_or(u64::MAX)
    }

    /// Books pending accrual up to `now`, minting the delta to the venue's
    /// address on the collateral ledger. Returns the booked amount.
    ///
    /// If the pending yield floors to zero, neither the books nor the
    /// accrual clock move — the elapsed time keeps accumulating.
    pub fn accrue_to(
        &mut self,
        collateral: &mut TokenLedger,
        now: DateTime<Utc>,
    ) -> Result<u64, YieldError> {
        let delta = self.pending_accrual(now);
        if delta == 0 {
            return Ok(0);
        }

        collateral.mint(&self.address, &self.address, delta)?;
        self.total_assets = self
            .total_assets
            .checked_add(delta)
            .ok_or(YieldError::AmountOverflow)?;
        self.last_accrual = now;
        Ok(delta)
    }

    /// Share units a deposit of `assets` would mint at `now`, including
    /// pending accrual, without touching any state.
    ///
    /// # Errors
    ///
    /// [`YieldError::ZeroAmount`] on zero, [`YieldError::BelowOneShare`]
    /// if the deposit floors to zero share units.
    pub fn preview_deposit(&self, assets: u64, now: DateTime<Utc>) -> Result<u64, YieldError> {
        if assets == 0 {
            return Err(YieldError::ZeroAmount);
        }
        if self.total_share_units == 0 {
            // First deposit sets the price at exactly 1.
            return Ok(assets);
        }
        let effective_assets = self
            .total_assets
            .checked_add(self.pending_accrual(now))
            .ok_or(YieldError::AmountOverflow)?;
        let shares = mul_div(assets, self.total_share_units, effective_assets)
            .ok_or(YieldError::AmountOverflow)?;
        if shares == 0 {
            return Err(YieldError::BelowOneShare { assets });
        }
        Ok(shares)
    }

    /// Deposits `assets` from `from` and mints share units at the current
    /// price. Moves the collateral `from` → venue. Returns the share units.
    pub fn deposit(
        &mut self,
        collateral: &mut TokenLedger,
        from: &str,
        assets: u64,
        now: DateTime<Utc>,
    ) -> Result<u64, YieldError> {
        self.accrue_to(collateral, now)?;
        let shares = self.preview_deposit(assets, now)?;

        let new_assets = self
            .total_assets
            .checked_add(assets)
            .ok_or(YieldError::AmountOverflow)?;
        let new_shares = self
            .total_share_units
            .checked_add(shares)
            .ok_or(YieldError::AmountOverflow)?;

        collateral.transfer(from, &self.address, assets)?;
        self.total_assets = new_assets;
        self.total_share_units = new_shares;
        Ok(shares)
    }

    /// Redeems `share_units` for assets at the current price, paying the
    /// collateral venue → `to`. Returns the asset payout.
    pub fn redeem(
        &mut self,
        collateral: &mut TokenLedger,
        to: &str,
        share_units: u64,
        now: DateTime<Utc>,
    ) -> Result<u64, YieldError> {
        if share_units == 0 {
            return Err(YieldError::ZeroAmount);
        }
        self.accrue_to(collateral, now)?;
        if share_units > self.total_share_units {
            return Err(YieldError::InsufficientShares {
                requested: share_units,
                outstanding: self.total_share_units,
            });
        }

        let assets = mul_div(share_units, self.total_assets, self.total_share_units)
            .ok_or(YieldError::AmountOverflow)?;

        collateral.transfer(&self.address, to, assets)?;
        self.total_assets -= assets;
        self.total_share_units -= share_units;
        Ok(assets)
    }

    /// Asset value of `share_units` at `now`, including pending accrual.
    /// Read-only; used for position snapshots.
    pub fn preview_assets_for(&self, share_units: u64, now: DateTime<Utc>) -> u64 {
        if self.total_share_units == 0 {
            return 0;
        }
        let effective_assets = self
            .total_assets
            .saturating_add(self.pending_accrual(now));
        mul_div(share_units, effective_assets, self.total_share_units).unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
