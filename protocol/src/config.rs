//! # Protocol Configuration & Constants
//!
//! Every magic number in USDX lives here. If you're hardcoding a constant
//! somewhere else, stop and move it — the accounting invariants are only
//! auditable when the parameters are in one place.

use std::time::Duration;

use crate::ids::ChainId;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The protocol version string, reported by the relayer and the API.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Chains
// ---------------------------------------------------------------------------

/// Default hub chain id. 1, after the chain the protocol grew up on.
pub const DEFAULT_HUB_CHAIN_ID: ChainId = ChainId(1);

/// Default spoke chain id. 137, for the same sentimental reason.
pub const DEFAULT_SPOKE_CHAIN_ID: ChainId = ChainId(137);

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Collateral token symbol.
pub const USDC_SYMBOL: &str = "USDC";

/// Protocol token symbol.
pub const USDX_SYMBOL: &str = "USDX";

/// Both tokens use 6 display decimals, so a unit of USDX is always a unit
/// of USDC. Keeping the denominations identical is what makes "1:1" an
/// equation over raw `u64`s instead of a scaling exercise.
pub const TOKEN_DECIMALS: u8 = 6;

// ---------------------------------------------------------------------------
// Well-Known Addresses
// ---------------------------------------------------------------------------

/// The genesis admin: owner of every role table created at domain genesis.
pub const ADMIN_ADDRESS: &str = "usdx:admin";

/// The hub vault's ledger address. Holds the Vault role on the hub USDX
/// ledger and custodies USDC between user and yield venue.
pub const VAULT_ADDRESS: &str = "usdx:vault";

/// The yield venue's ledger address. Holds deposited USDC plus accrued
/// yield, and the Minter role on the hub USDC ledger.
pub const VENUE_ADDRESS: &str = "usdx:venue";

/// Each domain's bridge manager address. Holds the Bridge role on that
/// domain's USDX ledger.
pub const BRIDGE_ADDRESS: &str = "usdx:bridge";

/// The spoke minter's ledger address. Holds the Vault role on the spoke
/// USDX ledger (1:1 mint against attested positions).
pub const SPOKE_MINTER_ADDRESS: &str = "usdx:spoke-minter";

/// Default relayer identity, granted the Relayer role at genesis.
pub const RELAYER_ADDRESS: &str = "usdx:relayer";

// ---------------------------------------------------------------------------
// Yield Parameters
// ---------------------------------------------------------------------------

/// Default yield venue APR in basis points. 500 = 5.00%, roughly what a
/// short-duration treasury strategy earned when these books were designed.
pub const DEFAULT_YIELD_APR_BPS: u32 = 500;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Seconds per (non-leap) year, the accrual time base.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Relayer Timing
// ---------------------------------------------------------------------------

/// Heartbeat interval: one log line with both domains' heights, roughly
/// this often.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default interval between event-log polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Retry budget for a single relayer delivery before the failure is
/// declared unrecoverable.
pub const RETRY_MAX_ATTEMPTS: u32 = 5;

/// First retry delay; doubles per attempt up to [`RETRY_MAX_DELAY`].
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Ceiling on the exponential backoff.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Maximum number of events returned by one `events_since` page.
pub const EVENT_PAGE_SIZE: usize = 256;

// ---------------------------------------------------------------------------
// Relayer Ports
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_API_PORT: u16 = 8973;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 8974;
