//! # Role-Based Authorization
//!
//! Every mutating entrypoint in USDX starts the same way: check the
//! caller's role against an explicit authorization table. The check is a
//! pure predicate over `(granted roles, requested operation)` — no
//! dispatch, no middleware, no surprises.
//!
//! Each component owns its own [`RoleTable`]: the token ledgers gate
//! mint/burn, the spoke minter and the bridge gate their relayer-only
//! entrypoints. Tables are administered by a single admin address fixed at
//! construction; only the admin can grant or revoke.
//!
//! ## Who may do what
//!
//! | Role    | Mint | Burn | Notes                                        |
//! |---------|------|------|----------------------------------------------|
//! | Minter  | ✓    |      | Yield venue minting accrued collateral       |
//! | Burner  |      | ✓    |                                              |
//! | Vault   | ✓    | ✓    | The hub vault's 1:1 deposit/withdraw path    |
//! | Bridge  | ✓    | ✓    | Burn-then-mint transfer path                 |
//! | Relayer |      |      | Gates relayer-only entrypoints, not ledgers  |

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by authorization checks.
#[derive(Debug, Error)]
pub enum RoleError {
    /// The caller does not hold the role this entrypoint requires.
    #[error("unauthorized: {subject} does not hold role {role}")]
    MissingRole {
        /// The address that made the call.
        subject: String,
        /// The role the entrypoint requires.
        role: Role,
    },

    /// None of the caller's roles permit the requested ledger operation.
    #[error("unauthorized: {subject} may not perform {op}")]
    OperationDenied {
        /// The address that made the call.
        subject: String,
        /// The ledger operation that was attempted.
        op: LedgerOp,
    },

    /// Only the table's admin may grant or revoke roles.
    #[error("unauthorized: {subject} is not the role admin")]
    NotAdmin {
        /// The address that attempted the administrative change.
        subject: String,
    },
}

// ---------------------------------------------------------------------------
// Roles & Operations
// ---------------------------------------------------------------------------

/// The roles recognized across the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May mint ledger tokens. Held by the yield venue on the hub USDC
    /// ledger so accrued yield is minted, not conjured off the books.
    Minter,
    /// May burn ledger tokens.
    Burner,
    /// May call relayer-only entrypoints (spoke mints, bridge completions).
    Relayer,
    /// The hub vault: mints USDX on deposit, burns it on withdrawal.
    Vault,
    /// The bridge transfer manager: burns on initiation, mints on completion.
    Bridge,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Minter => "Minter",
            Role::Burner => "Burner",
            Role::Relayer => "Relayer",
            Role::Vault => "Vault",
            Role::Bridge => "Bridge",
        };
        write!(f, "{}", name)
    }
}

/// The operations a token ledger gates behind roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    /// Creating supply.
    Mint,
    /// Destroying supply.
    Burn,
}

impl fmt::Display for LedgerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerOp::Mint => write!(f, "mint"),
            LedgerOp::Burn => write!(f, "burn"),
        }
    }
}

/// The authorization table: which roles permit which ledger operations.
///
/// Pure and total — this is the single place where the role → operation
/// mapping lives. `Relayer` deliberately permits neither: it gates
/// component entrypoints, never ledger supply.
pub fn role_allows(role: Role, op: LedgerOp) -> bool {
    matches!(
        (role, op),
        (Role::Minter, LedgerOp::Mint)
            | (Role::Burner, LedgerOp::Burn)
            | (Role::Vault, _)
            | (Role::Bridge, _)
    )
}

// ---------------------------------------------------------------------------
// RoleTable
// ---------------------------------------------------------------------------

/// A component's set of role grants, administered by a fixed admin address.
///
/// Grants are `(subject, role)` pairs. Lookups are pure; mutations require
/// the admin. The table never grants anything implicitly — not even to the
/// admin itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleTable {
    /// The only address allowed to grant and revoke.
    admin: String,
    /// Granted roles, per subject address.
    grants: HashMap<String, HashSet<Role>>,
}

impl RoleTable {
    /// Creates an empty table with the given admin.
    pub fn new(admin: &str) -> Self {
        Self {
            admin: admin.to_string(),
            grants: HashMap::new(),
        }
    }

    /// Returns the admin address.
    pub fn admin(&self) -> &str {
        &self.admin
    }

    /// Grants `role` to `subject`. Admin only. Granting an already-held
    /// role is a no-op.
    pub fn grant(&mut self, caller: &str, subject: &str, role: Role) -> Result<(), RoleError> {
        self.require_admin(caller)?;
        self.grants.entry(subject.to_string()).or_default().insert(role);
        Ok(())
    }

    /// Revokes `role` from `subject`. Admin only. Revoking a role the
    /// subject never held is a no-op.
    pub fn revoke(&mut self, caller: &str, subject: &str, role: Role) -> Result<(), RoleError> {
        self.require_admin(caller)?;
        if let Some(roles) = self.grants.get_mut(subject) {
            roles.remove(&role);
        }
        Ok(())
    }

    /// Pure predicate: does `subject` hold `role`?
    pub fn has_role(&self, subject: &str, role: Role) -> bool {
        self.grants.get(subject).is_some_and(|roles| roles.contains(&role))
    }

    /// Requires that `subject` holds `role`. The first line of every
    /// role-gated entrypoint.
    pub fn require(&self, subject: &str, role: Role) -> Result<(), RoleError> {
        if self.has_role(subject, role) {
            Ok(())
        } else {
            Err(RoleError::MissingRole {
                subject: subject.to_string(),
                role,
            })
        }
    }

    /// Requires that at least one of `subject`'s roles permits `op`,
    /// per [`role_allows`]. The first line of every ledger mutation.
    pub fn authorize(&self, subject: &str, op: LedgerOp) -> Result<(), RoleError> {
        let permitted = self
            .grants
            .get(subject)
            .is_some_and(|roles| roles.iter().any(|&r| role_allows(r, op)));
        if permitted {
            Ok(())
        } else {
            Err(RoleError::OperationDenied {
                subject: subject.to_string(),
                op,
            })
        }
    }

    fn require_admin(&self, caller: &str) -> Result<(), RoleError> {
        if caller == self.admin {
            Ok(())
        } else {
            Err(RoleError::NotAdmin {
                subject: caller.to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
