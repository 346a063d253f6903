//! # Simnet Domain Actors
//!
//! Each domain runs as a single tokio task that owns its state outright
//! and serves requests from an mpsc channel — the actor realization of
//! "one operation at a time, total ordering, no shared memory". The only
//! way to touch a domain is a message through its handle, and the only
//! way to observe one is to poll its event log. That is the same contract
//! a relayer has against a real remote chain, minus the latency.
//!
//! Handles are cheap clones around the sender side of the channel. A
//! request against a dead actor surfaces as [`CallError::Rpc`] — the
//! in-process analogue of an unreachable RPC endpoint, and the error
//! class the relay loops retry with backoff.
//!
//! Wall-clock timestamps are stamped inside the actor, at application
//! time. The contract layer itself takes explicit `now` parameters and
//! stays deterministic under test.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use usdx_contracts::{DomainError, HubDomain, SpokeDomain};
use usdx_protocol::events::LedgerEvent;
use usdx_protocol::ids::{ChainId, MintId, TransferId};

/// Queue depth per domain actor. Requests beyond this apply backpressure
/// to callers rather than growing without bound.
const ACTOR_QUEUE_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a call through a domain handle.
#[derive(Debug, Error)]
pub enum CallError {
    /// The domain actor is gone — the in-process analogue of an
    /// unreachable RPC endpoint. Transient from the caller's point of
    /// view, hence retryable; in practice the process is shutting down.
    #[error("domain unreachable: {0}")]
    Rpc(&'static str),

    /// The domain applied the request and rejected it. Deterministic;
    /// retrying the identical request yields the identical rejection.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

// ---------------------------------------------------------------------------
// Hub actor
// ---------------------------------------------------------------------------

/// Requests served by the hub domain actor.
enum HubRequest {
    Fund {
        user: String,
        amount: u64,
        resp: oneshot::Sender<Result<(), DomainError>>,
    },
    Deposit {
        user: String,
        amount: u64,
        resp: oneshot::Sender<Result<LedgerEvent, DomainError>>,
    },
    Withdraw {
        user: String,
        amount: u64,
        resp: oneshot::Sender<Result<LedgerEvent, DomainError>>,
    },
    UserPosition {
        user: String,
        resp: oneshot::Sender<u64>,
    },
    UserCollateral {
        user: String,
        resp: oneshot::Sender<u64>,
    },
    Balances {
        user: String,
        resp: oneshot::Sender<(u64, u64)>,
    },
    TransferCrossChain {
        sender: String,
        amount: u64,
        dest_chain_id: ChainId,
        recipient: String,
        resp: oneshot::Sender<Result<LedgerEvent, DomainError>>,
    },
    CompleteTransfer {
        caller: String,
        transfer_id: TransferId,
        source_chain_id: ChainId,
        original_sender: String,
        amount: u64,
        recipient: String,
        resp: oneshot::Sender<Result<LedgerEvent, DomainError>>,
    },
    EventsSince {
        offset: u64,
        limit: usize,
        resp: oneshot::Sender<(u64, Vec<LedgerEvent>)>,
    },
    Height {
        resp: oneshot::Sender<u64>,
    },
}

/// Spawns the hub domain actor and returns its handle.
pub fn spawn_hub(mut domain: HubDomain) -> HubHandle {
    let (tx, mut rx) = mpsc::channel::<HubRequest>(ACTOR_QUEUE_DEPTH);
    let chain_id = domain.chain_id();

    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let now = Utc::now();
            match request {
                HubRequest::Fund { user, amount, resp } => {
                    let _ = resp.send(domain.fund(&user, amount));
                }
                HubRequest::Deposit { user, amount, resp } => {
                    let _ = resp.send(domain.deposit(&user, amount, now));
                }
                HubRequest::Withdraw { user, amount, resp } => {
                    let _ = resp.send(domain.withdraw(&user, amount, now));
                }
                HubRequest::UserPosition { user, resp } => {
                    let _ = resp.send(domain.user_position(&user, now));
                }
                HubRequest::UserCollateral { user, resp } => {
                    let _ = resp.send(domain.user_collateral(&user));
                }
                HubRequest::Balances { user, resp } => {
                    let _ = resp.send((domain.usdc_balance(&user), domain.usdx_balance(&user)));
                }
                HubRequest::TransferCrossChain {
                    sender,
                    amount,
                    dest_chain_id,
                    recipient,
                    resp,
                } => {
                    let _ = resp.send(domain.transfer_cross_chain(
                        &sender,
                        amount,
                        dest_chain_id,
                        &recipient,
                        now,
                    ));
                }
                HubRequest::CompleteTransfer {
                    caller,
                    transfer_id,
                    source_chain_id,
                    original_sender,
                    amount,
                    recipient,
                    resp,
                } => {
                    let _ = resp.send(domain.complete_transfer(
                        &caller,
                        transfer_id,
                        source_chain_id,
                        &original_sender,
                        amount,
                        &recipient,
                        now,
                    ));
                }
                HubRequest::EventsSince { offset, limit, resp } => {
                    let _ = resp.send(domain.events_since(offset, limit));
                }
                HubRequest::Height { resp } => {
                    let _ = resp.send(domain.height());
                }
            }
        }
        tracing::debug!(chain_id = %chain_id, "hub domain actor stopped");
    });

    HubHandle { tx, chain_id }
}

/// Client handle to the hub domain actor.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubRequest>,
    chain_id: ChainId,
}

impl HubHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HubRequest,
    ) -> Result<T, CallError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(build(resp))
            .await
            .map_err(|_| CallError::Rpc("hub domain actor is gone"))?;
        rx.await.map_err(|_| CallError::Rpc("hub domain dropped the reply"))
    }

    /// Devnet faucet: mints USDC to `user`.
    pub async fn fund(&self, user: &str, amount: u64) -> Result<(), CallError> {
        let result = self
            .call(|resp| HubRequest::Fund {
                user: user.to_string(),
                amount,
                resp,
            })
            .await?;
        Ok(result?)
    }

    /// Deposits USDC into the vault for `user`.
    pub async fn deposit(&self, user: &str, amount: u64) -> Result<LedgerEvent, CallError> {
        let result = self
            .call(|resp| HubRequest::Deposit {
                user: user.to_string(),
                amount,
                resp,
            })
            .await?;
        Ok(result?)
    }

    /// Withdraws USDC by burning `amount` USDX from `user`.
    pub async fn withdraw(&self, user: &str, amount: u64) -> Result<LedgerEvent, CallError> {
        let result = self
            .call(|resp| HubRequest::Withdraw {
                user: user.to_string(),
                amount,
                resp,
            })
            .await?;
        Ok(result?)
    }

    /// The authoritative hub position snapshot for `user`.
    pub async fn user_position(&self, user: &str) -> Result<u64, CallError> {
        self.call(|resp| HubRequest::UserPosition {
            user: user.to_string(),
            resp,
        })
        .await
    }

    /// The user's principal only.
    pub async fn user_collateral(&self, user: &str) -> Result<u64, CallError> {
        self.call(|resp| HubRequest::UserCollateral {
            user: user.to_string(),
            resp,
        })
        .await
    }

    /// `(usdc, usdx)` balances of `user` on the hub.
    pub async fn balances(&self, user: &str) -> Result<(u64, u64), CallError> {
        self.call(|resp| HubRequest::Balances {
            user: user.to_string(),
            resp,
        })
        .await
    }

    /// Initiates a cross-domain transfer from the hub.
    pub async fn transfer_cross_chain(
        &self,
        sender: &str,
        amount: u64,
        dest_chain_id: ChainId,
        recipient: &str,
    ) -> Result<LedgerEvent, CallError> {
        let result = self
            .call(|resp| HubRequest::TransferCrossChain {
                sender: sender.to_string(),
                amount,
                dest_chain_id,
                recipient: recipient.to_string(),
                resp,
            })
            .await?;
        Ok(result?)
    }
}

#[async_trait]
impl BridgeEndpoint for HubHandle {
    fn name(&self) -> &'static str {
        "hub"
    }

    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn height(&self) -> Result<u64, CallError> {
        self.call(|resp| HubRequest::Height { resp }).await
    }

    async fn events_since(
        &self,
        offset: u64,
        limit: usize,
    ) -> Result<(u64, Vec<LedgerEvent>), CallError> {
        self.call(|resp| HubRequest::EventsSince { offset, limit, resp })
            .await
    }

    async fn complete_transfer(
        &self,
        caller: &str,
        transfer_id: TransferId,
        source_chain_id: ChainId,
        original_sender: &str,
        amount: u64,
        recipient: &str,
    ) -> Result<LedgerEvent, CallError> {
        let result = self
            .call(|resp| HubRequest::CompleteTransfer {
                caller: caller.to_string(),
                transfer_id,
                source_chain_id,
                original_sender: original_sender.to_string(),
                amount,
                recipient: recipient.to_string(),
                resp,
            })
            .await?;
        Ok(result?)
    }
}

// ---------------------------------------------------------------------------
// Spoke actor
// ---------------------------------------------------------------------------

/// Requests served by the spoke domain actor.
enum SpokeRequest {
    MintFromHubPosition {
        caller: String,
        user: String,
        amount: u64,
        hub_position_snapshot: u64,
        mint_id: MintId,
        resp: oneshot::Sender<Result<LedgerEvent, DomainError>>,
    },
    UpdateHubPosition {
        caller: String,
        user: String,
        position: u64,
        resp: oneshot::Sender<Result<LedgerEvent, DomainError>>,
    },
    HubPosition {
        user: String,
        resp: oneshot::Sender<Option<u64>>,
    },
    MintedTotal {
        user: String,
        resp: oneshot::Sender<u64>,
    },
    Balance {
        user: String,
        resp: oneshot::Sender<u64>,
    },
    TransferCrossChain {
        sender: String,
        amount: u64,
        dest_chain_id: ChainId,
        recipient: String,
        resp: oneshot::Sender<Result<LedgerEvent, DomainError>>,
    },
    CompleteTransfer {
        caller: String,
        transfer_id: TransferId,
        source_chain_id: ChainId,
        original_sender: String,
        amount: u64,
        recipient: String,
        resp: oneshot::Sender<Result<LedgerEvent, DomainError>>,
    },
    EventsSince {
        offset: u64,
        limit: usize,
        resp: oneshot::Sender<(u64, Vec<LedgerEvent>)>,
    },
    Height {
        resp: oneshot::Sender<u64>,
    },
}

/// Spawns the spoke domain actor and returns its handle.
pub fn spawn_spoke(mut domain: SpokeDomain) -> SpokeHandle {
    let (tx, mut rx) = mpsc::channel::<SpokeRequest>(ACTOR_QUEUE_DEPTH);
    let chain_id = domain.chain_id();

    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let now = Utc::now();
            match request {
                SpokeRequest::MintFromHubPosition {
                    caller,
                    user,
                    amount,
                    hub_position_snapshot,
                    mint_id,
                    resp,
                } => {
                    let _ = resp.send(domain.mint_from_hub_position(
                        &caller,
                        &user,
                        amount,
                        hub_position_snapshot,
                        mint_id,
                        now,
                    ));
                }
                SpokeRequest::UpdateHubPosition {
                    caller,
                    user,
                    position,
                    resp,
                } => {
                    let _ = resp.send(domain.update_hub_position(&caller, &user, position));
                }
                SpokeRequest::HubPosition { user, resp } => {
                    let _ = resp.send(domain.hub_position(&user));
                }
                SpokeRequest::MintedTotal { user, resp } => {
                    let _ = resp.send(domain.minted_total(&user));
                }
                SpokeRequest::Balance { user, resp } => {
                    let _ = resp.send(domain.usdx_balance(&user));
                }
                SpokeRequest::TransferCrossChain {
                    sender,
                    amount,
                    dest_chain_id,
                    recipient,
                    resp,
                } => {
                    let _ = resp.send(domain.transfer_cross_chain(
                        &sender,
                        amount,
                        dest_chain_id,
                        &recipient,
                        now,
                    ));
                }
                SpokeRequest::CompleteTransfer {
                    caller,
                    transfer_id,
                    source_chain_id,
                    original_sender,
                    amount,
                    recipient,
                    resp,
                } => {
                    let _ = resp.send(domain.complete_transfer(
                        &caller,
                        transfer_id,
                        source_chain_id,
                        &original_sender,
                        amount,
                        &recipient,
                        now,
                    ));
                }
                SpokeRequest::EventsSince { offset, limit, resp } => {
                    let _ = resp.send(domain.events_since(offset, limit));
                }
                SpokeRequest::Height { resp } => {
                    let _ = resp.send(domain.height());
                }
            }
        }
        tracing::debug!(chain_id = %chain_id, "spoke domain actor stopped");
    });

    SpokeHandle { tx, chain_id }
}

/// Client handle to the spoke domain actor.
#[derive(Clone)]
pub struct SpokeHandle {
    tx: mpsc::Sender<SpokeRequest>,
    chain_id: ChainId,
}

impl SpokeHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SpokeRequest,
    ) -> Result<T, CallError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(build(resp))
            .await
            .map_err(|_| CallError::Rpc("spoke domain actor is gone"))?;
        rx.await
            .map_err(|_| CallError::Rpc("spoke domain dropped the reply"))
    }

    /// Mints USDX against an attested hub position snapshot.
    pub async fn mint_from_hub_position(
        &self,
        caller: &str,
        user: &str,
        amount: u64,
        hub_position_snapshot: u64,
        mint_id: MintId,
    ) -> Result<LedgerEvent, CallError> {
        let result = self
            .call(|resp| SpokeRequest::MintFromHubPosition {
                caller: caller.to_string(),
                user: user.to_string(),
                amount,
                hub_position_snapshot,
                mint_id,
                resp,
            })
            .await?;
        Ok(result?)
    }

    /// Refreshes the spoke's cached hub position for `user`.
    pub async fn update_hub_position(
        &self,
        caller: &str,
        user: &str,
        position: u64,
    ) -> Result<LedgerEvent, CallError> {
        let result = self
            .call(|resp| SpokeRequest::UpdateHubPosition {
                caller: caller.to_string(),
                user: user.to_string(),
                position,
                resp,
            })
            .await?;
        Ok(result?)
    }

    /// The cached hub position for `user`, if ever synced.
    pub async fn hub_position(&self, user: &str) -> Result<Option<u64>, CallError> {
        self.call(|resp| SpokeRequest::HubPosition {
            user: user.to_string(),
            resp,
        })
        .await
    }

    /// Cumulative USDX minted for `user` on this spoke.
    pub async fn minted_total(&self, user: &str) -> Result<u64, CallError> {
        self.call(|resp| SpokeRequest::MintedTotal {
            user: user.to_string(),
            resp,
        })
        .await
    }

    /// USDX balance of `user` on the spoke.
    pub async fn usdx_balance(&self, user: &str) -> Result<u64, CallError> {
        self.call(|resp| SpokeRequest::Balance {
            user: user.to_string(),
            resp,
        })
        .await
    }

    /// Initiates a cross-domain transfer from the spoke.
    pub async fn transfer_cross_chain(
        &self,
        sender: &str,
        amount: u64,
        dest_chain_id: ChainId,
        recipient: &str,
    ) -> Result<LedgerEvent, CallError> {
        let result = self
            .call(|resp| SpokeRequest::TransferCrossChain {
                sender: sender.to_string(),
                amount,
                dest_chain_id,
                recipient: recipient.to_string(),
                resp,
            })
            .await?;
        Ok(result?)
    }
}

#[async_trait]
impl BridgeEndpoint for SpokeHandle {
    fn name(&self) -> &'static str {
        "spoke"
    }

    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn height(&self) -> Result<u64, CallError> {
        self.call(|resp| SpokeRequest::Height { resp }).await
    }

    async fn events_since(
        &self,
        offset: u64,
        limit: usize,
    ) -> Result<(u64, Vec<LedgerEvent>), CallError> {
        self.call(|resp| SpokeRequest::EventsSince { offset, limit, resp })
            .await
    }

    async fn complete_transfer(
        &self,
        caller: &str,
        transfer_id: TransferId,
        source_chain_id: ChainId,
        original_sender: &str,
        amount: u64,
        recipient: &str,
    ) -> Result<LedgerEvent, CallError> {
        let result = self
            .call(|resp| SpokeRequest::CompleteTransfer {
                caller: caller.to_string(),
                transfer_id,
                source_chain_id,
                original_sender: original_sender.to_string(),
                amount,
                recipient: recipient.to_string(),
                resp,
            })
            .await?;
        Ok(result?)
    }
}

// ---------------------------------------------------------------------------
// BridgeEndpoint
// ---------------------------------------------------------------------------

/// The slice of a domain the bridge-completion loop needs: its log, its
/// height, and its completion entrypoint. Both handles implement it, so
/// one loop serves both relay directions.
#[async_trait]
pub trait BridgeEndpoint: Clone + Send + Sync + 'static {
    /// Short domain name for log lines.
    fn name(&self) -> &'static str;

    /// The domain's chain id.
    fn chain_id(&self) -> ChainId;

    /// The domain's current height.
    async fn height(&self) -> Result<u64, CallError>;

    /// Events from absolute `offset`, up to `limit`, plus the next offset.
    async fn events_since(
        &self,
        offset: u64,
        limit: usize,
    ) -> Result<(u64, Vec<LedgerEvent>), CallError>;

    /// Applies a completion on this domain.
    async fn complete_transfer(
        &self,
        caller: &str,
        transfer_id: TransferId,
        source_chain_id: ChainId,
        original_sender: &str,
        amount: u64,
        recipient: &str,
    ) -> Result<LedgerEvent, CallError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
