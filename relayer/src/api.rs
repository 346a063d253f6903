//! # HTTP API
//!
//! Builds the axum router for driving and observing the simnet. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path               | Description                              |
//! |--------|--------------------|------------------------------------------|
//! | GET    | `/health`          | Liveness probe                           |
//! | GET    | `/status`          | Versions, chain ids, heights, uptime     |
//! | GET    | `/positions/:user` | A user's view across both domains        |
//! | POST   | `/hub/fund`        | Devnet faucet: mint USDC to a user       |
//! | POST   | `/hub/deposit`     | Deposit USDC into the hub vault          |
//! | POST   | `/hub/withdraw`    | Burn USDX for a USDC payout              |
//! | POST   | `/bridge/transfer` | Initiate a cross-domain transfer         |
//! | POST   | `/spoke/mint`      | Relayer-attested spoke mint for a user   |
//!
//! `/spoke/mint` is the relayer acting on a user's behalf: it reads the
//! hub position fresh, generates a unique mint id, and submits the mint
//! with that snapshot attested — the same call path the external relayer
//! contract surface expects.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use usdx_protocol::config::RELAYER_ADDRESS;
use usdx_protocol::events::LedgerEvent;
use usdx_protocol::ids::MintId;

use crate::simnet::{BridgeEndpoint, CallError, HubHandle, SpokeHandle};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
/// Cheap to clone — the handles are channel senders.
#[derive(Clone)]
pub struct AppState {
    /// The relayer's reported version string.
    pub version: String,
    /// When the process started, for uptime reporting.
    pub started_at: Instant,
    /// Handle to the hub domain actor.
    pub hub: HubHandle,
    /// Handle to the spoke domain actor.
    pub spoke: SpokeHandle,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// HTTP-facing error wrapper. Duplicate-key rejections map to 409 (the
/// operation already happened), other domain rejections to 422, and an
/// unreachable domain actor to 502.
#[derive(Debug)]
pub enum ApiError {
    /// A call through a domain handle failed.
    Call(CallError),
    /// The request itself was malformed.
    BadRequest(String),
}

impl From<CallError> for ApiError {
    fn from(err: CallError) -> Self {
        ApiError::Call(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Call(CallError::Rpc(msg)) => (StatusCode::BAD_GATEWAY, msg.to_string()),
            ApiError::Call(CallError::Domain(err)) if err.is_duplicate() => {
                (StatusCode::CONFLICT, err.to_string())
            }
            ApiError::Call(CallError::Domain(err)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body for the user+amount POST endpoints.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    /// The acting user's address.
    pub user: String,
    /// Amount in smallest units.
    pub amount: u64,
}

/// Body for `POST /bridge/transfer`.
#[derive(Debug, Deserialize)]
pub struct BridgeTransferRequest {
    /// Which domain to burn on: "hub" or "spoke".
    pub from_chain: String,
    /// The sender to burn from.
    pub sender: String,
    /// Amount in smallest units.
    pub amount: u64,
    /// The recipient on the other domain.
    pub recipient: String,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Relayer software version.
    pub version: String,
    /// Hub chain id.
    pub hub_chain_id: u64,
    /// Spoke chain id.
    pub spoke_chain_id: u64,
    /// Hub domain height.
    pub hub_height: u64,
    /// Spoke domain height.
    pub spoke_height: u64,
    /// Seconds since process start.
    pub uptime_secs: u64,
}

/// Response payload for `GET /positions/:user`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PositionResponse {
    /// The queried user.
    pub user: String,
    /// Authoritative hub position (principal plus accrued yield).
    pub hub_position: u64,
    /// Hub principal only.
    pub hub_collateral: u64,
    /// USDC balance on the hub.
    pub hub_usdc_balance: u64,
    /// USDX balance on the hub.
    pub hub_usdx_balance: u64,
    /// The spoke's relayer-synced view of the hub position, if synced.
    pub spoke_cached_position: Option<u64>,
    /// Cumulative USDX minted for the user on the spoke.
    pub spoke_minted_total: u64,
    /// USDX balance on the spoke.
    pub spoke_usdx_balance: u64,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/positions/:user", get(position_handler))
        .route("/hub/fund", post(fund_handler))
        .route("/hub/deposit", post(deposit_handler))
        .route("/hub/withdraw", post(withdraw_handler))
        .route("/bridge/transfer", post(bridge_transfer_handler))
        .route("/spoke/mint", post(spoke_mint_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let hub_height = state.hub.height().await?;
    let spoke_height = state.spoke.height().await?;

    Ok(Json(StatusResponse {
        version: state.version.clone(),
        hub_chain_id: state.hub.chain_id().0,
        spoke_chain_id: state.spoke.chain_id().0,
        hub_height,
        spoke_height,
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

async fn position_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<PositionResponse>, ApiError> {
    let hub_position = state.hub.user_position(&user).await?;
    let hub_collateral = state.hub.user_collateral(&user).await?;
    let (hub_usdc_balance, hub_usdx_balance) = state.hub.balances(&user).await?;
    let spoke_cached_position = state.spoke.hub_position(&user).await?;
    let spoke_minted_total = state.spoke.minted_total(&user).await?;
    let spoke_usdx_balance = state.spoke.usdx_balance(&user).await?;

    Ok(Json(PositionResponse {
        user,
        hub_position,
        hub_collateral,
        hub_usdc_balance,
        hub_usdx_balance,
        spoke_cached_position,
        spoke_minted_total,
        spoke_usdx_balance,
    }))
}

async fn fund_handler(
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.hub.fund(&request.user, request.amount).await?;
    Ok(Json(json!({ "user": request.user, "funded": request.amount })))
}

async fn deposit_handler(
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<LedgerEvent>, ApiError> {
    let event = state.hub.deposit(&request.user, request.amount).await?;
    Ok(Json(event))
}

async fn withdraw_handler(
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<LedgerEvent>, ApiError> {
    let event = state.hub.withdraw(&request.user, request.amount).await?;
    Ok(Json(event))
}

async fn bridge_transfer_handler(
    State(state): State<AppState>,
    Json(request): Json<BridgeTransferRequest>,
) -> Result<Json<LedgerEvent>, ApiError> {
    let event = match request.from_chain.as_str() {
        "hub" => {
            state
                .hub
                .transfer_cross_chain(
                    &request.sender,
                    request.amount,
                    state.spoke.chain_id(),
                    &request.recipient,
                )
                .await?
        }
        "spoke" => {
            state
                .spoke
                .transfer_cross_chain(
                    &request.sender,
                    request.amount,
                    state.hub.chain_id(),
                    &request.recipient,
                )
                .await?
        }
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown from_chain {other:?}; expected \"hub\" or \"spoke\""
            )));
        }
    };
    Ok(Json(event))
}

/// The relayer entrypoint proper: fresh snapshot, unique idempotency key,
/// one single-shot delivery to the spoke minter.
async fn spoke_mint_handler(
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<LedgerEvent>, ApiError> {
    let snapshot = state.hub.user_position(&request.user).await?;
    let mint_id = MintId::derive(&request.user, &Uuid::new_v4().to_string());

    let event = state
        .spoke
        .mint_from_hub_position(
            RELAYER_ADDRESS,
            &request.user,
            request.amount,
            snapshot,
            mint_id,
        )
        .await?;
    Ok(Json(event))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
