//! Route handlers.
//!
//! Host callbacks and admin operations take the router lock for the duration
//! of one engine call; queries take it for one read.

use alloy::primitives::{Address, Bytes};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::http::auth::CallerAddress;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::lifecycle::startup::capture_snapshot;
use crate::router::anomaly::Anomaly;
use crate::router::engine::Termination;
use crate::router::error::RouterError;
use crate::router::metadata::encode_intent;
use crate::router::registry::DistributionIndex;
use crate::streaming::types::FlowRate;

// ---------------------------------------------------------------------------
// Host callbacks
// ---------------------------------------------------------------------------

/// Routing intent of a create or update.
///
/// Raw `metadata` wins over `recipient`; with neither, the metadata is empty.
#[derive(Debug, Deserialize)]
pub struct StreamIntent {
    pub token: Option<Address>,
    pub rate: FlowRate,
    pub recipient: Option<Address>,
    pub metadata: Option<Bytes>,
}

impl StreamIntent {
    fn metadata(&self) -> Vec<u8> {
        match (&self.metadata, self.recipient) {
            (Some(raw), _) => raw.to_vec(),
            (None, Some(recipient)) => encode_intent(recipient),
            (None, None) => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateStreamRequest {
    pub contributor: Address,
    #[serde(flatten)]
    pub intent: StreamIntent,
}

#[derive(Debug, Serialize)]
pub struct StreamAck {
    pub contributor: Address,
    pub recipient: Option<Address>,
    pub rate: FlowRate,
    pub sequence: u64,
}

fn ack(state: &AppState, contributor: Address) -> StreamAck {
    state.router.read(|engine| {
        let routed = engine.ledger().rate_for(&contributor);
        StreamAck {
            contributor,
            recipient: routed.map(|(recipient, _)| recipient),
            rate: routed.map(|(_, rate)| rate).unwrap_or_default(),
            sequence: engine.sequence(),
        }
    })
}

pub async fn create_stream(
    State(state): State<AppState>,
    Json(request): Json<CreateStreamRequest>,
) -> Result<(StatusCode, Json<StreamAck>), ApiError> {
    let token = request.intent.token.unwrap_or(state.token);
    let metadata = request.intent.metadata();
    state
        .router
        .create_stream(request.contributor, token, request.intent.rate, &metadata)?;
    Ok((StatusCode::CREATED, Json(ack(&state, request.contributor))))
}

pub async fn update_stream(
    State(state): State<AppState>,
    Path(contributor): Path<Address>,
    Json(intent): Json<StreamIntent>,
) -> Result<Json<StreamAck>, ApiError> {
    let token = intent.token.unwrap_or(state.token);
    let metadata = intent.metadata();
    state
        .router
        .update_stream(contributor, token, intent.rate, &metadata)?;
    Ok(Json(ack(&state, contributor)))
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<Address>,
}

pub async fn delete_stream(
    State(state): State<AppState>,
    Path(contributor): Path<Address>,
    Query(query): Query<TokenQuery>,
) -> Json<Termination> {
    let token = query.token.unwrap_or(state.token);
    Json(state.router.delete_stream(contributor, token))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRecipientRequest {
    pub address: Address,
}

pub async fn register_recipient(
    State(state): State<AppState>,
    CallerAddress(caller): CallerAddress,
    Json(request): Json<RegisterRecipientRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .router
        .with(|engine| engine.register_recipient(caller, request.address))?;
    Ok(StatusCode::CREATED)
}

pub async fn initialize_distribution(
    State(state): State<AppState>,
    CallerAddress(caller): CallerAddress,
) -> Result<(StatusCode, Json<DistributionIndex>), ApiError> {
    let index = state
        .router
        .with(|engine| engine.initialize_distribution(caller))?;
    Ok((StatusCode::CREATED, Json(index)))
}

#[derive(Debug, Serialize)]
pub struct DistributionRefresh {
    pub strategy: &'static str,
    pub units: BTreeMap<Address, String>,
}

pub async fn refresh_distribution(
    State(state): State<AppState>,
    CallerAddress(caller): CallerAddress,
) -> Result<Json<DistributionRefresh>, ApiError> {
    let strategy = state.matching.as_ref();
    let units = state
        .router
        .with(|engine| engine.refresh_distribution(caller, strategy, state.unit_scale))?;
    Ok(Json(DistributionRefresh {
        strategy: strategy.name(),
        units: units.into_iter().map(|(a, u)| (a, u.to_string())).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct SnapshotSaved {
    pub path: PathBuf,
    pub sequence: u64,
}

pub async fn save_snapshot(
    State(state): State<AppState>,
    CallerAddress(caller): CallerAddress,
) -> Result<Json<SnapshotSaved>, ApiError> {
    let owner = state.router.read(|engine| engine.owner());
    if caller != owner {
        return Err(RouterError::Unauthorized { caller }.into());
    }
    let path = state
        .config
        .router
        .snapshot_path
        .clone()
        .ok_or(ApiError::SnapshotDisabled)?;

    let snapshot = capture_snapshot(&state.router);
    let sequence = snapshot.sequence;
    let target = path.clone();
    tokio::task::spawn_blocking(move || snapshot.save_to_file(&target))
        .await
        .map_err(|e| ApiError::Task(e.to_string()))??;

    Ok(Json(SnapshotSaved { path, sequence }))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct NetFlow {
    pub router: Address,
    pub rate: FlowRate,
}

pub async fn net_flow(State(state): State<AppState>) -> Json<NetFlow> {
    Json(state.router.read(|engine| NetFlow {
        router: engine.address(),
        rate: engine.net_router_flow(),
    }))
}

#[derive(Debug, Serialize)]
pub struct RecipientFlow {
    pub recipient: Address,
    pub rate: FlowRate,
}

pub async fn recipient_flow(
    State(state): State<AppState>,
    Path(recipient): Path<Address>,
) -> Json<RecipientFlow> {
    Json(RecipientFlow {
        recipient,
        rate: state.router.read(|engine| engine.flow_to_recipient(&recipient)),
    })
}

#[derive(Debug, Serialize)]
pub struct RecipientInfo {
    pub address: Address,
    pub registered: bool,
    pub units: String,
    pub outbound_rate: FlowRate,
    /// Sum of contributor rates currently crediting this recipient.
    pub accruing_rate: FlowRate,
    pub total_contributed: String,
    pub contributors: usize,
}

pub async fn recipient_info(
    State(state): State<AppState>,
    Path(address): Path<Address>,
) -> Json<RecipientInfo> {
    Json(state.router.read(|engine| RecipientInfo {
        address,
        registered: engine.is_registered(&address),
        units: engine
            .registry()
            .get(&address)
            .map(|r| r.units)
            .unwrap_or_default()
            .to_string(),
        outbound_rate: engine.flow_to_recipient(&address),
        accruing_rate: engine.accumulator().open_rate_for(&address),
        total_contributed: engine.total_contributed(&address).to_string(),
        contributors: engine.contributors_for(&address).len(),
    }))
}

#[derive(Debug, Serialize)]
pub struct Contribution {
    pub contributor: Address,
    pub amount: String,
    pub rate: FlowRate,
}

pub async fn recipient_contributions(
    State(state): State<AppState>,
    Path(recipient): Path<Address>,
) -> Json<Vec<Contribution>> {
    Json(state.router.read(|engine| {
        let accumulator = engine.accumulator();
        accumulator
            .contributions_at(&recipient, engine.now())
            .into_iter()
            .map(|(contributor, amount)| Contribution {
                contributor,
                amount: amount.to_string(),
                rate: accumulator
                    .contribution(&contributor, &recipient)
                    .map(|record| record.rate)
                    .unwrap_or_default(),
            })
            .collect()
    }))
}

pub async fn anomalies(State(state): State<AppState>) -> Json<Vec<Anomaly>> {
    Json(state.router.read(|engine| engine.anomalies().to_vec()))
}

#[derive(Debug, Serialize)]
pub struct RouterStatus {
    pub version: &'static str,
    pub router: Address,
    pub owner: Address,
    pub token: Address,
    pub sequence: u64,
    pub recipients: usize,
    pub active_streams: usize,
    pub distribution: Option<DistributionIndex>,
    pub total_units: String,
    pub net_flow: FlowRate,
    pub reconciled: bool,
    pub anomalies: usize,
}

pub async fn status(State(state): State<AppState>) -> Json<RouterStatus> {
    Json(state.router.read(|engine| RouterStatus {
        version: env!("CARGO_PKG_VERSION"),
        router: engine.address(),
        owner: engine.owner(),
        token: engine.token(),
        sequence: engine.sequence(),
        recipients: engine.registry().len(),
        active_streams: engine.ledger().len(),
        distribution: engine.registry().distribution(),
        total_units: engine.registry().total_units().to_string(),
        net_flow: engine.net_router_flow(),
        reconciled: engine.check_invariants().is_ok(),
        anomalies: engine.anomalies().len(),
    }))
}
