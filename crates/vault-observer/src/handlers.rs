//! REST API endpoint handlers for the query server.
//!
//! All handlers read the committed [`LedgerView`](vault_ingest::LedgerView)
//! through the shared [`AppState`] and wrap their payload in a
//! [`QueryResponse`] that embeds the ingestion status.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/status` | Ingestion health |
//! | `GET` | `/api/roster` | Roster totals |
//! | `GET` | `/api/members/{address}` | Member scores and reward totals |
//! | `GET` | `/api/members/{address}/disbursements` | Per-epoch allocations |
//! | `GET` | `/api/members/{address}/claimable` | Cumulative claimable series |
//! | `GET` | `/api/members/{address}/positions` | Open vault positions (`?asset=gfi\|capital`) |
//! | `GET` | `/api/epochs/{index}` | Finalized epoch summary |
//! | `GET` | `/api/epochs/{index}/disbursements` | All allocations of an epoch |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};

use vault_types::{
    ClaimablePoint, Disbursement, EpochSummary, IngestStatus, MemberId, MemberSummary,
    QueryResponse, RosterSummary, VaultAsset, VaultPosition,
};

use crate::error::ObserverError;
use crate::state::AppState;

fn parse_member(raw: &str) -> Result<MemberId, ObserverError> {
    MemberId::parse(raw).map_err(|e| ObserverError::InvalidAddress(e.to_string()))
}

fn parse_epoch(raw: &str) -> Result<u64, ObserverError> {
    raw.parse()
        .map_err(|e| ObserverError::InvalidQuery(format!("epoch index {raw:?}: {e}")))
}

/// Query parameters for `GET /api/members/{address}/positions`.
#[derive(Debug, serde::Deserialize)]
pub struct PositionsQuery {
    /// Only return positions of this asset (`gfi` or `capital`).
    pub asset: Option<String>,
}

fn unknown_member(id: &MemberId) -> ObserverError {
    ObserverError::NotFound(format!("member {id}"))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Ingestion health: halted or healthy, head cursor, and counters.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<IngestStatus> {
    Json(state.status().await)
}

// ---------------------------------------------------------------------------
// GET /api/roster
// ---------------------------------------------------------------------------

/// Roster totals, member count, and the last checkpointed epoch.
pub async fn get_roster(
    State(state): State<Arc<AppState>>,
) -> Json<QueryResponse<RosterSummary>> {
    let view = state.view.read().await;
    Json(QueryResponse::new(
        view.status.clone(),
        view.state.roster_summary(),
    ))
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Scores, reward totals, and open position count for one member.
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<QueryResponse<MemberSummary>>, ObserverError> {
    let id = parse_member(&address)?;
    let view = state.view.read().await;
    let summary = view
        .state
        .member_summary(&id)
        .ok_or_else(|| unknown_member(&id))?;
    Ok(Json(QueryResponse::new(view.status.clone(), summary)))
}

/// A member's disbursements in epoch order.
pub async fn get_member_disbursements(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<QueryResponse<Vec<Disbursement>>>, ObserverError> {
    let id = parse_member(&address)?;
    let view = state.view.read().await;
    if view.state.member_summary(&id).is_none() {
        return Err(unknown_member(&id));
    }
    let disbursements = view
        .state
        .disbursements()
        .for_member(&id)
        .cloned()
        .collect();
    Ok(Json(QueryResponse::new(view.status.clone(), disbursements)))
}

/// Cumulative allocated, claimed, and claimable amounts per epoch, for
/// charting.
pub async fn get_member_claimable(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<QueryResponse<Vec<ClaimablePoint>>>, ObserverError> {
    let id = parse_member(&address)?;
    let view = state.view.read().await;
    if view.state.member_summary(&id).is_none() {
        return Err(unknown_member(&id));
    }
    let series = view.state.disbursements().claimable_series(&id);
    Ok(Json(QueryResponse::new(view.status.clone(), series)))
}

/// Open vault positions owned by a member.
///
/// # Query Parameters
///
/// - `asset`: `gfi` | `capital` (default: both)
pub async fn get_member_positions(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<PositionsQuery>,
) -> Result<Json<QueryResponse<Vec<VaultPosition>>>, ObserverError> {
    let id = parse_member(&address)?;
    let asset = params
        .asset
        .as_deref()
        .map(str::parse::<VaultAsset>)
        .transpose()
        .map_err(ObserverError::InvalidQuery)?;
    let view = state.view.read().await;
    if view.state.member_summary(&id).is_none() {
        return Err(unknown_member(&id));
    }
    let positions = view
        .state
        .positions()
        .owned_by(&id)
        .filter(|p| asset.is_none_or(|a| p.asset == a))
        .cloned()
        .collect();
    Ok(Json(QueryResponse::new(view.status.clone(), positions)))
}

// ---------------------------------------------------------------------------
// Epochs
// ---------------------------------------------------------------------------

/// Rewards, snapshot total, and allocation totals of a finalized epoch.
pub async fn get_epoch(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
) -> Result<Json<QueryResponse<EpochSummary>>, ObserverError> {
    let index = parse_epoch(&index)?;
    let view = state.view.read().await;
    let summary = view
        .state
        .epoch_summary(index)
        .ok_or_else(|| ObserverError::NotFound(format!("epoch {index} is not finalized")))?;
    Ok(Json(QueryResponse::new(view.status.clone(), summary)))
}

/// Every disbursement allocated for a finalized epoch, in member order.
pub async fn get_epoch_disbursements(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
) -> Result<Json<QueryResponse<Vec<Disbursement>>>, ObserverError> {
    let index = parse_epoch(&index)?;
    let view = state.view.read().await;
    if view.state.epochs().get(index).is_none() {
        return Err(ObserverError::NotFound(format!(
            "epoch {index} is not finalized"
        )));
    }
    let disbursements = view
        .state
        .disbursements()
        .for_epoch(index)
        .cloned()
        .collect();
    Ok(Json(QueryResponse::new(view.status.clone(), disbursements)))
}
