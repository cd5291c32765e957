//! Integration tests for the query API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic and routing
//! without needing a live network connection.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use vault_ingest::LedgerView;
use vault_ledger::{EpochClock, LedgerState};
use vault_observer::{AppState, STALE_HEADER, build_router};
use vault_types::{
    EventCursor, IngestHealth, IngestStatus, MemberId, PositionId, VaultEvent,
};

const WEEK: u64 = 604_800;
const MEMBER: &str = "0x00000000000000000000000000000000000000aa";

fn member() -> MemberId {
    MemberId::parse(MEMBER).unwrap()
}

fn populated_state() -> LedgerState {
    let mut state = LedgerState::new(EpochClock::new(WEEK).unwrap());
    let events = [
        VaultEvent::GfiDeposit {
            position_id: PositionId(1),
            owner: member(),
            amount: 100,
            deposit_timestamp: 10,
        },
        VaultEvent::AdjustedHoldings {
            member: member(),
            eligible_amount: 0,
            next_epoch_amount: 100,
        },
        VaultEvent::Checkpoint {
            block_timestamp: WEEK,
        },
        VaultEvent::EpochFinalized {
            epoch: 1,
            total_rewards: 1000,
            block_timestamp: 2 * WEEK,
        },
        VaultEvent::RewardPaid {
            member: member(),
            epoch: 1,
            claimed_amount: 400,
        },
    ];
    for event in &events {
        state.apply(event).unwrap();
    }
    state
}

fn status(health: IngestHealth) -> IngestStatus {
    IngestStatus {
        health,
        head: Some(EventCursor {
            block_height: 5,
            log_index: 0,
        }),
        events_applied: 5,
        retractions: 0,
        committed_at: None,
    }
}

async fn make_test_state(health: IngestHealth) -> Arc<AppState> {
    let state = Arc::new(AppState::genesis(EpochClock::new(WEEK).unwrap()));
    state
        .publish(LedgerView {
            state: populated_state(),
            status: status(health),
        })
        .await;
    state
}

async fn get(state: Arc<AppState>, uri: &str) -> axum::response::Response {
    build_router(state)
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_status_reports_health() {
    let state = make_test_state(IngestHealth::Healthy).await;
    let response = get(state, "/api/status").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(STALE_HEADER).is_none());
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["health"]["state"], "healthy");
    assert_eq!(json["events_applied"], 5);
}

#[tokio::test]
async fn test_roster_totals() {
    let state = make_test_state(IngestHealth::Healthy).await;
    let response = get(state, "/api/roster").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["stale"], false);
    assert_eq!(json["data"]["member_count"], 1);
    assert_eq!(json["data"]["eligible_score_total"], "100");
    assert_eq!(json["data"]["last_checkpointed_epoch"], 1);
    assert_eq!(json["data"]["finalized_epochs"], 1);
    assert_eq!(json["data"]["gfi_held"], "100");
    assert_eq!(json["data"]["capital_held"], "0");
}

#[tokio::test]
async fn test_get_member() {
    let state = make_test_state(IngestHealth::Healthy).await;
    let response = get(state, &format!("/api/members/{MEMBER}")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"]["eligible_score"], "100");
    assert_eq!(json["data"]["total_allocated"], "1000");
    assert_eq!(json["data"]["total_claimed"], "400");
    assert_eq!(json["data"]["open_positions"], 1);
}

#[tokio::test]
async fn test_member_address_is_case_insensitive() {
    let state = make_test_state(IngestHealth::Healthy).await;
    let response = get(
        state,
        "/api/members/0x00000000000000000000000000000000000000AA",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_member_disbursements_and_claimable() {
    let state = make_test_state(IngestHealth::Healthy).await;

    let response = get(
        Arc::clone(&state),
        &format!("/api/members/{MEMBER}/disbursements"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    let list = json["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["epoch"], 1);
    assert_eq!(list[0]["allocated_amount"], "1000");
    assert_eq!(list[0]["claimed_amount"], "400");

    let response = get(state, &format!("/api/members/{MEMBER}/claimable")).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"][0]["cumulative_claimable"], "600");
}

#[tokio::test]
async fn test_member_positions() {
    let state = make_test_state(IngestHealth::Healthy).await;
    let response = get(state, &format!("/api/members/{MEMBER}/positions")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"][0]["asset"], "gfi");
    assert_eq!(json["data"][0]["amount"], "100");
    assert_eq!(json["data"][0]["deposited_at_epoch"], 0);
}

#[tokio::test]
async fn test_member_positions_filtered_by_asset() {
    let state = make_test_state(IngestHealth::Healthy).await;

    let response = get(
        Arc::clone(&state),
        &format!("/api/members/{MEMBER}/positions?asset=gfi"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let response = get(
        Arc::clone(&state),
        &format!("/api/members/{MEMBER}/positions?asset=capital"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["data"].as_array().unwrap().is_empty());

    let response = get(state, &format!("/api/members/{MEMBER}/positions?asset=btc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_get_epoch_and_disbursements() {
    let state = make_test_state(IngestHealth::Healthy).await;

    let response = get(Arc::clone(&state), "/api/epochs/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"]["total_rewards"], "1000");
    assert_eq!(json["data"]["eligible_score_total"], "100");
    assert_eq!(json["data"]["recipients"], 1);
    assert_eq!(json["data"]["starts_at_timestamp"], WEEK);

    let response = get(state, "/api/epochs/1/disbursements").await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_member_404() {
    let state = make_test_state(IngestHealth::Healthy).await;
    let response = get(
        state,
        "/api/members/0x00000000000000000000000000000000000000bb",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_invalid_address_400() {
    let state = make_test_state(IngestHealth::Healthy).await;
    let response = get(state, "/api/members/not-an-address").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_unfinalized_epoch_404_and_bad_index_400() {
    let state = make_test_state(IngestHealth::Healthy).await;
    let response = get(Arc::clone(&state), "/api/epochs/9").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(state, "/api/epochs/latest").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_halted_ledger_marks_responses_stale() {
    let state = make_test_state(IngestHealth::Halted {
        reason: "overclaim".to_owned(),
    })
    .await;

    let response = get(Arc::clone(&state), "/api/roster").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(STALE_HEADER).unwrap().to_str().unwrap(),
        "true"
    );
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["stale"], true);
    assert_eq!(json["status"]["health"]["state"], "halted");
    assert_eq!(json["status"]["health"]["reason"], "overclaim");

    let response = get(state, "/api/epochs/9").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(STALE_HEADER).is_some());
}
