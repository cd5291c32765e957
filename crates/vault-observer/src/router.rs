//! Axum router construction for the query API.
//!
//! Assembles all routes into a single [`Router`] with CORS enabled for
//! cross-origin dashboard access, request tracing, and the stale-ledger
//! header.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Header set to `true` on every response while ingestion is halted.
pub const STALE_HEADER: &str = "x-ledger-stale";

/// Build the complete Axum router for the query server.
///
/// See [`handlers`] for the route table.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(STALE_HEADER)]);

    Router::new()
        .route("/api/status", get(handlers::get_status))
        .route("/api/roster", get(handlers::get_roster))
        .route("/api/members/{address}", get(handlers::get_member))
        .route(
            "/api/members/{address}/disbursements",
            get(handlers::get_member_disbursements),
        )
        .route(
            "/api/members/{address}/claimable",
            get(handlers::get_member_claimable),
        )
        .route(
            "/api/members/{address}/positions",
            get(handlers::get_member_positions),
        )
        .route("/api/epochs/{index}", get(handlers::get_epoch))
        .route(
            "/api/epochs/{index}/disbursements",
            get(handlers::get_epoch_disbursements),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            mark_stale,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Flag responses served from a halted ledger.
async fn mark_stale(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let stale = state.view.read().await.status.is_stale();
    let mut response = next.run(request).await;
    if stale {
        response
            .headers_mut()
            .insert(STALE_HEADER, HeaderValue::from_static("true"));
    }
    response
}
