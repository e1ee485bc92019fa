//! Axum router construction.
//!
//! Assembles all routes into a single [`Router`] with CORS and request
//! tracing enabled for cross-origin dashboard access.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete router for the game API.
///
/// CORS allows any origin for development; restrict it in production.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Liveness
        .route("/health", get(handlers::health))
        // Session entry
        .route("/entry/quote", post(handlers::entry_quote))
        .route("/entry/confirm", post(handlers::entry_confirm))
        // Agent-facing
        .route("/world/observation", get(handlers::world_observation))
        .route("/world/action", post(handlers::world_action))
        // World read-outs
        .route("/world/status", get(handlers::world_status))
        .route("/world/grid", get(handlers::world_grid))
        .route("/world/agents", get(handlers::world_agents))
        .route("/world/leaderboard", get(handlers::world_leaderboard))
        .route("/world/reputation", get(handlers::world_reputation))
        .route("/world/market", get(handlers::world_market))
        // Admin
        .route("/admin/tick", post(handlers::admin_tick))
        .route("/admin/reset-world", post(handlers::admin_reset_world))
        .route(
            "/admin/spawn-demo-agents",
            post(handlers::admin_spawn_demo_agents),
        )
        .route("/admin/events", get(handlers::admin_events))
        .route("/admin/dqn-log", post(handlers::admin_dqn_log))
        .route("/admin/finalize-game", post(handlers::admin_finalize_game))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
