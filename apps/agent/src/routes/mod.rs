pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::recommendation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/chat", post(handlers::handle_chat))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // The buyer-facing frontend is served from other origins.
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
