//! Axum route handlers for the recommendation chat API.

use axum::{extract::State, Json};
use tracing::warn;

use crate::errors::AppError;
use crate::gigs::fetcher::fetch_all_gigs_or_empty;
use crate::llm_client::LlmError;
use crate::recommendation::generator::{parse_recommendations, with_gig_snapshot};
use crate::recommendation::models::{ChatRequest, RecommendationsResponse};
use crate::state::AppState;

/// POST /chat
///
/// Chat history in, seller recommendations out. A backend outage means the
/// model sees no sellers; an empty or unreadable model reply means no
/// recommendations. Only a failed generation call is reported as an error.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<RecommendationsResponse>, AppError> {
    let gigs = fetch_all_gigs_or_empty(state.gigs.as_ref()).await;

    let conversation =
        with_gig_snapshot(request.messages, &gigs).map_err(|e| AppError::Internal(e.into()))?;

    let reply = match state.generator.generate(&conversation).await {
        Ok(reply) => reply,
        Err(LlmError::EmptyContent) => {
            warn!("Model returned an empty reply");
            return Ok(Json(RecommendationsResponse {
                recommendations: Vec::new(),
            }));
        }
        Err(e) => return Err(e.into()),
    };

    let recommendations = parse_recommendations(&reply).unwrap_or_else(|e| {
        warn!("Discarding model reply: {e}");
        Vec::new()
    });

    Ok(Json(RecommendationsResponse { recommendations }))
}
