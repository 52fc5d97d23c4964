use std::sync::Arc;

use crate::gigs::fetcher::GigSource;
use crate::recommendation::generator::ReplyGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
/// Both handles are built once at startup and hold no per-request state.
#[derive(Clone)]
pub struct AppState {
    /// Gig backend. Default: ConvexClient.
    pub gigs: Arc<dyn GigSource>,
    /// Model backend. Default: GeminiRecommender.
    pub generator: Arc<dyn ReplyGenerator>,
}
