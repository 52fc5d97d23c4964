//! Gig Fetcher: loads every published gig from the backend and projects it to
//! the fields the recommendation prompt needs.
//!
//! `AppState` holds an `Arc<dyn GigSource>`; production uses `ConvexClient`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::convex::{ConvexClient, FetchError};
use crate::gigs::models::{Gig, RawGig};

/// Backend query that returns every published gig with reviews and offers resolved.
pub const ALL_GIGS_QUERY: &str = "gigs:getAllGigsForAgent";

/// Source of raw gig records. Implement this to swap backends without
/// touching the fetcher or handler code.
#[async_trait]
pub trait GigSource: Send + Sync {
    async fn all_gigs(&self) -> Result<Vec<RawGig>, FetchError>;
}

#[async_trait]
impl GigSource for ConvexClient {
    async fn all_gigs(&self) -> Result<Vec<RawGig>, FetchError> {
        self.query(ALL_GIGS_QUERY, json!({})).await
    }
}

/// Fetches and projects every gig. One backend read, no caching.
pub async fn fetch_all_gigs(source: &dyn GigSource) -> Result<Vec<Gig>, FetchError> {
    let raw = source.all_gigs().await?;
    let gigs: Vec<Gig> = raw.into_iter().map(project).collect();
    info!("Fetched {} gigs", gigs.len());
    Ok(gigs)
}

/// Like [`fetch_all_gigs`], but a backend failure yields an empty list so the
/// request can continue without seller context.
pub async fn fetch_all_gigs_or_empty(source: &dyn GigSource) -> Vec<Gig> {
    match fetch_all_gigs(source).await {
        Ok(gigs) => gigs,
        Err(e) => {
            warn!("Gig fetch failed, continuing without seller context: {e}");
            Vec::new()
        }
    }
}

fn project(raw: RawGig) -> Gig {
    let description = raw
        .gig_description
        .as_ref()
        .and_then(Value::as_str)
        .map(extract_description)
        .unwrap_or_default();

    Gig {
        gig_description: description,
        gig_id: raw.gig_id,
        gig_title: raw.gig_title,
        username: raw.username,
        subcategory: raw.subcategory,
        reviews: raw.reviews,
        offers: raw.offers,
    }
}

/// Returns the first text node of a serialized rich-text document
/// (`[{"content": [{"text": ...}]}, ...]`), or `""` if the document is
/// malformed or has no such node.
pub fn extract_description(document: &str) -> String {
    serde_json::from_str::<Value>(document)
        .ok()
        .as_ref()
        .and_then(|doc| doc.get(0))
        .and_then(|block| block.get("content"))
        .and_then(|content| content.get(0))
        .and_then(|node| node.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
