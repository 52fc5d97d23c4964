use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Review averages computed by the backend over every review of a gig.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub service_as_described: f64,
    pub communication_level: f64,
    pub recommend_to_a_friend: f64,
}

/// Price and turnaround for one pricing tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub price: f64,
    pub delivery_days: f64,
}

/// A gig record exactly as `gigs:getAllGigsForAgent` returns it.
/// `gig_description` is normally the editor's serialized rich-text document,
/// but older records carry `null` or omit it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGig {
    pub gig_id: String,
    pub gig_title: String,
    pub username: String,
    #[serde(default)]
    pub gig_description: Option<Value>,
    pub subcategory: String,
    pub reviews: ReviewSummary,
    /// Keyed by tier name: "Basic", "Standard", "Premium".
    pub offers: BTreeMap<String, Offer>,
}

/// The projection handed to the model as seller context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gig {
    pub gig_id: String,
    pub gig_title: String,
    pub username: String,
    /// Plain text; empty when the rich-text document could not be read.
    pub gig_description: String,
    pub subcategory: String,
    pub reviews: ReviewSummary,
    pub offers: BTreeMap<String, Offer>,
}
