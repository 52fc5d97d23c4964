//! Gig Fetcher: read-only snapshot of seller listings from the marketplace backend.

pub mod fetcher;
pub mod models;
