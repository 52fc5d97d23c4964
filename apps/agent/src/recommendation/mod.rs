//! Recommendation Generator and the /chat endpoint.
//! All LLM calls go through llm_client; no direct Gemini calls here.

pub mod generator;
pub mod handlers;
pub mod models;
pub mod prompts;
