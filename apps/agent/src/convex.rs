//! Convex client: read-only access to the marketplace backend over its HTTP query API.
//!
//! Only public queries are called, so no auth token is attached.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("query '{path}' failed: {message}")]
    Query { path: String, message: String },

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    path: &'a str,
    args: Value,
    format: &'static str,
}

/// Envelope returned by `/api/query`. Convex reports function errors in the
/// body, sometimes alongside a non-2xx status.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum QueryResponse {
    Success {
        value: Value,
    },
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

/// Long-lived handle to a Convex deployment. Cheap to clone.
#[derive(Clone)]
pub struct ConvexClient {
    client: Client,
    base_url: String,
}

impl ConvexClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let base_url = base_url.into();
        info!("Convex client initialized ({base_url})");
        Ok(Self { client, base_url })
    }

    /// Runs a public query function such as `gigs:getAllGigsForAgent` and
    /// deserializes its return value.
    pub async fn query<T: DeserializeOwned>(&self, path: &str, args: Value) -> Result<T, FetchError> {
        let url = format!("{}/api/query", self.base_url);
        debug!("Convex query {path}");

        let response = self
            .client
            .post(&url)
            .json(&QueryRequest {
                path,
                args,
                format: "json",
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let envelope = match serde_json::from_str::<QueryResponse>(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    message: body,
                });
            }
            Err(e) => return Err(FetchError::Decode(e)),
        };

        match envelope {
            QueryResponse::Success { value } => Ok(serde_json::from_value(value)?),
            QueryResponse::Error { error_message } => Err(FetchError::Query {
                path: path.to_string(),
                message: error_message,
            }),
        }
    }
}
