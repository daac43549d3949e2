//! High-level generative engine client
//!
//! Wraps a [`GenerativeBackend`] with the call semantics the pipeline
//! relies on: plain calls, retrying calls with exponential backoff, a
//! three-tier degrading search call, and chunked streaming.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::transport::GenerativeBackend;
use crate::types::{GenerateRequest, SearchReply};

/// Default number of attempts for retrying call paths.
pub const RETRY_ATTEMPTS: u32 = 3;
/// Exponential backoff base between attempts, in seconds.
pub const BACKOFF_BASE_SECS: u64 = 2;

/// Client for the generative-text engine.
#[derive(Clone)]
pub struct GenAiClient {
    backend: Arc<dyn GenerativeBackend>,
}

impl GenAiClient {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    /// One blocking generation request with fixed parameters.
    ///
    /// Fails with [`EngineError::EmptyResponse`] when no text can be
    /// extracted from any known response shape.
    pub async fn call(&self, prompt: &str) -> Result<String> {
        let response = self.backend.generate(GenerateRequest::plain(prompt)).await?;
        if response.text.trim().is_empty() {
            return Err(EngineError::EmptyResponse);
        }
        Ok(response.text)
    }

    /// [`Self::call`] with retry: up to `attempts` tries, exponential
    /// backoff of `BACKOFF_BASE_SECS^attempt` between them. Schema and
    /// auth errors are not retried since they recur for the same prompt.
    pub async fn call_with_retry(&self, prompt: &str, attempts: u32) -> Result<String> {
        let mut last_err = EngineError::EmptyResponse;
        for attempt in 0..attempts {
            match self.call(prompt).await {
                Ok(text) => {
                    info!(attempt = attempt + 1, response_len = text.len(), "generation succeeded");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "generation attempt failed");
                    let retryable = e.is_retryable();
                    last_err = e;
                    if !retryable {
                        break;
                    }
                    if attempt + 1 < attempts {
                        let wait = BACKOFF_BASE_SECS.pow(attempt + 1);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    /// Search-augmented call with three-tier degradation:
    ///
    /// 1. grounded + structured-output schema,
    /// 2. non-grounded with the same schema,
    /// 3. plain [`Self::call`].
    ///
    /// A raw grounding failure never reaches the caller; the reply's
    /// `grounded` flag records which tier produced it.
    pub async fn call_with_search(&self, prompt: &str) -> Result<SearchReply> {
        let schema = search_response_schema();

        match self
            .backend
            .generate(GenerateRequest::grounded(prompt, schema.clone()))
            .await
        {
            Ok(response) if !response.text.trim().is_empty() => {
                return Ok(SearchReply {
                    text: response.text,
                    sources: response.sources,
                    grounded: true,
                });
            }
            Ok(_) => warn!("grounded call returned empty text, degrading"),
            Err(e) => warn!(error = %e, "grounded call failed, degrading to structured"),
        }

        match self
            .backend
            .generate(GenerateRequest::structured(prompt, schema))
            .await
        {
            Ok(response) if !response.text.trim().is_empty() => {
                return Ok(SearchReply {
                    text: response.text,
                    sources: response.sources,
                    grounded: false,
                });
            }
            Ok(_) => warn!("structured call returned empty text, degrading"),
            Err(e) => warn!(error = %e, "structured call failed, degrading to plain"),
        }

        let text = self.call(prompt).await?;
        Ok(SearchReply {
            text,
            sources: Vec::new(),
            grounded: false,
        })
    }

    /// Incrementally-streamed generation. Chunks arrive as the engine
    /// produces them; the stream is finite and not restartable.
    pub async fn call_streaming(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        self.backend
            .generate_stream(GenerateRequest::plain(prompt))
            .await
    }
}

/// Structured-output schema for search replies: actionable steps plus
/// contact, link, and price details.
pub fn search_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "steps": { "type": "array", "items": { "type": "string" } },
            "contacts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "phone": { "type": "string" },
                        "email": { "type": "string" }
                    },
                    "required": ["name"]
                }
            },
            "links": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "url": { "type": "string" }
                    },
                    "required": ["title", "url"]
                }
            },
            "price": { "type": "string" }
        },
        "required": ["steps", "contacts", "links"]
    })
}
