//! Client for search-grounded generative text APIs
//!
//! Three invocation modes over one backend seam:
//!
//! - [`GenAiClient::call`] — single blocking generation
//! - [`GenAiClient::call_with_search`] — grounded structured output with
//!   three-tier degradation (grounded → structured → plain)
//! - [`GenAiClient::call_streaming`] — finite chunk stream
//!
//! The [`transport::GenerativeBackend`] trait isolates the wire protocol;
//! [`transport::HttpBackend`] implements it for a Gemini-style REST API,
//! and tests supply scripted doubles.

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::{search_response_schema, GenAiClient, BACKOFF_BASE_SECS, RETRY_ATTEMPTS};
pub use error::{EngineError, Result};
pub use transport::{GenerativeBackend, HttpBackend};
pub use types::{GenerateRequest, GenerateResponse, GenerationParams, SearchReply};
