//! Request/response types shared by backends and the client

use serde::{Deserialize, Serialize};

/// Generation parameters sent with every request.
///
/// Defaults favor creative-but-consistent phrasing for checklist and
/// question drafting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
    pub temperature: f32,
    #[serde(rename = "topP")]
    pub top_p: f32,
    #[serde(rename = "topK")]
    pub top_k: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_output_tokens: 20480,
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
        }
    }
}

/// A single generation request, covering plain, schema-constrained, and
/// search-grounded invocation modes.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub params: GenerationParams,
    /// JSON schema for structured output, when the caller needs a
    /// machine-parseable reply.
    pub response_schema: Option<serde_json::Value>,
    /// Whether to augment generation with web-search grounding.
    pub grounding: bool,
}

impl GenerateRequest {
    pub fn plain(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            params: GenerationParams::default(),
            response_schema: None,
            grounding: false,
        }
    }

    pub fn structured(prompt: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            prompt: prompt.into(),
            params: GenerationParams::default(),
            response_schema: Some(schema),
            grounding: false,
        }
    }

    pub fn grounded(prompt: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            prompt: prompt.into(),
            params: GenerationParams::default(),
            response_schema: Some(schema),
            grounding: true,
        }
    }
}

/// A completed generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub text: String,
    /// Citation URLs when the reply was search-grounded; empty otherwise.
    pub sources: Vec<String>,
}

/// Reply from the search-augmented call path.
///
/// `grounded` distinguishes a live-search reply from one produced by the
/// degraded (non-grounded) fallback tiers.
#[derive(Debug, Clone)]
pub struct SearchReply {
    pub text: String,
    pub sources: Vec<String>,
    pub grounded: bool,
}
