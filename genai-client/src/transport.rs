//! Backend transport for the generative engine
//!
//! `GenerativeBackend` is the seam between the client's call semantics
//! (retry, degradation, streaming validation) and the wire protocol.
//! `HttpBackend` talks to a Gemini-style REST API; tests substitute
//! scripted doubles.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::types::{GenerateRequest, GenerateResponse};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// A transport capable of executing generation requests.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Execute one blocking generation request.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Execute a streaming generation request. The stream is finite and
    /// not restartable; chunks are yielded as they arrive.
    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<BoxStream<'static, Result<String>>>;
}

/// HTTP backend for a Gemini-style generative API.
pub struct HttpBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl HttpBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/{}:{}?key={}",
            API_BASE, self.model, method, self.api_key
        )
    }

    fn build_body(&self, request: &GenerateRequest) -> Value {
        let mut generation_config = serde_json::to_value(&request.params)
            .unwrap_or_else(|_| json!({}));

        if let Some(schema) = &request.response_schema {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = schema.clone();
        }

        let mut body = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": generation_config,
        });

        if request.grounding {
            body["tools"] = json!([{ "googleSearch": {} }]);
        }

        body
    }

    /// Pull text out of a response payload. The API surfaces text either
    /// at the first candidate's parts or not at all.
    fn extract_text(value: &Value) -> Result<String> {
        let mut text = String::new();
        if let Some(candidates) = value.get("candidates").and_then(Value::as_array) {
            for candidate in candidates {
                if let Some(parts) = candidate
                    .pointer("/content/parts")
                    .and_then(Value::as_array)
                {
                    for part in parts {
                        if let Some(t) = part.get("text").and_then(Value::as_str) {
                            text.push_str(t);
                        }
                    }
                }
                if !text.is_empty() {
                    break;
                }
            }
        }

        if text.trim().is_empty() {
            return Err(EngineError::EmptyResponse);
        }
        Ok(text)
    }

    /// Collect citation URLs from grounding metadata, when present.
    fn extract_sources(value: &Value) -> Vec<String> {
        let mut sources = Vec::new();
        if let Some(candidates) = value.get("candidates").and_then(Value::as_array) {
            for candidate in candidates {
                if let Some(chunks) = candidate
                    .pointer("/groundingMetadata/groundingChunks")
                    .and_then(Value::as_array)
                {
                    for chunk in chunks {
                        if let Some(uri) = chunk.pointer("/web/uri").and_then(Value::as_str) {
                            sources.push(uri.to_string());
                        }
                    }
                }
            }
        }
        sources
    }

    fn map_status(status: reqwest::StatusCode, body: String) -> EngineError {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            EngineError::Auth(format!("{}: {}", status, body))
        } else {
            EngineError::Api(format!("{}: {}", status, body))
        }
    }
}

#[async_trait]
impl GenerativeBackend for HttpBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        debug!(prompt_len = request.prompt.len(), grounding = request.grounding, "engine request");

        let response = self
            .http
            .post(self.endpoint("generateContent"))
            .json(&self.build_body(&request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout
                } else {
                    EngineError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EngineError::Api(format!("invalid response body: {e}")))?;

        let text = Self::extract_text(&payload)?;
        let sources = Self::extract_sources(&payload);
        debug!(response_len = text.len(), sources = sources.len(), "engine response");

        Ok(GenerateResponse { text, sources })
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let response = self
            .http
            .post(self.endpoint("streamGenerateContent") + "&alt=sse")
            .json(&self.build_body(&request))
            .send()
            .await
            .map_err(|e| EngineError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, body));
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut chunks = 0usize;
            let mut chars = 0usize;
            let mut buffer = String::new();

            while let Some(piece) = bytes.next().await {
                match piece {
                    Ok(piece) => {
                        buffer.push_str(&String::from_utf8_lossy(&piece));
                        // SSE frames are newline-delimited `data: {...}` lines.
                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim().to_string();
                            buffer.drain(..=pos);
                            let Some(data) = line.strip_prefix("data:") else {
                                continue;
                            };
                            let data = data.trim();
                            if data.is_empty() || data == "[DONE]" {
                                continue;
                            }
                            match serde_json::from_str::<Value>(data) {
                                Ok(value) => {
                                    if let Ok(text) = Self::extract_text(&value) {
                                        chunks += 1;
                                        chars += text.len();
                                        yield Ok(text);
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "skipping unparseable stream frame");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(EngineError::Stream {
                            chunks,
                            chars,
                            message: e.to_string(),
                        });
                        return;
                    }
                }
            }
            debug!(chunks, chars, "stream completed");
        };

        Ok(stream.boxed())
    }
}
