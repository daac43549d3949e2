//! Streaming integrity validation
//!
//! Forwards an in-progress generation stream to the caller while
//! accumulating it, then checks on completion that the accumulated text
//! forms a complete, schema-valid questions payload. Incomplete streams
//! trigger a non-streamed regeneration whose output is emitted as a
//! clearly delimited supplementary payload; if that also fails, a
//! structured error payload is emitted. The caller never ends up with
//! silently empty output.

use futures::stream::BoxStream;
use futures::StreamExt;
use genai_client::GenAiClient;
use serde_json::Value;
use tracing::{info, warn};

use crate::prompts;

/// Minimum plausible size for a complete questions payload.
const MIN_CONTENT_LENGTH: usize = 50;

/// Separates live stream output from recovered content.
pub const RECOVERY_DELIMITER: &str = "\n\n--- recovered questions ---\n";

/// Phases of one validated streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Streaming,
    Complete,
    Incomplete,
    Regenerating,
    Done,
}

/// Parameters needed to regenerate with the same semantics as the
/// original streamed request.
#[derive(Debug, Clone)]
pub struct RegenerationContext {
    pub goal: String,
    pub intent_title: String,
}

pub struct StreamValidator {
    client: GenAiClient,
}

impl StreamValidator {
    pub fn new(client: GenAiClient) -> Self {
        Self { client }
    }

    /// Stream chunks for `prompt`, validating the accumulated payload on
    /// completion. Every yielded item is caller-displayable text; error
    /// conditions surface as structured JSON payloads, not stream
    /// termination.
    pub fn stream_with_validation(
        &self,
        prompt: String,
        ctx: RegenerationContext,
    ) -> BoxStream<'static, String> {
        let client = self.client.clone();

        let stream = async_stream::stream! {
            let mut source = match client.call_streaming(&prompt).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "stream could not be opened, regenerating directly");
                    for chunk in recovery_payload(&client, &ctx).await {
                        yield chunk;
                    }
                    return;
                }
            };

            let mut state = StreamState::Streaming;
            let mut accumulated = String::new();
            let mut chunks = 0usize;

            loop {
                state = match state {
                    StreamState::Streaming => match source.next().await {
                        Some(Ok(chunk)) => {
                            chunks += 1;
                            accumulated.push_str(&chunk);
                            yield chunk;
                            StreamState::Streaming
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, chunks, chars = accumulated.len(), "stream failed mid-flight");
                            StreamState::Incomplete
                        }
                        None => {
                            info!(chunks, chars = accumulated.len(), "primary stream completed");
                            if validate_questions_payload(&accumulated) {
                                StreamState::Complete
                            } else {
                                StreamState::Incomplete
                            }
                        }
                    },
                    StreamState::Incomplete => {
                        warn!("incomplete stream payload detected, regenerating");
                        StreamState::Regenerating
                    }
                    StreamState::Regenerating => {
                        for chunk in recovery_payload(&client, &ctx).await {
                            yield chunk;
                        }
                        StreamState::Done
                    }
                    StreamState::Complete | StreamState::Done => break,
                };
            }
        };

        stream.boxed()
    }
}

/// Run the non-streamed regeneration and package its output (or a
/// structured error) as the chunks to emit after the primary stream.
async fn recovery_payload(client: &GenAiClient, ctx: &RegenerationContext) -> Vec<String> {
    let prompt = prompts::questions_generation_prompt(&ctx.goal, &ctx.intent_title);
    match client.call(&prompt).await {
        Ok(text) if !text.trim().is_empty() => {
            info!(chars = text.len(), "regenerated complete payload");
            vec![RECOVERY_DELIMITER.to_string(), text]
        }
        Ok(_) | Err(_) => {
            warn!("regeneration failed, emitting structured error payload");
            vec![
                r#"{"error": "question generation failed, please retry"}"#.to_string(),
            ]
        }
    }
}

/// Check the accumulated stream text against the questions schema
/// invariants: a non-empty `questions` array whose elements carry all
/// required fields, with choice options complete and untruncated.
pub fn validate_questions_payload(content: &str) -> bool {
    if content.trim().len() < MIN_CONTENT_LENGTH {
        warn!(chars = content.len(), "stream content too short to be complete");
        return false;
    }

    let clean = strip_markdown_fence(content);
    let Ok(parsed) = serde_json::from_str::<Value>(&clean) else {
        warn!("accumulated stream is not valid JSON");
        return false;
    };

    let Some(questions) = parsed.get("questions").and_then(Value::as_array) else {
        warn!("stream payload missing questions array");
        return false;
    };
    if questions.is_empty() {
        return false;
    }

    for (i, question) in questions.iter().enumerate() {
        for field in ["id", "text", "type", "options"] {
            if question.get(field).is_none() {
                warn!(question = i, field, "question missing required field");
                return false;
            }
        }

        if question.get("type").and_then(Value::as_str) == Some("multiple") {
            let Some(options) = question.get("options").and_then(Value::as_array) else {
                return false;
            };
            if options.is_empty() {
                return false;
            }
            for option in options {
                let text = option.get("text").and_then(Value::as_str).unwrap_or("");
                if text.is_empty() || !balanced_text(text) {
                    warn!(question = i, option = %text, "truncated or empty option text");
                    return false;
                }
            }
        }
    }

    true
}

/// Unbalanced parentheses or an odd quote count are a proxy for
/// mid-token truncation of streamed text.
fn balanced_text(text: &str) -> bool {
    let opens = text.matches('(').count();
    let closes = text.matches(')').count();
    let quotes = text.matches('"').count();
    opens == closes && quotes % 2 == 0
}

/// Strip a ```json fence (or fall back to the outermost braces) from
/// accumulated stream text.
pub fn strip_markdown_fence(content: &str) -> String {
    let content = content.trim();

    if let Some(start) = content.find("```json") {
        let body = &content[start + 7..];
        let end = body.rfind("```").unwrap_or(body.len());
        return body[..end].trim().to_string();
    }

    if let (Some(first), Some(last)) = (content.find('{'), content.rfind('}')) {
        if last > first {
            return content[first..=last].to_string();
        }
    }

    content.to_string()
}
