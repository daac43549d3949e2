//! Search execution and parallel orchestration
//!
//! `SearchClient` wraps a single search-augmented engine call and
//! normalizes its reply into a [`SearchResult`]. `parallel_search` fans
//! queries out under the concurrency ceiling: batches of ceiling size
//! run concurrently, batches themselves run sequentially, and every
//! per-query failure becomes a `success=false` result so output stays
//! positionally aligned with input.

use std::time::Duration;

use futures::future::join_all;
use genai_client::GenAiClient;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::prompts;
use crate::types::SearchResult;

pub struct SearchClient {
    /// `None` when the provider is unavailable (missing credentials);
    /// every search then short-circuits to a failed result.
    client: Option<GenAiClient>,
    config: EngineConfig,
}

impl SearchClient {
    pub fn new(client: GenAiClient, config: EngineConfig) -> Self {
        Self {
            client: Some(client),
            config,
        }
    }

    /// A client with no usable provider. Issues no network calls.
    pub fn disabled(config: EngineConfig) -> Self {
        Self {
            client: None,
            config,
        }
    }

    /// Execute all queries, preserving input order in the output.
    pub async fn parallel_search(&self, queries: &[String]) -> Vec<SearchResult> {
        if queries.is_empty() {
            warn!("parallel_search called with no queries");
            return Vec::new();
        }

        let Some(client) = &self.client else {
            warn!(queries = queries.len(), "search provider unavailable, failing all queries");
            return queries
                .iter()
                .map(|q| SearchResult::failure(q, "search provider unavailable"))
                .collect();
        };

        let batch_size = self.config.max_concurrent_searches.max(1);
        info!(
            queries = queries.len(),
            batch_size, "starting parallel search"
        );

        let mut results = Vec::with_capacity(queries.len());
        for (batch_idx, batch) in queries.chunks(batch_size).enumerate() {
            debug!(batch = batch_idx + 1, size = batch.len(), "executing search batch");
            let futures = batch
                .iter()
                .map(|query| self.search_one(client, query));
            results.extend(join_all(futures).await);
        }

        self.log_summary(&results);
        results
    }

    async fn search_one(&self, client: &GenAiClient, query: &str) -> SearchResult {
        let started = std::time::Instant::now();
        let prompt = prompts::search_prompt(query);
        let deadline = Duration::from_secs(self.config.search_timeout_secs);

        match tokio::time::timeout(deadline, client.call_with_search(&prompt)).await {
            Ok(Ok(reply)) => {
                let elapsed = started.elapsed().as_millis();
                debug!(query, elapsed_ms = elapsed, grounded = reply.grounded, "search completed");
                parse_search_reply(query, &reply.text, reply.sources)
            }
            Ok(Err(e)) => {
                warn!(query, error = %e, elapsed_ms = started.elapsed().as_millis(), "search failed");
                SearchResult::failure(query, e.to_string())
            }
            Err(_) => {
                warn!(query, timeout_secs = self.config.search_timeout_secs, "search timed out");
                SearchResult::failure(
                    query,
                    format!("timed out after {}s", self.config.search_timeout_secs),
                )
            }
        }
    }

    fn log_summary(&self, results: &[SearchResult]) {
        let success = results.iter().filter(|r| r.success).count();
        let failed = results.len() - success;
        let rate = success as f64 / results.len().max(1) as f64 * 100.0;

        let lengths: Vec<usize> = results
            .iter()
            .filter(|r| r.success && !r.content.is_empty())
            .map(|r| r.content.len())
            .collect();

        if lengths.is_empty() {
            info!(success, failed, success_rate = format!("{rate:.1}%"), "search summary");
            if success == 0 {
                warn!("all searches failed; no descriptions will be generated");
            }
            return;
        }

        let avg = lengths.iter().sum::<usize>() / lengths.len();
        let min = lengths.iter().min().copied().unwrap_or(0);
        let max = lengths.iter().max().copied().unwrap_or(0);
        info!(
            success,
            failed,
            success_rate = format!("{rate:.1}%"),
            avg_content_len = avg,
            min_content_len = min,
            max_content_len = max,
            "search summary"
        );
    }
}

/// Normalize an engine search reply into a result.
///
/// Structured replies have their link URLs folded into `sources` and are
/// re-encoded canonically. Unparseable replies are wrapped as a tips
/// payload — raw grounded text is still usable by the matcher, so this
/// stays a success.
fn parse_search_reply(query: &str, text: &str, mut sources: Vec<String>) -> SearchResult {
    let content = text.trim();
    if content.is_empty() {
        return SearchResult::failure(query, "empty search response");
    }

    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => {
            if let Some(links) = map.get("links").and_then(Value::as_array) {
                for link in links {
                    let url = link
                        .get("url")
                        .and_then(Value::as_str)
                        .or_else(|| link.as_str());
                    if let Some(url) = url {
                        if !sources.iter().any(|s| s == url) {
                            sources.push(url.to_string());
                        }
                    }
                }
            }
            SearchResult {
                query: query.to_string(),
                content: Value::Object(map).to_string(),
                sources,
                success: true,
                error_message: None,
            }
        }
        _ => {
            debug!(query, "search reply is not structured JSON, wrapping raw content");
            let wrapped = serde_json::json!({
                "steps": [content],
                "contacts": [],
                "links": [],
            });
            SearchResult {
                query: query.to_string(),
                content: wrapped.to_string(),
                sources,
                success: true,
                error_message: None,
            }
        }
    }
}
