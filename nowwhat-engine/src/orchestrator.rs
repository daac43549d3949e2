//! Top-level checklist synthesis coordination
//!
//! Runs the full pipeline for one submission: persist answers, draft
//! items with the generative engine (falling back to intent templates),
//! ground every item through parallel search, merge via the relevance
//! matcher, enforce bounds, and persist the result. Collaborator errors
//! never escape this boundary untranslated.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use genai_client::GenAiClient;

use crate::config::EngineConfig;
use crate::error::{ChecklistGenerationError, Result};
use crate::matcher;
use crate::prompts;
use crate::queries::derive_search_queries;
use crate::search::SearchClient;
use crate::store::ChecklistStore;
use crate::types::{
    format_answers_for_description, format_answers_for_prompt, ChecklistOutcome,
    EnrichedChecklistItem, GenerationRequest,
};

/// Minimum length for a parsed draft line to count as an item.
const MIN_ITEM_LEN: usize = 5;

/// Leading numbering, bullets, and checkbox glyphs stripped from draft
/// lines before they become items.
static LINE_PREFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d+\.?\s*",
        r"^[-*•]\s*",
        r"^\[[ xX]?\]\s*",
        r"^□\s*",
        r"^✓\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("line prefix pattern"))
    .collect()
});

pub struct ChecklistOrchestrator<S: ChecklistStore> {
    client: GenAiClient,
    search: SearchClient,
    store: S,
    config: EngineConfig,
}

impl<S: ChecklistStore> ChecklistOrchestrator<S> {
    pub fn new(client: GenAiClient, search: SearchClient, store: S, config: EngineConfig) -> Self {
        Self {
            client,
            search,
            store,
            config,
        }
    }

    /// Run one full synthesis. Returns the durable checklist id and the
    /// caller-facing redirect reference.
    pub async fn synthesize(
        &self,
        request: &GenerationRequest,
        user_id: &str,
    ) -> Result<ChecklistOutcome> {
        info!(goal = %request.goal, intent = %request.selected_intent, user_id, "starting checklist synthesis");

        // Answers are saved before any paid engine call is made.
        match self
            .store
            .save_answers(&request.goal, &request.selected_intent, &request.answers, user_id)
            .await
        {
            Ok(Some(session_id)) => {
                info!(session_id = %session_id, answers = request.answers.len(), "answers saved")
            }
            Ok(None) => warn!(goal = %request.goal, "no matching session for goal"),
            Err(e) => {
                return Err(ChecklistGenerationError::AnswerPersistence(e.to_string()));
            }
        }

        let items = self.generate_enhanced_checklist(request).await;
        if items.is_empty() {
            return Err(ChecklistGenerationError::Generation(
                "no usable checklist items produced".into(),
            ));
        }

        let title = format!("{}: {}", request.selected_intent, request.goal);
        let description = format!(
            "Personalized checklist for the goal '{}'\n\nAnswer summary:\n{}",
            request.goal,
            format_answers_for_description(&request.answers)
        );

        let checklist_id = self
            .store
            .save_checklist(
                &title,
                &description,
                &request.selected_intent,
                &items,
                user_id,
            )
            .await
            .map_err(|e| ChecklistGenerationError::ChecklistPersistence(e.to_string()))?;

        info!(checklist_id = %checklist_id, items = items.len(), "checklist synthesis complete");

        Ok(ChecklistOutcome {
            redirect_url: format!("/result/{checklist_id}"),
            checklist_id,
        })
    }

    /// Draft, ground, merge, and bound the item list. This stage never
    /// fails outright: total generation failure degrades to the intent
    /// fallback template with empty descriptions.
    async fn generate_enhanced_checklist(
        &self,
        request: &GenerationRequest,
    ) -> Vec<EnrichedChecklistItem> {
        let draft = self.generate_draft(request).await;

        // Queries derive from the final draft list; search overlaps
        // within each batch rather than racing draft generation.
        let queries = derive_search_queries(&draft);
        let results = self.search.parallel_search(&queries).await;

        let enriched = matcher::match_results_to_items(&draft, &results);
        self.validate_and_adjust(enriched)
    }

    async fn generate_draft(&self, request: &GenerationRequest) -> Vec<String> {
        let prompt = prompts::checklist_generation_prompt(
            &request.goal,
            &request.selected_intent,
            &format_answers_for_prompt(&request.answers),
            self.config.min_checklist_items,
            self.config.max_checklist_items,
        );

        match self
            .client
            .call_with_retry(&prompt, self.config.retry_attempts)
            .await
        {
            Ok(response) => {
                let items = parse_checklist_response(&response);
                if items.is_empty() {
                    warn!("draft generation produced no parseable items, using fallback template");
                    prompts::fallback_checklist(&request.selected_intent)
                } else {
                    info!(items = items.len(), "draft checklist generated");
                    items
                }
            }
            Err(e) => {
                warn!(error = %e, "draft generation exhausted retries, using fallback template");
                prompts::fallback_checklist(&request.selected_intent)
            }
        }
    }

    /// Dedupe case-insensitively, pad up to the minimum with filler
    /// items (never duplicating existing text), truncate to the maximum
    /// preserving generation order.
    fn validate_and_adjust(
        &self,
        items: Vec<EnrichedChecklistItem>,
    ) -> Vec<EnrichedChecklistItem> {
        let mut unique: Vec<EnrichedChecklistItem> = Vec::new();
        let mut seen: Vec<String> = Vec::new();

        for item in items {
            let text = item.text.trim();
            let key = text.to_lowercase();
            if text.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);
            unique.push(EnrichedChecklistItem {
                text: text.to_string(),
                description: item.description,
            });
        }

        if unique.len() < self.config.min_checklist_items {
            warn!(
                count = unique.len(),
                min = self.config.min_checklist_items,
                "padding checklist with default items"
            );
            for filler in prompts::padding_items() {
                if unique.len() >= self.config.min_checklist_items {
                    break;
                }
                let key = filler.to_lowercase();
                if seen.contains(&key) {
                    continue;
                }
                seen.push(key);
                unique.push(EnrichedChecklistItem {
                    text: filler,
                    description: String::new(),
                });
            }
        } else if unique.len() > self.config.max_checklist_items {
            info!(
                count = unique.len(),
                max = self.config.max_checklist_items,
                "truncating checklist to maximum"
            );
            unique.truncate(self.config.max_checklist_items);
        }

        unique
    }
}

/// Parse a newline-delimited draft response into cleaned items.
pub fn parse_checklist_response(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| {
            let cleaned = clean_checklist_item(line);
            (cleaned.len() > MIN_ITEM_LEN).then_some(cleaned)
        })
        .collect()
}

fn clean_checklist_item(line: &str) -> String {
    let mut item = line.trim().to_string();
    for pattern in LINE_PREFIXES.iter() {
        item = pattern.replace(&item, "").to_string();
    }
    item.trim().to_string()
}
