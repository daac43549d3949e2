//! Data model for one synthesis run
//!
//! All of these are created and discarded within a single orchestration
//! call; nothing is mutated after creation. Only the persisted checklist
//! outlives the run, via the store.

use serde::{Deserialize, Serialize};

/// A single answered question from the interactive flow.
///
/// Multi-select answers arrive as a list and are joined with ", " when
/// formatted for prompts or summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerItem {
    #[serde(rename = "questionIndex")]
    pub question_index: u32,
    #[serde(rename = "questionText")]
    pub question_text: String,
    pub answer: Answer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Multi(Vec<String>),
}

impl Answer {
    pub fn joined(&self) -> String {
        match self {
            Answer::Text(s) => s.clone(),
            Answer::Multi(parts) => parts.join(", "),
        }
    }
}

/// Immutable input to the pipeline, one per end-user submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub goal: String,
    #[serde(rename = "selectedIntent")]
    pub selected_intent: String,
    pub answers: Vec<AnswerItem>,
}

/// One search outcome. Failed searches carry no usable content but are
/// always present so result counts stay aligned with query counts.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub query: String,
    /// Raw or JSON-encoded structured payload.
    pub content: String,
    pub sources: Vec<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl SearchResult {
    pub fn failure(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            content: String::new(),
            sources: Vec::new(),
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// A draft item merged with its best-matching search fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedChecklistItem {
    pub text: String,
    /// Length-capped grounded detail; empty when no fragment matched.
    pub description: String,
}

/// What the caller gets back from a successful synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistOutcome {
    #[serde(rename = "checklistId")]
    pub checklist_id: String,
    #[serde(rename = "redirectUrl")]
    pub redirect_url: String,
}

/// Format answers for embedding in a generation prompt.
pub fn format_answers_for_prompt(answers: &[AnswerItem]) -> String {
    answers
        .iter()
        .map(|a| format!("Q: {} → A: {}", a.question_text, a.answer.joined()))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Format answers as a bulleted summary for the stored description.
pub fn format_answers_for_description(answers: &[AnswerItem]) -> String {
    answers
        .iter()
        .map(|a| format!("• {}: {}", a.question_text, a.answer.joined()))
        .collect::<Vec<_>>()
        .join("\n")
}
