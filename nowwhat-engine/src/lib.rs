//! Checklist synthesis engine
//!
//! Converts a user goal, selected intent, and question answers into a
//! persisted, personalized checklist. The pipeline drafts items with a
//! generative engine, grounds each item through search-augmented calls
//! running in bounded parallel batches, merges the results with a
//! relevance matcher, and enforces size and uniqueness bounds before
//! saving. Every stage degrades rather than aborts: failed generation
//! falls back to intent templates, failed searches yield items without
//! descriptions, and only persistence failures surface as errors.
//!
//! Entry point is [`ChecklistOrchestrator::synthesize`]; the streamed
//! question-generation flow lives in [`streaming`].

pub mod config;
pub mod error;
pub mod matcher;
pub mod orchestrator;
pub mod prompts;
pub mod queries;
pub mod search;
pub mod store;
pub mod streaming;
pub mod types;

pub use config::EngineConfig;
pub use error::ChecklistGenerationError;
pub use orchestrator::ChecklistOrchestrator;
pub use search::SearchClient;
pub use store::{ChecklistStore, SqliteStore};
pub use streaming::{RegenerationContext, StreamValidator};
pub use types::{
    Answer, AnswerItem, ChecklistOutcome, EnrichedChecklistItem, GenerationRequest, SearchResult,
};
