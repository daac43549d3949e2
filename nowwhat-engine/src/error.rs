//! Domain-level errors for the synthesis pipeline

use thiserror::Error;

/// Raised when every fallback strategy for a pipeline stage is
/// exhausted. Collaborator-specific errors are translated into this at
/// the orchestrator boundary and never escape it.
#[derive(Debug, Error)]
pub enum ChecklistGenerationError {
    #[error("failed to save answers: {0}")]
    AnswerPersistence(String),

    #[error("failed to save checklist: {0}")]
    ChecklistPersistence(String),

    #[error("checklist generation failed: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, ChecklistGenerationError>;
