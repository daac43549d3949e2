//! Persistence for sessions and finished checklists
//!
//! The orchestrator talks to an injected [`ChecklistStore`]; ownership
//! of the store lives with the caller, never in a process-wide global.
//! [`SqliteStore`] is the production implementation; tests use fakes.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{AnswerItem, EnrichedChecklistItem};

/// Persistence collaborator for one synthesis run. Both operations are
/// called at most once per synthesis.
#[async_trait]
pub trait ChecklistStore: Send + Sync {
    /// Attach the user's answers to their open intent session. Returns
    /// the session id, or `None` when no session matches the goal —
    /// a non-fatal condition for the caller.
    async fn save_answers(
        &self,
        goal: &str,
        selected_intent: &str,
        answers: &[AnswerItem],
        user_id: &str,
    ) -> Result<Option<String>>;

    /// Persist a finished checklist and return its durable identifier.
    async fn save_checklist(
        &self,
        title: &str,
        description: &str,
        category: &str,
        items: &[EnrichedChecklistItem],
        owner_id: &str,
    ) -> Result<String>;
}

/// Durable checklist id: `cl_{epoch_seconds}_{8 hex}`. Opaque to all
/// callers beyond uniqueness.
pub fn generate_checklist_id() -> String {
    let timestamp = Utc::now().timestamp();
    let random = Uuid::new_v4().simple().to_string();
    format!("cl_{}_{}", timestamp, &random[..8])
}

/// Session id: `sess_{epoch_seconds}_{6 alphanumeric}`.
pub fn generate_session_id() -> String {
    let timestamp = Utc::now().timestamp();
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("sess_{}_{}", timestamp, random)
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("failed to open database at {:?}", path.as_ref()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS intent_sessions (
                session_id TEXT PRIMARY KEY,
                goal TEXT NOT NULL,
                selected_intent TEXT,
                answers_json TEXT,
                user_id TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_goal ON intent_sessions(goal);

            CREATE TABLE IF NOT EXISTS checklists (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                category TEXT,
                progress REAL NOT NULL DEFAULT 0.0,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_checklists_user ON checklists(user_id);

            CREATE TABLE IF NOT EXISTS checklist_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                checklist_id TEXT NOT NULL REFERENCES checklists(id),
                text TEXT NOT NULL,
                description TEXT,
                is_completed INTEGER NOT NULL DEFAULT 0,
                sort_order INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_items_checklist ON checklist_items(checklist_id);
            "#,
        )?;
        debug!("store schema initialized");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("store connection poisoned"))
    }

    /// Seed an intent session, as the upstream intent-analysis flow
    /// would. Exposed for callers and tests that set up sessions.
    pub fn create_session(&self, goal: &str, user_id: &str) -> Result<String> {
        let session_id = generate_session_id();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO intent_sessions (session_id, goal, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, goal, user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(session_id)
    }

    /// Read back a checklist with its items in stored order. Intended
    /// for result retrieval and tests.
    pub fn load_checklist(&self, checklist_id: &str) -> Result<Option<StoredChecklist>> {
        let conn = self.lock()?;
        let header = conn
            .query_row(
                "SELECT title, description, category FROM checklists WHERE id = ?1",
                params![checklist_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((title, description, category)) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT text, description FROM checklist_items
             WHERE checklist_id = ?1 ORDER BY sort_order",
        )?;
        let items = stmt
            .query_map(params![checklist_id], |row| {
                Ok(EnrichedChecklistItem {
                    text: row.get(0)?,
                    description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(StoredChecklist {
            title,
            description: description.unwrap_or_default(),
            category: category.unwrap_or_default(),
            items,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct StoredChecklist {
    pub title: String,
    pub description: String,
    pub category: String,
    pub items: Vec<EnrichedChecklistItem>,
}

#[async_trait]
impl ChecklistStore for SqliteStore {
    async fn save_answers(
        &self,
        goal: &str,
        selected_intent: &str,
        answers: &[AnswerItem],
        _user_id: &str,
    ) -> Result<Option<String>> {
        let answers_json = serde_json::to_string(answers)?;
        let conn = self.lock()?;

        let session_id: Option<String> = conn
            .query_row(
                "SELECT session_id FROM intent_sessions
                 WHERE goal = ?1 ORDER BY created_at DESC LIMIT 1",
                params![goal],
                |row| row.get(0),
            )
            .optional()?;

        let Some(session_id) = session_id else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE intent_sessions SET selected_intent = ?1, answers_json = ?2
             WHERE session_id = ?3",
            params![selected_intent, answers_json, session_id],
        )?;
        debug!(session_id = %session_id, answers = answers.len(), "answers saved to session");
        Ok(Some(session_id))
    }

    async fn save_checklist(
        &self,
        title: &str,
        description: &str,
        category: &str,
        items: &[EnrichedChecklistItem],
        owner_id: &str,
    ) -> Result<String> {
        let checklist_id = generate_checklist_id();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO checklists (id, title, description, category, progress, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, 0.0, ?5, ?6)",
            params![
                checklist_id,
                title,
                description,
                category,
                owner_id,
                Utc::now().to_rfc3339()
            ],
        )?;

        for (order, item) in items.iter().enumerate() {
            tx.execute(
                "INSERT INTO checklist_items (checklist_id, text, description, is_completed, sort_order)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![checklist_id, item.text, item.description, order as i64],
            )?;
        }

        tx.commit()?;
        info!(checklist_id = %checklist_id, items = items.len(), "checklist persisted");
        Ok(checklist_id)
    }
}
