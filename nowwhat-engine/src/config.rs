//! Engine configuration
//!
//! Defaults mirror the provider rate limits and product bounds; every
//! field can be overridden from the environment (a `.env` file is
//! honored when present).

use tracing::warn;

/// Tunable limits for the synthesis pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrency ceiling for outstanding search calls.
    pub max_concurrent_searches: usize,
    /// Per-search deadline, in seconds.
    pub search_timeout_secs: u64,
    /// Lower bound on final checklist size.
    pub min_checklist_items: usize,
    /// Upper bound on final checklist size.
    pub max_checklist_items: usize,
    /// Attempts for the draft-generation call.
    pub retry_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 15,
            search_timeout_secs: 15,
            min_checklist_items: 8,
            max_checklist_items: 15,
            retry_attempts: 3,
        }
    }
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        let defaults = Self::default();
        Self {
            max_concurrent_searches: env_parse(
                "MAX_CONCURRENT_SEARCHES",
                defaults.max_concurrent_searches,
            ),
            search_timeout_secs: env_parse("SEARCH_TIMEOUT_SECONDS", defaults.search_timeout_secs),
            min_checklist_items: env_parse("MIN_CHECKLIST_ITEMS", defaults.min_checklist_items),
            max_checklist_items: env_parse("MAX_CHECKLIST_ITEMS", defaults.max_checklist_items),
            retry_attempts: env_parse("RETRY_ATTEMPTS", defaults.retry_attempts),
        }
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparseable config value, using default");
            default
        }),
        Err(_) => default,
    }
}
