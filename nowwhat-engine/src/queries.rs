//! Search-query derivation from draft checklist items
//!
//! One query per non-empty item, produced by lightweight keyword-based
//! rewriting: arrow chains keep only their first step, generic trailing
//! qualifiers are dropped, action-verb items become "how to" queries,
//! and preparation items get a disambiguating "checklist" suffix.

use tracing::{debug, warn};

/// Leading verbs that read better as "how to ..." search queries.
const ACTION_VERBS: &[&str] = &[
    "book", "buy", "learn", "register", "check", "find", "install", "schedule", "arrange",
    "reserve", "research", "practice", "get", "set", "apply", "enroll",
];

/// Trailing qualifiers that add nothing to a search.
const GENERIC_SUFFIXES: &[&str] = &["today", "now", "soon", "first", "regularly"];

/// Derive search queries 1:1 from checklist items, skipping blanks.
pub fn derive_search_queries(items: &[String]) -> Vec<String> {
    let queries: Vec<String> = items
        .iter()
        .filter_map(|item| {
            let item = item.trim();
            if item.is_empty() {
                warn!("skipping blank checklist item during query derivation");
                return None;
            }
            Some(rewrite_query(item))
        })
        .collect();

    debug!(items = items.len(), queries = queries.len(), "derived search queries");
    queries
}

fn rewrite_query(item: &str) -> String {
    // Sequential items ("record practice → review mistakes") search best
    // on their first step alone.
    let mut query = item.split('→').next().unwrap_or(item).trim().to_string();

    for suffix in GENERIC_SUFFIXES {
        // Suffixes are ASCII, so compare case-insensitively on the
        // original string's own boundaries; lowercasing the whole query
        // can change byte lengths.
        if query.len() > suffix.len() {
            let split = query.len() - suffix.len();
            if query.is_char_boundary(split)
                && query[split..].eq_ignore_ascii_case(suffix)
                && query[..split].ends_with(' ')
            {
                query.truncate(split);
                query.truncate(query.trim_end().len());
            }
        }
    }
    let query = query.trim().to_string();

    let lowered = query.to_lowercase();
    let first_word = lowered.split_whitespace().next().unwrap_or("");

    if lowered.contains("prepare") || lowered.contains("preparation") {
        format!("{query} checklist")
    } else if ACTION_VERBS.contains(&first_word) {
        format!("how to {query}")
    } else {
        query
    }
}
