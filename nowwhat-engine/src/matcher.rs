//! Relevance matching between checklist items and search content
//!
//! Heuristic best-effort matching, not semantic search: keywords are
//! extracted from each item, practical-tip fragments from each search
//! result, and a weighted keyword overlap score selects the best
//! fragment as the item's description. Helper failures degrade to an
//! empty description rather than propagating.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::types::{EnrichedChecklistItem, SearchResult};

const MAX_KEYWORDS: usize = 7;
const MAX_FRAGMENTS_PER_RESULT: usize = 4;
const MIN_FRAGMENT_LEN: usize = 15;
const MAX_FRAGMENT_LEN: usize = 180;
const MAX_DESCRIPTION_LEN: usize = 150;

/// Action/domain patterns extracted ahead of generic tokens.
static PRIORITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(learn|study|practice|train)\w*\b",
        r"(?i)\b(prepare|plan|book|apply|schedule)\w*\b",
        r"(?i)\b(buy|purchase|choose|decide|confirm)\w*\b",
        r"(?i)\b(language|english|japanese|chinese|spanish|french)\b",
        r"(?i)\b(textbook|app|course|class|lesson)\w*\b",
        r"(?i)\b(partner|tutor|group|team)\w*\b",
        r"(?i)\b(budget|cost|price|fee)\w*\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("priority pattern"))
    .collect()
});

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").expect("word pattern"));

static STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "to", "of", "in", "on", "at", "for", "with", "your", "you",
    "is", "are", "be", "this", "that", "all", "each", "every", "together", "through", "about",
    "make", "do", "it", "its",
];

/// Practical-tip cues: recommendation, requirement, booking, caution,
/// cost, and numeric-value signals.
static TIP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(recommend|suggest|advis)\w*\b",
        r"(?i)\b(need|require|prepare|confirm|check)\w*\b",
        r"(?i)\b(book|reserve|buy|apply|register)\w*\b",
        r"(?i)\b(method|way|tip|guide|how)\w*\b",
        r"(?i)\b(caution|careful|avoid|warning)\w*\b",
        r"(?i)\b(important|essential|key|must)\b",
        r"(?i)\b(choose|decide|consider|compare)\w*\b",
        r"(?i)\b(learn|study|practice)\w*\b",
        r"(?i)\b(free|discount|cheap|afford)\w*\b",
        r"(?i)(\$\d+|\d+\s?(dollars|won|yen|euros?)|budget|cost)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("tip pattern"))
    .collect()
});

static URL_CUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://|www\.|\.com|\.org").expect("url pattern"));
static DIGIT_CUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("digit pattern"));
static SENTENCE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+|[\n\r]+").expect("sentence split"));
static LEADING_CONNECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)(also|and|however|therefore|but|so),?\s+").expect("connective"));

/// Merge each item with the best-matching fragment from the successful
/// search results. Output length always equals input item length.
pub fn match_results_to_items(
    items: &[String],
    results: &[SearchResult],
) -> Vec<EnrichedChecklistItem> {
    let successful: Vec<&SearchResult> = results
        .iter()
        .filter(|r| r.success && !r.content.is_empty())
        .collect();

    if successful.is_empty() {
        warn!("no successful search results to match against");
        return items
            .iter()
            .map(|text| EnrichedChecklistItem {
                text: text.clone(),
                description: String::new(),
            })
            .collect();
    }

    // Candidate fragments pooled across results, first-seen order kept
    // so score ties resolve deterministically.
    let fragments: Vec<String> = successful
        .iter()
        .flat_map(|r| extract_fragments(&flatten_content(&r.content)))
        .collect();

    debug!(
        items = items.len(),
        results = successful.len(),
        fragments = fragments.len(),
        "matching search fragments to items"
    );

    let enriched: Vec<EnrichedChecklistItem> = items
        .iter()
        .map(|text| EnrichedChecklistItem {
            text: text.clone(),
            description: best_description(text, &fragments),
        })
        .collect();

    let described = enriched.iter().filter(|i| !i.description.is_empty()).count();
    info!(described, total = enriched.len(), "relevance matching complete");
    enriched
}

/// Extract up to 7 keywords: priority pattern matches first, then
/// generic alphanumeric tokens longer than one character, stop-words
/// excluded, order preserved, duplicates removed.
pub fn extract_keywords(item: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    for pattern in PRIORITY_PATTERNS.iter() {
        for m in pattern.find_iter(item) {
            let word = m.as_str().to_lowercase();
            if !keywords.contains(&word) {
                keywords.push(word);
            }
        }
    }

    for m in WORD.find_iter(item) {
        let word = m.as_str().to_lowercase();
        if word.len() > 1 && !STOPWORDS.contains(&word.as_str()) && !keywords.contains(&word) {
            keywords.push(word);
        }
    }

    keywords.truncate(MAX_KEYWORDS);
    keywords
}

/// Split content into sentence-like candidate fragments, score each
/// against the practical-tip cue set, and keep the top 4 with score ≥ 1.
pub fn extract_fragments(content: &str) -> Vec<String> {
    let normalized = content.replace("\\n", "\n");
    let mut scored: Vec<(String, u32)> = Vec::new();

    for raw in SENTENCE_SPLIT.split(&normalized) {
        let sentence = raw.trim();
        if sentence.len() < MIN_FRAGMENT_LEN || sentence.len() > MAX_FRAGMENT_LEN {
            continue;
        }

        let mut score: u32 = TIP_PATTERNS
            .iter()
            .filter(|p| p.is_match(sentence))
            .count() as u32;
        if URL_CUE.is_match(sentence) {
            score += 2;
        }
        if DIGIT_CUE.is_match(sentence) {
            score += 1;
        }

        if score >= 1 {
            if let Some(cleaned) = clean_fragment(sentence) {
                scored.push((cleaned, score));
            }
        }
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(MAX_FRAGMENTS_PER_RESULT);
    scored.into_iter().map(|(s, _)| s).collect()
}

fn clean_fragment(sentence: &str) -> Option<String> {
    let cleaned = LEADING_CONNECTIVE.replace(sentence, "").trim().to_string();
    if cleaned.len() < 10 {
        return None;
    }

    let mut chars = cleaned.chars();
    let first = chars.next()?;
    if first.is_lowercase() {
        Some(first.to_uppercase().collect::<String>() + chars.as_str())
    } else {
        Some(cleaned)
    }
}

/// Weighted keyword-overlap relevance, normalized to [0, 1].
///
/// Per matched keyword: position decay (earlier keywords weigh more) ×
/// capped length weight × boundary weight (whole-word matches score
/// 1.5× a substring match), summed and divided by the maximum
/// attainable score for the keyword set.
pub fn relevance_score(keywords: &[String], fragment: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }

    let fragment_lower = fragment.to_lowercase();
    let mut score = 0.0;

    for (i, keyword) in keywords.iter().enumerate() {
        let keyword_lower = keyword.to_lowercase();
        if !fragment_lower.contains(&keyword_lower) {
            continue;
        }

        let position_weight = 1.0 - (i as f64 * 0.1);
        let length_weight = (keyword.len() as f64 / 5.0).min(2.0);
        let boundary_weight = match Regex::new(&format!(r"\b{}\b", regex::escape(&keyword_lower))) {
            Ok(re) if re.is_match(&fragment_lower) => 1.5,
            _ => 1.0,
        };

        score += position_weight * length_weight * boundary_weight;
    }

    let max_score: f64 = keywords
        .iter()
        .map(|kw| 1.0 * (kw.len() as f64 / 5.0).min(2.0) * 1.5)
        .sum();

    if max_score > 0.0 {
        (score / max_score).min(1.0)
    } else {
        0.0
    }
}

/// Pick the highest-scoring fragment for one item; ties go to the
/// first-seen fragment. Result is truncated to the display cap.
fn best_description(item: &str, fragments: &[String]) -> String {
    let keywords = extract_keywords(item);
    if keywords.is_empty() {
        return String::new();
    }

    let mut best = "";
    let mut best_score = 0.0;
    for fragment in fragments {
        if fragment.len() <= 20 {
            continue;
        }
        let score = relevance_score(&keywords, fragment);
        if score > best_score {
            best_score = score;
            best = fragment;
        }
    }

    truncate_description(best)
}

fn truncate_description(text: &str) -> String {
    if text.chars().count() <= MAX_DESCRIPTION_LEN {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_DESCRIPTION_LEN - 3).collect();
    format!("{truncated}...")
}

/// Flatten structured search content into plain text for fragment
/// extraction. Unparseable content passes through untouched.
fn flatten_content(content: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(content) else {
        return content.to_string();
    };
    let Value::Object(map) = value else {
        return content.to_string();
    };

    let mut parts: Vec<String> = Vec::new();
    for field in ["steps", "tips"] {
        if let Some(entries) = map.get(field).and_then(Value::as_array) {
            parts.extend(
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string),
            );
        }
    }
    if let Some(price) = map.get("price").and_then(Value::as_str) {
        parts.push(format!("Typical cost: {price}"));
    }
    if let Some(links) = map.get("links").and_then(Value::as_array) {
        for link in links {
            if let (Some(title), Some(url)) = (
                link.get("title").and_then(Value::as_str),
                link.get("url").and_then(Value::as_str),
            ) {
                parts.push(format!("{title}: {url}"));
            }
        }
    }

    if parts.is_empty() {
        content.to_string()
    } else {
        parts.join("\n")
    }
}
