//! Prompt templates and fallback checklists
//!
//! Prompt text is treated as opaque by the rest of the pipeline; only
//! the parameters embedded here matter to callers.

/// Prompt for drafting checklist items from goal, intent, and answers.
/// The engine is asked for newline-delimited imperative items.
pub fn checklist_generation_prompt(
    goal: &str,
    intent_title: &str,
    answer_context: &str,
    min_items: usize,
    max_items: usize,
) -> String {
    format!(
        r#"You are a personalized checklist generation expert. You create specific, actionable checklists that help users achieve their goals.

User Information:
- Goal: "{goal}"
- Selected Intent: "{intent_title}"
- Answers: {answer_context}

Each checklist item must be:
1. Immediately actionable — a concrete action that can be started today
2. Clearly completable — markable as done/not done
3. In logical order — natural progression from preparation to review

Requirements:
- {min_items} to {max_items} items total
- Each item 15-40 characters, starting with an action verb
- Reflect the user's answers wherever possible

Output one checklist item per line, with no numbering, bullets, or extra commentary."#
    )
}

/// Prompt for grounding one checklist item with real-world detail.
pub fn search_prompt(query: &str) -> String {
    format!(
        r#"Search for current, practical information about: "{query}"

Return a JSON object with:
- "steps": 2-4 short actionable tips with concrete details (names, numbers, prices where relevant)
- "contacts": relevant organizations or services, each with name and phone/email if known
- "links": useful web pages, each with title and url
- "price": typical cost as a short string, if applicable

Prefer recent, region-relevant information. Respond with JSON only."#
    )
}

/// Prompt for the interactive question-generation flow (streamed).
pub fn questions_generation_prompt(goal: &str, intent_title: &str) -> String {
    format!(
        r#"Generate 3-5 clarifying questions that personalize a plan for this user.

- Goal: "{goal}"
- Selected Intent: "{intent_title}"

Each question needs an id, text, a type ("multiple" or "text"), and for
multiple-choice questions 3-5 options with short distinct texts.

Respond with a JSON object: {{"questions": [{{"id": "...", "text": "...", "type": "...", "options": [{{"text": "..."}}]}}]}}"#
    )
}

/// Intent-keyed fallback checklists for when draft generation fails on
/// every retry. Unknown intents get the generic planning template.
pub fn fallback_checklist(intent_title: &str) -> Vec<String> {
    match intent_title {
        "Plan a trip" => vec![
            "Confirm travel dates".to_string(),
            "Check passport and visa requirements".to_string(),
            "Book flights".to_string(),
            "Reserve accommodation".to_string(),
            "Arrange travel insurance".to_string(),
            "Prepare currency and payment cards".to_string(),
            "Research local transportation".to_string(),
            "Collect sightseeing information".to_string(),
            "Make a packing checklist".to_string(),
            "Prepare an emergency plan".to_string(),
        ],
        _ => vec![
            "Define the goal concretely".to_string(),
            "Assess the current situation".to_string(),
            "Identify required resources".to_string(),
            "Draft a step-by-step plan".to_string(),
            "Create a schedule".to_string(),
            "Plan the budget".to_string(),
            "Prepare necessary tools or materials".to_string(),
            "Set interim review dates".to_string(),
            "Prepare for likely obstacles".to_string(),
            "Define the completion criteria".to_string(),
        ],
    }
}

/// Filler items used to pad a short checklist up to the minimum bound.
pub fn padding_items() -> Vec<String> {
    vec![
        "Reconfirm the goal".to_string(),
        "Review the current situation".to_string(),
        "Plan the next step".to_string(),
        "Check available resources".to_string(),
        "Summarize progress so far".to_string(),
        "Schedule a follow-up review".to_string(),
        "Note open questions to resolve".to_string(),
    ]
}
