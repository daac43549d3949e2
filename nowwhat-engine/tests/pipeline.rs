//! End-to-end synthesis scenarios against scripted engine backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use genai_client::{
    EngineError, GenAiClient, GenerateRequest, GenerateResponse, GenerativeBackend,
};
use nowwhat_engine::store::{ChecklistStore, SqliteStore};
use nowwhat_engine::streaming::{RegenerationContext, StreamValidator, RECOVERY_DELIMITER};
use nowwhat_engine::{
    Answer, AnswerItem, ChecklistOrchestrator, ChecklistGenerationError, EngineConfig,
    EnrichedChecklistItem, GenerationRequest, SearchClient,
};

#[derive(Clone, Copy)]
enum DraftMode {
    Numbered(usize),
    Fail,
}

#[derive(Clone, Copy)]
enum SearchMode {
    Grounded,
    Fail,
}

/// Backend double routing on prompt text: checklist drafting, search
/// grounding, and question regeneration each carry a distinct template.
struct ScriptedBackend {
    draft: DraftMode,
    search: SearchMode,
    search_calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(draft: DraftMode, search: SearchMode) -> Arc<Self> {
        Arc::new(Self {
            draft,
            search,
            search_calls: AtomicUsize::new(0),
        })
    }

    fn draft_text(count: usize) -> String {
        (1..=count)
            .map(|i| format!("{i}. Book sample task number {i} tickets"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn grounded_reply(prompt: &str) -> String {
        // Echo the query back inside a tip so the matcher has a
        // guaranteed keyword overlap for the originating item.
        let query = prompt
            .split("about: \"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap_or("the task");
        serde_json::json!({
            "steps": [format!("We recommend that you {query} at least 2 weeks in advance")],
            "contacts": [],
            "links": [{ "title": "Guide", "url": "https://guide.example" }],
        })
        .to_string()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn generate(&self, request: GenerateRequest) -> genai_client::Result<GenerateResponse> {
        if request.prompt.contains("Search for current") {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            return match self.search {
                SearchMode::Grounded => Ok(GenerateResponse {
                    text: Self::grounded_reply(&request.prompt),
                    sources: vec!["https://grounding.example".into()],
                }),
                SearchMode::Fail => Err(EngineError::Api("search tier down".into())),
            };
        }

        match self.draft {
            DraftMode::Numbered(count) => Ok(GenerateResponse {
                text: Self::draft_text(count),
                sources: vec![],
            }),
            // Auth errors are not retried, so failing drafts stay fast.
            DraftMode::Fail => Err(EngineError::Auth("bad key".into())),
        }
    }

    async fn generate_stream(
        &self,
        _request: GenerateRequest,
    ) -> genai_client::Result<BoxStream<'static, genai_client::Result<String>>> {
        Err(EngineError::Api("streaming not scripted".into()))
    }
}

fn request() -> GenerationRequest {
    GenerationRequest {
        goal: "spend two weeks in Japan".into(),
        selected_intent: "Plan a trip".into(),
        answers: vec![AnswerItem {
            question_index: 0,
            question_text: "When do you want to travel?".into(),
            answer: Answer::Multi(vec!["spring".into(), "autumn".into()]),
        }],
    }
}

fn orchestrator(
    backend: Arc<ScriptedBackend>,
) -> (ChecklistOrchestrator<SqliteStore>, Arc<ScriptedBackend>) {
    let config = EngineConfig::default();
    let client = GenAiClient::new(backend.clone());
    let search = SearchClient::new(client.clone(), config.clone());
    let store = SqliteStore::open_in_memory().unwrap();
    (
        ChecklistOrchestrator::new(client, search, store, config),
        backend,
    )
}

#[tokio::test]
async fn happy_path_persists_a_grounded_checklist() {
    let (orch, backend) = orchestrator(ScriptedBackend::new(
        DraftMode::Numbered(10),
        SearchMode::Grounded,
    ));

    let outcome = orch.synthesize(&request(), "user-1").await.unwrap();
    assert!(outcome.checklist_id.starts_with("cl_"));
    assert_eq!(outcome.redirect_url, format!("/result/{}", outcome.checklist_id));
    // One grounded call per derived query.
    assert!(backend.search_calls.load(Ordering::SeqCst) >= 10);
}

#[tokio::test]
async fn persisted_checklist_round_trips_with_grounded_descriptions() {
    let config = EngineConfig::default();
    let backend = ScriptedBackend::new(DraftMode::Numbered(10), SearchMode::Grounded);
    let client = GenAiClient::new(backend);
    let search = SearchClient::new(client.clone(), config.clone());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.db");
    let store = SqliteStore::open(&path).unwrap();
    store
        .create_session("spend two weeks in Japan", "user-1")
        .unwrap();
    let orch = ChecklistOrchestrator::new(client, search, store, config);

    let outcome = orch.synthesize(&request(), "user-1").await.unwrap();

    let reader = SqliteStore::open(&path).unwrap();
    let stored = reader.load_checklist(&outcome.checklist_id).unwrap().unwrap();
    assert_eq!(stored.title, "Plan a trip: spend two weeks in Japan");
    assert_eq!(stored.category, "Plan a trip");
    assert!(stored.description.contains("• When do you want to travel?: spring, autumn"));
    assert_eq!(stored.items.len(), 10);

    let described = stored.items.iter().filter(|i| !i.description.is_empty()).count();
    assert!(described >= 7, "expected most items described, got {described}");
    assert!(stored
        .items
        .iter()
        .all(|i| i.description.chars().count() <= 150));
}

#[tokio::test]
async fn draft_failure_falls_back_to_intent_template() {
    let config = EngineConfig::default();
    let backend = ScriptedBackend::new(DraftMode::Fail, SearchMode::Fail);
    let client = GenAiClient::new(backend);
    let search = SearchClient::new(client.clone(), config.clone());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fallback.db");
    let store = SqliteStore::open(&path).unwrap();
    let orch = ChecklistOrchestrator::new(client, search, store, config.clone());

    let outcome = orch.synthesize(&request(), "user-1").await.unwrap();

    let stored = SqliteStore::open(&path)
        .unwrap()
        .load_checklist(&outcome.checklist_id)
        .unwrap()
        .unwrap();
    assert!(stored.items.len() >= config.min_checklist_items);
    assert!(stored.items.len() <= config.max_checklist_items);
    assert!(stored
        .items
        .iter()
        .any(|i| i.text == "Check passport and visa requirements"));
    assert!(stored.items.iter().all(|i| i.description.is_empty()));
}

#[tokio::test]
async fn search_outage_still_persists_items_without_descriptions() {
    let config = EngineConfig::default();
    let backend = ScriptedBackend::new(DraftMode::Numbered(9), SearchMode::Fail);
    let client = GenAiClient::new(backend.clone());
    let search = SearchClient::new(client.clone(), config.clone());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outage.db");
    let store = SqliteStore::open(&path).unwrap();
    let orch = ChecklistOrchestrator::new(client, search, store, config);

    let outcome = orch.synthesize(&request(), "user-1").await.unwrap();

    let stored = SqliteStore::open(&path)
        .unwrap()
        .load_checklist(&outcome.checklist_id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.items.len(), 9);
    assert!(stored.items.iter().all(|i| i.description.is_empty()));
}

#[tokio::test]
async fn over_generation_truncates_to_maximum_preserving_order() {
    let config = EngineConfig::default();
    let backend = ScriptedBackend::new(DraftMode::Numbered(20), SearchMode::Fail);
    let client = GenAiClient::new(backend);
    let search = SearchClient::new(client.clone(), config.clone());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncate.db");
    let store = SqliteStore::open(&path).unwrap();
    let orch = ChecklistOrchestrator::new(client, search, store, config.clone());

    let outcome = orch.synthesize(&request(), "user-1").await.unwrap();

    let stored = SqliteStore::open(&path)
        .unwrap()
        .load_checklist(&outcome.checklist_id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.items.len(), config.max_checklist_items);
    assert_eq!(stored.items[0].text, "Book sample task number 1 tickets");
    assert_eq!(stored.items[14].text, "Book sample task number 15 tickets");
}

#[tokio::test]
async fn checklist_persistence_failure_surfaces_as_error() {
    struct BrokenStore;

    #[async_trait]
    impl ChecklistStore for BrokenStore {
        async fn save_answers(
            &self,
            _goal: &str,
            _selected_intent: &str,
            _answers: &[AnswerItem],
            _user_id: &str,
        ) -> anyhow::Result<Option<String>> {
            Ok(None)
        }

        async fn save_checklist(
            &self,
            _title: &str,
            _description: &str,
            _category: &str,
            _items: &[EnrichedChecklistItem],
            _owner_id: &str,
        ) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("disk full"))
        }
    }

    let config = EngineConfig::default();
    let client = GenAiClient::new(ScriptedBackend::new(
        DraftMode::Numbered(10),
        SearchMode::Fail,
    ));
    let search = SearchClient::disabled(config.clone());
    let orch = ChecklistOrchestrator::new(client, search, BrokenStore, config);

    let err = orch.synthesize(&request(), "user-1").await.unwrap_err();
    assert!(matches!(
        err,
        ChecklistGenerationError::ChecklistPersistence(_)
    ));
    assert!(err.to_string().contains("disk full"));
}

#[tokio::test]
async fn truncated_stream_is_recovered_with_a_complete_payload() {
    struct TruncatingStreamBackend;

    #[async_trait]
    impl GenerativeBackend for TruncatingStreamBackend {
        async fn generate(
            &self,
            request: GenerateRequest,
        ) -> genai_client::Result<GenerateResponse> {
            assert!(request.prompt.contains("clarifying questions"));
            Ok(GenerateResponse {
                text: serde_json::json!({
                    "questions": [{
                        "id": "q1",
                        "text": "How long is the trip?",
                        "type": "multiple",
                        "options": [{ "text": "One week" }, { "text": "Two weeks" }]
                    }]
                })
                .to_string(),
                sources: vec![],
            })
        }

        async fn generate_stream(
            &self,
            _request: GenerateRequest,
        ) -> genai_client::Result<BoxStream<'static, genai_client::Result<String>>> {
            // Ends mid-object, so validation must reject the stream.
            let chunks = vec![
                Ok(r#"{"questions": [{"id": "q1", "#.to_string()),
                Ok(r#""text": "How long"#.to_string()),
            ];
            Ok(futures::stream::iter(chunks).boxed())
        }
    }

    let client = GenAiClient::new(Arc::new(TruncatingStreamBackend));
    let validator = StreamValidator::new(client);
    let ctx = RegenerationContext {
        goal: "spend two weeks in Japan".into(),
        intent_title: "Plan a trip".into(),
    };

    let chunks: Vec<String> = validator
        .stream_with_validation("generate questions".into(), ctx)
        .collect()
        .await;
    let joined = chunks.join("");

    assert!(joined.contains(RECOVERY_DELIMITER));
    let recovered = joined.split(RECOVERY_DELIMITER).nth(1).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(recovered.trim()).unwrap();
    assert_eq!(parsed["questions"][0]["id"], "q1");
}

#[tokio::test]
async fn mixed_search_failures_stay_aligned_across_batches() {
    // Fails every third query at all degradation tiers; the rest answer
    // with a tip naming their query index.
    struct EveryThirdDown;

    #[async_trait]
    impl GenerativeBackend for EveryThirdDown {
        async fn generate(
            &self,
            request: GenerateRequest,
        ) -> genai_client::Result<GenerateResponse> {
            let query = request
                .prompt
                .split("about: \"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap_or_default();
            let index: usize = query
                .rsplit(' ')
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(usize::MAX);
            if index % 3 == 0 {
                return Err(EngineError::Api(format!("query {index} unavailable")));
            }
            Ok(GenerateResponse {
                text: serde_json::json!({
                    "steps": [format!("Tip for query {index}")],
                    "contacts": [],
                    "links": [],
                })
                .to_string(),
                sources: vec![],
            })
        }

        async fn generate_stream(
            &self,
            _request: GenerateRequest,
        ) -> genai_client::Result<BoxStream<'static, genai_client::Result<String>>> {
            Err(EngineError::Api("not scripted".into()))
        }
    }

    let config = EngineConfig::default();
    // 17 queries against a batch size of 15 forces a second batch.
    assert!(config.max_concurrent_searches < 17);
    let client = GenAiClient::new(Arc::new(EveryThirdDown));
    let search = SearchClient::new(client, config);

    let queries: Vec<String> = (0..17).map(|i| format!("grounding query {i}")).collect();
    let results = search.parallel_search(&queries).await;

    assert_eq!(results.len(), queries.len());
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.query, queries[i], "query misaligned at index {i}");
        assert_eq!(result.success, i % 3 != 0, "success flag wrong at index {i}");
        if result.success {
            assert!(
                result.content.contains(&format!("Tip for query {i}")),
                "content misaligned at index {i}"
            );
        } else {
            assert!(result.error_message.is_some());
        }
    }
}

#[tokio::test]
async fn complete_stream_passes_through_without_recovery() {
    struct CompleteStreamBackend;

    #[async_trait]
    impl GenerativeBackend for CompleteStreamBackend {
        async fn generate(
            &self,
            _request: GenerateRequest,
        ) -> genai_client::Result<GenerateResponse> {
            // A valid primary stream must never trigger regeneration.
            Err(EngineError::Api("regeneration should not run".into()))
        }

        async fn generate_stream(
            &self,
            _request: GenerateRequest,
        ) -> genai_client::Result<BoxStream<'static, genai_client::Result<String>>> {
            let payload = serde_json::json!({
                "questions": [{
                    "id": "q1",
                    "text": "How long is the trip?",
                    "type": "multiple",
                    "options": [{ "text": "One week" }, { "text": "Two weeks" }]
                }]
            })
            .to_string();
            let half = payload.len() / 2;
            let chunks = vec![
                Ok(payload[..half].to_string()),
                Ok(payload[half..].to_string()),
            ];
            Ok(futures::stream::iter(chunks).boxed())
        }
    }

    let client = GenAiClient::new(Arc::new(CompleteStreamBackend));
    let validator = StreamValidator::new(client);
    let ctx = RegenerationContext {
        goal: "spend two weeks in Japan".into(),
        intent_title: "Plan a trip".into(),
    };

    let chunks: Vec<String> = validator
        .stream_with_validation("generate questions".into(), ctx)
        .collect()
        .await;

    assert_eq!(chunks.len(), 2);
    let joined = chunks.join("");
    assert!(!joined.contains(RECOVERY_DELIMITER));
    let parsed: serde_json::Value = serde_json::from_str(&joined).unwrap();
    assert_eq!(parsed["questions"][0]["id"], "q1");
}

#[tokio::test]
async fn duplicate_draft_lines_collapse_to_one_item() {
    struct DuplicatingBackend;

    #[async_trait]
    impl GenerativeBackend for DuplicatingBackend {
        async fn generate(
            &self,
            request: GenerateRequest,
        ) -> genai_client::Result<GenerateResponse> {
            if request.prompt.contains("Search for current") {
                return Err(EngineError::Api("down".into()));
            }
            Ok(GenerateResponse {
                text: "1. Book flights early\n2. book flights early\n3. Reserve a hotel room\n4. Pack essential items\n5. Check visa rules\n6. Exchange some currency\n7. Plan the itinerary\n8. Arrange airport transfer\n9. Buy travel insurance"
                    .into(),
                sources: vec![],
            })
        }

        async fn generate_stream(
            &self,
            _request: GenerateRequest,
        ) -> genai_client::Result<BoxStream<'static, genai_client::Result<String>>> {
            Err(EngineError::Api("down".into()))
        }
    }

    let config = EngineConfig::default();
    let client = GenAiClient::new(Arc::new(DuplicatingBackend));
    let search = SearchClient::disabled(config.clone());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dedupe.db");
    let store = SqliteStore::open(&path).unwrap();
    let orch = ChecklistOrchestrator::new(client, search, store, config);

    let outcome = orch.synthesize(&request(), "user-1").await.unwrap();

    let stored = SqliteStore::open(&path)
        .unwrap()
        .load_checklist(&outcome.checklist_id)
        .unwrap()
        .unwrap();
    let flight_items = stored
        .items
        .iter()
        .filter(|i| i.text.eq_ignore_ascii_case("book flights early"))
        .count();
    assert_eq!(flight_items, 1);
    assert_eq!(stored.items.len(), 8);
}
