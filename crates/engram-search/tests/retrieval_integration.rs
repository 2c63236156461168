//! Retrieval-layer scenarios against an in-memory database

use engram_common::CorrelationId;
use engram_embeddings::{HashEmbedder, TextEmbedder, embed_one};
use engram_search::{EventSearchRequest, SearchService};
use engram_storage::{NewCodeSymbol, Storage};
use std::sync::Arc;

const DIMENSION: usize = 64;

async fn setup() -> (Storage, Arc<HashEmbedder>, SearchService) {
    let storage = Storage::connect_memory(DIMENSION).await.expect("storage");
    storage.initialize_schema().await.expect("schema");
    let embedder = Arc::new(HashEmbedder::new(DIMENSION, 900));
    let service = SearchService::new(storage.clone(), Arc::clone(&embedder) as Arc<dyn TextEmbedder>);
    (storage, embedder, service)
}

async fn save_event(storage: &Storage, embedder: &dyn TextEmbedder, user: &str, subject: &str, content: &str) {
    let embedding = embed_one(embedder, content)
        .await
        .expect("embed")
        .expect("vector");
    storage
        .save_event(user, subject, content, &embedding, None)
        .await
        .expect("save event");
}

#[tokio::test]
async fn hybrid_event_search_ranks_the_text_match_first() {
    let (storage, embedder, service) = setup().await;
    save_event(&storage, embedder.as_ref(), "p1", "log:build", "build ok").await;
    save_event(
        &storage,
        embedder.as_ref(),
        "p1",
        "log:build",
        "build failed: database connection",
    )
    .await;
    save_event(
        &storage,
        embedder.as_ref(),
        "p1",
        "conversation:c1",
        "user said hello",
    )
    .await;

    let outcome = service
        .search_events(
            &EventSearchRequest {
                user_id: "p1".into(),
                query: Some("database".into()),
                last_days: Some(7),
                ..EventSearchRequest::default()
            },
            &CorrelationId::new(),
        )
        .await
        .expect("search");

    assert!(outcome.alternatives.is_none());
    assert!(!outcome.results.is_empty());
    assert_eq!(
        outcome.results[0].content, "build failed: database connection",
        "text match must rank first"
    );
    // The conversation event matches neither leg of the hybrid filter
    assert!(
        outcome
            .results
            .iter()
            .all(|hit| hit.content != "user said hello")
    );
}

#[tokio::test]
async fn empty_scope_returns_alternatives() {
    let (storage, embedder, service) = setup().await;
    save_event(&storage, embedder.as_ref(), "alpha", "log:x", "something").await;

    let outcome = service
        .search_events(
            &EventSearchRequest {
                user_id: "alph".into(), // typo
                ..EventSearchRequest::default()
            },
            &CorrelationId::new(),
        )
        .await
        .expect("search");

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.alternatives, Some(vec!["alpha".to_string()]));
}

#[tokio::test]
async fn symbol_search_suggests_known_projects_on_typos() {
    let (storage, _embedder, service) = setup().await;
    storage
        .upsert_code_project("alpha", "Alpha", "/tmp/alpha")
        .await
        .expect("project");
    storage
        .save_code_symbols(&[NewCodeSymbol {
            project_id: "alpha".into(),
            file_path: "lib.rs".into(),
            language: "rust".into(),
            symbol_type: "function".into(),
            name: "parse_config".into(),
            name_path: "lib.parse_config".into(),
            start_line: 1,
            end_line: 5,
            start_byte: 0,
            end_byte: 64,
            source_code: Some("fn parse_config() {}".into()),
            signature: Some("fn parse_config()".into()),
            doc_string: None,
            embedding: Some(vec![0.5; DIMENSION]),
        }])
        .await
        .expect("symbols");

    let outcome = service
        .search_symbols("alph", "configuration parsing", None, 10)
        .await
        .expect("search");
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.alternatives, Some(vec!["alpha".to_string()]));

    let found = service
        .search_symbols("alpha", "configuration parsing", None, 10)
        .await
        .expect("search");
    assert!(found.alternatives.is_none());
    assert_eq!(found.results.len(), 1);
    assert_eq!(found.results[0].name, "parse_config");
}

#[tokio::test]
async fn lexical_symbol_lookup_matches_prefixes() {
    let (storage, _embedder, service) = setup().await;
    storage
        .upsert_code_project("p", "P", "/tmp/p")
        .await
        .expect("project");
    storage
        .save_code_symbols(&[NewCodeSymbol {
            project_id: "p".into(),
            file_path: "lib.rs".into(),
            language: "rust".into(),
            symbol_type: "function".into(),
            name: "handle_request".into(),
            name_path: "lib.handle_request".into(),
            start_line: 1,
            end_line: 2,
            start_byte: 0,
            end_byte: 32,
            source_code: None,
            signature: None,
            doc_string: None,
            embedding: None,
        }])
        .await
        .expect("symbols");

    let outcome = service
        .find_symbols_by_name("p", "handle", 10)
        .await
        .expect("lookup");
    assert_eq!(outcome.results.len(), 1);

    let by_file = service
        .find_symbols_by_file("p", "lib.rs")
        .await
        .expect("by file");
    assert_eq!(by_file.results.len(), 1);
}
