#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests for the indexing and query flows against wiremock
// doubles of the OpenAI and Pinecone services.
// Run with: cargo test --test integration_pipeline

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docs_copilot::config::{Config, OpenAiConfig, PineconeConfig};
use docs_copilot::indexer::Indexer;
use docs_copilot::openai::OpenAiClient;
use docs_copilot::pinecone::PineconeClient;
use docs_copilot::web::{build_router, AppState};

fn config_for(server: &MockServer) -> Config {
    Config {
        openai: OpenAiConfig {
            api_key: "sk-test".to_string(),
            api_base: server.uri().parse().expect("valid URL"),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dimension: 1536,
            chat_model: "gpt-3.5-turbo".to_string(),
        },
        pinecone: PineconeConfig {
            api_key: "pc-test".to_string(),
            api_base: server.uri().parse().expect("valid URL"),
            index_name: "opensafely-docs".to_string(),
        },
    }
}

/// Control plane reports an index whose data-plane host is the mock server
/// itself.
async fn mount_control_plane(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indexes": [{"name": "opensafely-docs", "host": server.uri()}],
        })))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn index_then_answer_round_trip() {
    let server = MockServer::start().await;
    mount_control_plane(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.4, 0.6]}],
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(body_partial_json(json!({
            "vectors": [{"id": "https://docs.opensafely.org/using-codelists/#glossary"}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("using-codelists_section_glossary.txt"),
        "A codelist is a curated set of clinical codes.",
    )
    .expect("write");

    // Offline flow: embed the section and upsert it under its derived link.
    let config = config_for(&server);
    let input_dir = dir.path().to_path_buf();
    let report = tokio::task::spawn_blocking(move || {
        let openai = OpenAiClient::new(&config);
        let index = PineconeClient::new(&config).ensure_index("opensafely-docs", 1536)?;
        Indexer::new(openai, index, &input_dir)
            .with_pacing(Duration::ZERO)
            .run()
    })
    .await
    .expect("task should not panic")
    .expect("indexing should succeed");

    assert_eq!(report.stats.indexed, 1);

    // Online flow: the stored key comes back as a match and is cited.
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({"topK": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {"id": "https://docs.opensafely.org/using-codelists/#glossary", "score": 0.95},
            ],
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {},
                {"content": "The supporting texts from the documentation are: ['Using codelists: Glossary']"},
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant",
                "content": "A codelist is a curated set of clinical codes."}}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let state = tokio::task::spawn_blocking(move || -> anyhow::Result<Arc<AppState>> {
        let openai = OpenAiClient::new(&config);
        let index = PineconeClient::new(&config).index("opensafely-docs")?;
        Ok(Arc::new(AppState { openai, index }))
    })
    .await
    .expect("task should not panic")
    .expect("state should build");

    let response = build_router(state)
        .oneshot(
            Request::post("/")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("question=What+is+a+codelist%3F"))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let html = String::from_utf8(bytes.to_vec()).expect("UTF-8 body");

    assert!(html.contains("A codelist is a curated set of clinical codes."));
    assert!(html.contains("Using codelists: Glossary"));
    assert!(html.contains("https://docs.opensafely.org/using-codelists/#glossary"));
}

#[tokio::test(flavor = "multi_thread")]
async fn custom_system_message_reaches_the_chat_service() {
    let server = MockServer::start().await;
    mount_control_plane(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.4, 0.6]}],
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [{"id": "https://docs.opensafely.org/platform", "score": 0.9}],
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{"role": "system", "content": "Answer in one sentence."}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Done."}}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let state = tokio::task::spawn_blocking(move || -> anyhow::Result<Arc<AppState>> {
        let openai = OpenAiClient::new(&config);
        let index = PineconeClient::new(&config).index("opensafely-docs")?;
        Ok(Arc::new(AppState { openai, index }))
    })
    .await
    .expect("task should not panic")
    .expect("state should build");

    let response = build_router(state)
        .oneshot(
            Request::post("/")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "question=anything&system_message=Answer+in+one+sentence.",
                ))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
}
