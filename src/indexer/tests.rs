use super::*;
use crate::config::{Config, OpenAiConfig, PineconeConfig};
use crate::pinecone::PineconeClient;
use serde_json::json;
use std::fs;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(openai_base: &str) -> Config {
    Config {
        openai: OpenAiConfig {
            api_key: "sk-test".to_string(),
            api_base: openai_base.parse().expect("valid URL"),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dimension: 1536,
            chat_model: "gpt-3.5-turbo".to_string(),
        },
        pinecone: PineconeConfig {
            api_key: "pc-test".to_string(),
            api_base: "http://localhost:1".parse().expect("valid URL"),
            index_name: "opensafely-docs".to_string(),
        },
    }
}

fn index_client_for(server: &MockServer) -> crate::pinecone::PineconeIndexClient {
    let control = PineconeClient::new(&test_config("http://localhost:1"));
    control.index_client(&server.uri()).expect("valid host")
}

fn mount_embedding_ok() -> Mock {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.1, 0.2]}],
        })))
}

#[tokio::test(flavor = "multi_thread")]
async fn indexes_txt_files_in_name_order() {
    let server = MockServer::start().await;
    mount_embedding_ok().mount(&server).await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("using-codelists_section_glossary.txt"),
        "Codelists are...",
    )
    .expect("write");
    fs::write(
        dir.path().join("platform_section_no-header.txt"),
        "The platform is...",
    )
    .expect("write");
    fs::write(dir.path().join("notes.md"), "not a section").expect("write");

    let openai = crate::openai::OpenAiClient::new(&test_config(&server.uri()));
    let index = index_client_for(&server);
    let input_dir = dir.path().to_path_buf();

    let report = tokio::task::spawn_blocking(move || {
        Indexer::new(openai, index, &input_dir)
            .with_pacing(Duration::ZERO)
            .run()
    })
    .await
    .expect("task should not panic")
    .expect("indexing should succeed");

    assert_eq!(report.stats.files_seen, 2);
    assert_eq!(report.stats.indexed, 2);
    assert_eq!(report.stats.failed, 0);

    // Name order, and links derived from the file names.
    assert_eq!(
        report.outcomes[0].link,
        "https://docs.opensafely.org/platform"
    );
    assert_eq!(
        report.outcomes[1].link,
        "https://docs.opensafely.org/using-codelists/#glossary"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_file_is_skipped_without_upsert() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("empty_section_no-header.txt"), "").expect("write");

    let openai = crate::openai::OpenAiClient::new(&test_config(&server.uri()));
    let index = index_client_for(&server);
    let input_dir = dir.path().to_path_buf();

    let report = tokio::task::spawn_blocking(move || {
        Indexer::new(openai, index, &input_dir)
            .with_pacing(Duration::ZERO)
            .run()
    })
    .await
    .expect("task should not panic")
    .expect("indexing should succeed");

    assert_eq!(report.stats.skipped_empty, 1);
    assert_eq!(report.stats.indexed, 0);
    assert_eq!(report.outcomes[0].status, FileStatus::SkippedEmpty);
}

#[tokio::test(flavor = "multi_thread")]
async fn one_failure_does_not_abort_the_batch() {
    let server = MockServer::start().await;

    // The embedding service rejects one file's content and accepts the other.
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({"input": ["bad content"]})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_embedding_ok().mount(&server).await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a_section_one.txt"), "bad content").expect("write");
    fs::write(dir.path().join("b_section_two.txt"), "good content").expect("write");

    let openai = crate::openai::OpenAiClient::new(&test_config(&server.uri()));
    let index = index_client_for(&server);
    let input_dir = dir.path().to_path_buf();

    let report = tokio::task::spawn_blocking(move || {
        Indexer::new(openai, index, &input_dir)
            .with_pacing(Duration::ZERO)
            .run()
    })
    .await
    .expect("task should not panic")
    .expect("batch should survive one failure");

    assert_eq!(report.stats.files_seen, 2);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.indexed, 1);
    assert!(matches!(report.outcomes[0].status, FileStatus::Failed(_)));
    assert_eq!(report.outcomes[1].status, FileStatus::Indexed);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_input_directory_is_a_hard_error() {
    let server = MockServer::start().await;

    let openai = crate::openai::OpenAiClient::new(&test_config(&server.uri()));
    let index = index_client_for(&server);

    let result = tokio::task::spawn_blocking(move || {
        Indexer::new(openai, index, Path::new("/nonexistent/doc-sections"))
            .with_pacing(Duration::ZERO)
            .run()
    })
    .await
    .expect("task should not panic");

    assert!(result.is_err());
}
