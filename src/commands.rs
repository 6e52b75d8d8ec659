use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::Result;
use crate::config::{redact, Config};
use crate::converter::convert_sections;
use crate::indexer::{FileStatus, Indexer};
use crate::openai::OpenAiClient;
use crate::pinecone::PineconeClient;
use crate::web::{run_server, AppState};

/// Split exported markdown pages into the plain-text section files the
/// `index` command consumes.
#[inline]
pub fn run_convert(input_dir: &Path, output_dir: &Path) -> Result<()> {
    info!(
        "Converting markdown from {} into {}",
        input_dir.display(),
        output_dir.display()
    );
    let stats = convert_sections(input_dir, output_dir)?;

    println!("Conversion complete:");
    println!("  Markdown files: {}", stats.files_seen);
    println!("  Sections written: {}", stats.sections_written);

    Ok(())
}

/// Embed every documentation section under `input_dir` and upsert the
/// (link, vector) pairs into the configured index, creating it if needed.
#[inline]
pub fn run_index(input_dir: &Path) -> Result<()> {
    let config = Config::from_env()?;

    let openai = OpenAiClient::new(&config);
    let index = PineconeClient::new(&config)
        .ensure_index(
            &config.pinecone.index_name,
            config.openai.embedding_dimension,
        )
        .context("Failed to prepare vector index")?;

    info!("Starting indexing run over {}", input_dir.display());
    let report = Indexer::new(openai, index, input_dir)
        .with_progress(true)
        .run()?;

    println!("Indexing complete:");
    println!("  Files seen: {}", report.stats.files_seen);
    println!("  Indexed: {}", report.stats.indexed);
    println!("  Skipped (empty): {}", report.stats.skipped_empty);
    println!("  Failed: {}", report.stats.failed);
    println!("  Duration: {:?}", report.stats.duration);

    if report.stats.failed > 0 {
        println!();
        println!("Failed files:");
        for outcome in &report.outcomes {
            if let FileStatus::Failed(message) = &outcome.status {
                println!("  ⚠️  {}: {}", outcome.path.display(), message);
            }
        }
        println!("Re-running the command retries every file; upserts are idempotent.");
    }

    Ok(())
}

/// Serve the question-answering page. The index must already exist; run
/// `index` first.
#[inline]
pub async fn run_serve(bind: &str, port: u16) -> Result<()> {
    let config = Config::from_env()?;

    let index_name = config.pinecone.index_name.clone();
    let (openai, index) = tokio::task::spawn_blocking(move || -> Result<_> {
        let openai = OpenAiClient::new(&config);
        let index = PineconeClient::new(&config)
            .index(&index_name)
            .context("Failed to look up vector index; run `docs-copilot index` first")?;
        Ok((openai, index))
    })
    .await
    .context("Client setup task failed")??;

    run_server(Arc::new(AppState { openai, index }), bind, port).await?;
    Ok(())
}

/// Print the resolved configuration, or where it comes from.
#[inline]
pub fn show_config(show: bool) -> Result<()> {
    if !show {
        println!("Configuration is read from environment variables:");
        println!("  OPENAI_API_KEY       (required)");
        println!("  PINECONE_API_KEY     (required)");
        println!("  PINECONE_INDEX_NAME  (required)");
        println!("  OPENAI_API_BASE      (optional override)");
        println!("  PINECONE_API_BASE    (optional override)");
        println!("  EMBEDDING_DIMENSION  (optional override)");
        println!();
        println!("Use `docs-copilot config --show` to print the resolved values.");
        return Ok(());
    }

    let config = Config::from_env()?;

    println!("OpenAI:");
    println!("  API base: {}", config.openai.api_base);
    println!("  API key: {}", redact(&config.openai.api_key));
    println!("  Embedding model: {}", config.openai.embedding_model);
    println!(
        "  Embedding dimension: {}",
        config.openai.embedding_dimension
    );
    println!("  Chat model: {}", config.openai.chat_model);
    println!("Pinecone:");
    println!("  API base: {}", config.pinecone.api_base);
    println!("  API key: {}", redact(&config.pinecone.api_key));
    println!("  Index name: {}", config.pinecone.index_name);

    Ok(())
}
