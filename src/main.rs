use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docs_copilot::commands::{run_convert, run_index, run_serve, show_config};
use docs_copilot::converter::DEFAULT_MARKDOWN_DIR;
use docs_copilot::indexer::DEFAULT_INPUT_DIR;
use docs_copilot::Result;

#[derive(Parser)]
#[command(name = "docs-copilot")]
#[command(about = "Question-answering copilot for the OpenSAFELY documentation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split documentation markdown pages into `.txt` section files
    Convert {
        /// Directory containing exported markdown pages
        #[arg(long = "input_dir", default_value = DEFAULT_MARKDOWN_DIR)]
        input_dir: PathBuf,
        /// Directory the section files are written to
        #[arg(long = "output_dir", default_value = DEFAULT_INPUT_DIR)]
        output_dir: PathBuf,
    },
    /// Embed documentation sections and upsert them into the vector index
    Index {
        /// Directory containing exported `.txt` section files
        #[arg(long = "input_dir", default_value = DEFAULT_INPUT_DIR)]
        input_dir: PathBuf,
    },
    /// Serve the question-answering page
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Show how the copilot is configured
    Config {
        /// Print the resolved configuration with secrets redacted
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input_dir,
            output_dir,
        } => {
            tokio::task::spawn_blocking(move || run_convert(&input_dir, &output_dir))
                .await
                .context("Conversion task failed")??;
        }
        Commands::Index { input_dir } => {
            tokio::task::spawn_blocking(move || run_index(&input_dir))
                .await
                .context("Indexing task failed")??;
        }
        Commands::Serve { bind, port } => {
            run_serve(&bind, port).await?;
        }
        Commands::Config { show } => {
            show_config(show)?;
        }
    }

    Ok(())
}
