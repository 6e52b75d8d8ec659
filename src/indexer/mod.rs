// Indexer module
// Offline flow: read documentation section files, derive their canonical
// links, embed their content and upsert (link, vector) pairs into the
// remote index.

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::links::derive_doc_link;
use crate::openai::OpenAiClient;
use crate::pinecone::PineconeIndexClient;

/// Default location of the exported documentation sections.
pub const DEFAULT_INPUT_DIR: &str = "data/doc-sections";

/// Fixed pause between consecutive remote rounds. Pacing for the embedding
/// service's rate limit, not a backoff mechanism.
const PACING_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Embedded and upserted.
    Indexed,
    /// Content was empty after normalization; nothing to store.
    SkippedEmpty,
    /// Embedding or upsert failed; the rest of the batch still runs.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub link: String,
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub files_seen: usize,
    pub indexed: usize,
    pub skipped_empty: usize,
    pub failed: usize,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct IndexReport {
    pub outcomes: Vec<FileOutcome>,
    pub stats: IndexStats,
}

/// Drives the indexing flow over one input directory. Clients are injected
/// so the flow can run against test doubles.
pub struct Indexer {
    openai: OpenAiClient,
    index: PineconeIndexClient,
    input_dir: PathBuf,
    pacing: Duration,
    show_progress: bool,
}

impl Indexer {
    #[inline]
    pub fn new(openai: OpenAiClient, index: PineconeIndexClient, input_dir: &Path) -> Self {
        Self {
            openai,
            index,
            input_dir: input_dir.to_path_buf(),
            pacing: PACING_DELAY,
            show_progress: false,
        }
    }

    #[inline]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    #[inline]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Process every `.txt` file directly under the input directory.
    ///
    /// Files are processed in name order. A failing file is recorded in its
    /// outcome and does not abort the batch; only an unreadable input
    /// directory is a hard error.
    #[inline]
    pub fn run(&self) -> Result<IndexReport> {
        let started = Instant::now();
        let files = self.collect_input_files()?;
        info!(
            "Indexing {} section files from {}",
            files.len(),
            self.input_dir.display()
        );

        let progress = if self.show_progress {
            ProgressBar::new(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let mut outcomes = Vec::with_capacity(files.len());
        for (position, path) in files.iter().enumerate() {
            let outcome = self.process_file(path);

            match &outcome.status {
                FileStatus::Indexed => debug!("Indexed {}", outcome.link),
                FileStatus::SkippedEmpty => {
                    warn!("Skipped empty section file {}", path.display());
                }
                FileStatus::Failed(message) => {
                    warn!("Failed to index {}: {}", path.display(), message);
                }
            }

            let made_remote_call = outcome.status != FileStatus::SkippedEmpty;
            outcomes.push(outcome);
            progress.inc(1);

            // Pace the remote services between rounds.
            if made_remote_call && position + 1 < files.len() {
                sleep(self.pacing);
            }
        }
        progress.finish_and_clear();

        let stats = IndexStats::from_outcomes(&outcomes, started.elapsed());
        info!(
            "Indexing finished: {} indexed, {} skipped, {} failed",
            stats.indexed, stats.skipped_empty, stats.failed
        );

        Ok(IndexReport { outcomes, stats })
    }

    fn collect_input_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.input_dir).with_context(|| {
            format!("Failed to read input directory {}", self.input_dir.display())
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn process_file(&self, path: &Path) -> FileOutcome {
        let link = derive_doc_link(path, &self.input_dir);

        let status = match self.embed_and_upsert(path, &link) {
            Ok(true) => FileStatus::Indexed,
            Ok(false) => FileStatus::SkippedEmpty,
            Err(e) => FileStatus::Failed(format!("{e:#}")),
        };

        FileOutcome {
            path: path.to_path_buf(),
            link,
            status,
        }
    }

    fn embed_and_upsert(&self, path: &Path, link: &str) -> Result<bool> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let Some(embedding) = self
            .openai
            .embed(&content)
            .context("Embedding request failed")?
        else {
            return Ok(false);
        };

        self.index
            .upsert(link, embedding)
            .context("Upsert request failed")?;
        Ok(true)
    }
}

impl IndexStats {
    fn from_outcomes(outcomes: &[FileOutcome], duration: Duration) -> Self {
        let indexed = outcomes
            .iter()
            .filter(|o| o.status == FileStatus::Indexed)
            .count();
        let skipped_empty = outcomes
            .iter()
            .filter(|o| o.status == FileStatus::SkippedEmpty)
            .count();
        let failed = outcomes.len() - indexed - skipped_empty;

        Self {
            files_seen: outcomes.len(),
            indexed,
            skipped_empty,
            failed,
            duration,
        }
    }
}
