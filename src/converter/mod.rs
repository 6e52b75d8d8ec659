// Converter module
// Produces the documentation section files the indexer consumes: each
// markdown page is split on its h1/h2 headers and every section is written
// as plain text under a `<page>_section_<header>.txt` name.


use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pulldown_cmark::{Event, Parser, TagEnd};
use tracing::{debug, info};

/// Default location of the exported documentation markdown pages.
pub const DEFAULT_MARKDOWN_DIR: &str = "data/docs";

/// Placeholder header for a section with no heading line, typically a
/// page's preamble before its first header.
const NO_HEADER: &str = "no_header";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertStats {
    pub files_seen: usize,
    pub sections_written: usize,
}

/// One section of a markdown page: its header text (if any) and the
/// plain-text rendering of its content, header line included.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    header: Option<String>,
    text: String,
}

/// Convert every `.md` file directly under `input_dir` into per-section
/// plain-text files under `output_dir`.
///
/// Pages are split before each h1/h2 heading line; deeper headings stay
/// inside their parent section. The section file name embeds the sanitized
/// header so the link deriver can reconstruct the page URL and anchor.
#[inline]
pub fn convert_sections(input_dir: &Path, output_dir: &Path) -> Result<ConvertStats> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let files = collect_markdown_files(input_dir)?;
    info!(
        "Converting {} markdown files from {}",
        files.len(),
        input_dir.display()
    );

    let mut sections_written = 0;
    for path in &files {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let page = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        for section in split_sections(&content) {
            let header = section.header.as_deref().map_or_else(
                || NO_HEADER.to_string(),
                sanitize_header,
            );
            let file_name = format!("{page}_section_{header}.txt");
            let output_path = output_dir.join(&file_name);

            fs::write(&output_path, &section.text)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            debug!("Converted {} to {}", path.display(), file_name);
            sections_written += 1;
        }
    }

    let stats = ConvertStats {
        files_seen: files.len(),
        sections_written,
    };
    info!(
        "Conversion finished: {} files, {} sections",
        stats.files_seen, stats.sections_written
    );
    Ok(stats)
}

fn collect_markdown_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read input directory {}", input_dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();
    Ok(files)
}

/// Split a markdown page before every h1/h2 heading line and render each
/// piece to plain text. The header recorded for a piece is its first
/// heading line of any level, so a piece with only deeper headings still
/// gets a name.
fn split_sections(markdown: &str) -> Vec<Section> {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in markdown.split_inclusive('\n') {
        if is_section_boundary(line) && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
        .iter()
        .map(|piece| Section {
            header: first_header(piece).map(str::to_string),
            text: markdown_to_text(piece),
        })
        .collect()
}

/// A line opens a new section when it is an h1 or h2 heading.
fn is_section_boundary(line: &str) -> bool {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    (1..=2).contains(&hashes) && rest_after_hashes(line, hashes).is_some()
}

/// First heading line of any level (h1-h6) within a section, without the
/// marker.
fn first_header(section: &str) -> Option<&str> {
    section.lines().find_map(|line| {
        let hashes = line.bytes().take_while(|b| *b == b'#').count();
        if (1..=6).contains(&hashes) {
            rest_after_hashes(line, hashes)
        } else {
            None
        }
    })
}

/// The text after `hashes` leading markers, provided a whitespace separator
/// follows them.
fn rest_after_hashes(line: &str, hashes: usize) -> Option<&str> {
    let rest = line.get(hashes..)?;
    let mut chars = rest.chars();
    chars.next().filter(|c| c.is_whitespace())?;
    Some(chars.as_str().trim_end())
}

/// Keep ASCII alphanumerics, `-` and `_`; anything else becomes `-` so the
/// header survives as a single file-name segment.
fn sanitize_header(header: &str) -> String {
    header
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Render markdown to plain text: markup is dropped, text and code content
/// are kept, block boundaries become newlines.
fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(content) | Event::Code(content) => text.push_str(&content),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => text.push('\n'),
            _ => {}
        }
    }
    text
}
