// Links module
// Pure string processing: deriving canonical documentation links from
// section file paths, and turning stored links back into citation labels.


use std::path::Path;

use crate::{CopilotError, Result};

/// Origin of the documentation site all derived links point at.
pub const DOCS_ORIGIN: &str = "https://docs.opensafely.org";

/// Citation label of the site root; links directly under it get no
/// subheader prefix.
pub const ROOT_LABEL: &str = "Docs.opensafely.org";

/// Derive the canonical documentation URL for a section file.
///
/// The section exporter encodes the page path in the file name:
/// `<page>_section_<anchor>.txt` under `input_dir`. Deterministic; a path
/// with no directory separator after prefix stripping simply gets no anchor
/// inserted.
#[inline]
pub fn derive_doc_link(path: &Path, input_dir: &Path) -> String {
    let relative = path.strip_prefix(input_dir).unwrap_or(path);

    let mut converted = relative.to_string_lossy().replace('\\', "/");
    converted = converted.replace("_section_", "/");
    if let Some(stripped) = converted.strip_suffix(".txt") {
        converted.truncate(stripped.len());
    }
    converted = converted.replace('_', "-").to_lowercase();

    // The final path segment is an in-page anchor.
    if let Some(pos) = converted.rfind('/') {
        converted.insert(pos + 1, '#');
    }

    // Sections exported from a page's preamble carry a placeholder anchor.
    if let Some(stripped) = converted.strip_suffix("/#no-header") {
        converted.truncate(stripped.len());
    }

    format!("{DOCS_ORIGIN}/{converted}")
}

/// Produce the human-readable citation label for a stored documentation
/// link: `"<subheader>: <header>"`, or the header alone for links directly
/// under the site root.
///
/// Links with fewer than two `/`-separated segments, or with empty header
/// or subheader segments, are rejected as malformed rather than indexed
/// into blindly.
#[inline]
pub fn citation_label(link: &str) -> Result<String> {
    let mut segments = link.rsplit('/');
    let header_raw = segments.next().unwrap_or_default();
    let subheader_raw = segments.next().ok_or_else(|| {
        CopilotError::Citation(format!("link has no subheader segment: {link}"))
    })?;

    let header = prettify(header_raw).ok_or_else(|| {
        CopilotError::Citation(format!("link has an empty header segment: {link}"))
    })?;
    let subheader = prettify(subheader_raw).ok_or_else(|| {
        CopilotError::Citation(format!("link has an empty subheader segment: {link}"))
    })?;

    if subheader == ROOT_LABEL {
        Ok(header)
    } else {
        Ok(format!("{subheader}: {header}"))
    }
}

/// Strip the anchor marker, capitalize the first character, and turn
/// hyphens back into spaces. `None` when nothing is left to display.
fn prettify(segment: &str) -> Option<String> {
    let cleaned = segment.replace('#', "");
    let mut chars = cleaned.chars();
    let first = chars.next()?;
    let rest: String = chars.collect();
    Some(format!("{}{}", first.to_uppercase(), rest).replace('-', " "))
}

/// Ordered mapping from documentation link to citation label for one query.
/// Insertion order follows match relevance order; duplicate links are
/// ignored.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SupportingTexts {
    entries: Vec<(String, String)>,
}

impl SupportingTexts {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, link: String, label: String) {
        if !self.entries.iter().any(|(existing, _)| *existing == link) {
            self.entries.push((link, label));
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, label)| label.as_str())
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(link, label)| (link.as_str(), label.as_str()))
    }
}
