//! Prompt helpers: templates, fingerprints, reasoning-block stripping, bounded text.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Paired markers some models wrap their internal reasoning in.
const REASONING_MARKERS: &[(&str, &str)] = &[
    ("<think>", "</think>"),
    ("<thinking>", "</thinking>"),
    ("<reasoning>", "</reasoning>"),
];

/// Compute a stable SHA-256 fingerprint for a prompt string.
pub fn hash_prompt(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Remove internal-reasoning blocks from model output.
///
/// Handles the paired markers in [`REASONING_MARKERS`] case-insensitively,
/// an opening marker that is never closed (everything after it is dropped),
/// and a closing marker with no opener (everything before it is dropped).
pub fn strip_reasoning(text: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical to `text`.
    let lower = text.to_ascii_lowercase();

    let mut pos = leading_orphan_close(&lower);
    let mut out = String::with_capacity(text.len());

    loop {
        let next_open = REASONING_MARKERS
            .iter()
            .filter_map(|(open, close)| lower[pos..].find(open).map(|i| (pos + i, *open, *close)))
            .min_by_key(|(start, _, _)| *start);

        let Some((start, open, close)) = next_open else {
            out.push_str(&text[pos..]);
            break;
        };

        out.push_str(&text[pos..start]);
        let body_start = start + open.len();
        match lower[body_start..].find(close) {
            Some(end) => pos = body_start + end + close.len(),
            None => break,
        }
    }

    out.trim().to_string()
}

/// Offset just past a closing marker that appears before any opening marker.
fn leading_orphan_close(lower: &str) -> usize {
    let first_open = REASONING_MARKERS
        .iter()
        .filter_map(|(open, _)| lower.find(open))
        .min()
        .unwrap_or(lower.len());

    REASONING_MARKERS
        .iter()
        .filter_map(|(_, close)| lower[..first_open].rfind(close).map(|i| i + close.len()))
        .max()
        .unwrap_or(0)
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// Where a [`PromptTemplate`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOrigin {
    /// Text supplied directly by configuration.
    Inline,
    /// Contents of a prompt file.
    File(PathBuf),
    /// The template compiled into the crate.
    Builtin,
}

impl fmt::Display for PromptOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => f.write_str("inline"),
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Builtin => f.write_str("builtin"),
        }
    }
}

/// A prompt template with a single placeholder, plus its fingerprint.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
    origin: PromptOrigin,
    fingerprint: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>, origin: PromptOrigin) -> Self {
        let text = text.into();
        let fingerprint = hash_prompt(&text);
        Self {
            text,
            origin,
            fingerprint,
        }
    }

    /// Pick the first usable source: `inline`, then the file at `path`, then
    /// `builtin`. Blank text and unreadable files count as absent.
    pub fn resolve(inline: Option<&str>, path: Option<&Path>, builtin: &str) -> Self {
        if let Some(text) = inline.map(str::trim).filter(|t| !t.is_empty()) {
            return Self::new(text, PromptOrigin::Inline);
        }
        let from_file = path.and_then(|path| {
            let content = std::fs::read_to_string(path).ok()?;
            let trimmed = content.trim();
            (!trimmed.is_empty()).then(|| Self::new(trimmed, PromptOrigin::File(path.to_path_buf())))
        });
        from_file.unwrap_or_else(|| Self::new(builtin, PromptOrigin::Builtin))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> &PromptOrigin {
        &self.origin
    }

    /// SHA-256 of the template text, for logs.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Substitute `value` for `placeholder`. A template without the
    /// placeholder gets `value` appended under a `{label}:` line.
    pub fn render(&self, placeholder: &str, label: &str, value: &str) -> String {
        if self.text.contains(placeholder) {
            self.text.replace(placeholder, value)
        } else {
            format!("{}\n\n{}:\n{}", self.text, label, value)
        }
    }
}
