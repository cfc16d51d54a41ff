//! Markdown export of a session, plus the clipboard and file sinks
//!
//! Rendering is pure; the sinks are the only place export touches the
//! terminal or the filesystem.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, info};

/// Longest filename stem derived from a summary
const MAX_STEM_LEN: usize = 50;

/// Stem used when a summary has no usable characters
const FALLBACK_STEM: &str = "task";

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Render the session as a markdown checklist
pub fn render_markdown(summary: &str, steps: &[String], completed: &BTreeSet<usize>, generated_at: DateTime<Local>) -> String {
    debug!(steps = steps.len(), completed = completed.len(), "render_markdown: called");
    let mut doc = format!("# {}\n\n", summary);

    for (i, step) in steps.iter().enumerate() {
        let mark = if completed.contains(&i) { "x" } else { " " };
        doc.push_str(&format!("- [{}] **Step {}:** {}\n", mark, i + 1, step));
    }

    let done = (0..steps.len()).filter(|i| completed.contains(i)).count();
    doc.push_str(&format!("\nProgress: {} of {} steps complete\n", done, steps.len()));
    doc.push_str(&format!(
        "\n---\n*Generated by Unstuck on {}*\n",
        generated_at.format("%Y-%m-%d %H:%M")
    ));
    doc
}

/// Filesystem-safe markdown filename derived from a summary
pub fn filename(summary: &str) -> String {
    let mut stem = String::with_capacity(summary.len());
    let mut pending_sep = false;

    for c in summary.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !stem.is_empty() {
                stem.push('-');
            }
            pending_sep = false;
            stem.push(c);
        } else {
            pending_sep = true;
        }
    }

    // stem is ASCII, so byte truncation is safe
    stem.truncate(MAX_STEM_LEN);
    let stem = stem.trim_end_matches('-');

    if stem.is_empty() {
        format!("{}.md", FALLBACK_STEM)
    } else {
        format!("{}.md", stem)
    }
}

/// Destination for copied text
pub trait ClipboardSink: Send {
    fn copy(&self, text: &str) -> Result<(), ExportError>;
}

/// Destination for exported documents
pub trait DocumentSink: Send {
    /// Write the document, returning where it ended up
    fn save(&self, filename: &str, document: &str) -> Result<PathBuf, ExportError>;
}

/// Clipboard over the OSC 52 terminal escape sequence
pub struct Osc52Clipboard<W: Write + Send> {
    out: Mutex<W>,
}

impl Osc52Clipboard<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// OSC 52 "set clipboard" sequence for the given text
pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", BASE64_STANDARD.encode(text))
}

impl<W: Write + Send> ClipboardSink for Osc52Clipboard<W> {
    fn copy(&self, text: &str) -> Result<(), ExportError> {
        debug!(len = text.len(), "Osc52Clipboard::copy: called");
        let mut out = self
            .out
            .lock()
            .map_err(|_| ExportError::ClipboardUnavailable("writer lock poisoned".to_string()))?;
        out.write_all(osc52_sequence(text).as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// Writes documents into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DocumentSink for DirectorySink {
    fn save(&self, filename: &str, document: &str) -> Result<PathBuf, ExportError> {
        debug!(%filename, dir = %self.dir.display(), "DirectorySink::save: called");
        let path = self.dir.join(filename);

        fs::create_dir_all(&self.dir).map_err(|source| ExportError::Write {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, document).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "Exported document");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    fn kitchen() -> Vec<String> {
        vec!["Grab trash bag".to_string(), "Empty bin".to_string()]
    }

    #[test]
    fn test_render_marks_completed_steps_in_order() {
        let completed = BTreeSet::from([0]);
        let doc = render_markdown("Clean kitchen", &kitchen(), &completed, at());

        assert!(doc.starts_with("# Clean kitchen\n"));
        let first = doc.find("- [x] **Step 1:** Grab trash bag").unwrap();
        let second = doc.find("- [ ] **Step 2:** Empty bin").unwrap();
        assert!(first < second);
        assert!(doc.contains("Progress: 1 of 2 steps complete"));
        assert!(doc.contains("2026-03-14 09:30"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let completed = BTreeSet::from([1]);
        assert_eq!(
            render_markdown("x", &kitchen(), &completed, at()),
            render_markdown("x", &kitchen(), &completed, at())
        );
    }

    #[test]
    fn test_render_ignores_out_of_range_indices() {
        let completed = BTreeSet::from([0, 7]);
        let doc = render_markdown("x", &kitchen(), &completed, at());
        assert!(doc.contains("Progress: 1 of 2 steps complete"));
    }

    #[test]
    fn test_filename() {
        assert_eq!(filename("Clean the Kitchen!"), "clean-the-kitchen.md");
        assert_eq!(filename("  Do -- my   taxes?? "), "do-my-taxes.md");
        assert_eq!(filename("!!!"), "task.md");
        assert_eq!(filename(""), "task.md");
        assert_eq!(filename("Café plans"), "caf-plans.md");
    }

    #[test]
    fn test_filename_truncates() {
        let long = "word ".repeat(30);
        let name = filename(&long);
        let stem = name.strip_suffix(".md").unwrap();
        assert!(stem.len() <= MAX_STEM_LEN);
        assert!(!stem.ends_with('-'));
        assert!(stem.starts_with("word-word"));
    }

    #[test]
    fn test_osc52_clipboard_writes_sequence() {
        let clipboard = Osc52Clipboard::new(Vec::new());
        clipboard.copy("hello").unwrap();
        let written = String::from_utf8(clipboard.into_inner()).unwrap();
        assert_eq!(written, "\x1b]52;c;aGVsbG8=\x07");
    }

    #[test]
    fn test_directory_sink_writes_file() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path().join("exports"));

        let path = sink.save("clean-kitchen.md", "# Clean kitchen\n").unwrap();

        assert_eq!(path, dir.path().join("exports").join("clean-kitchen.md"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "# Clean kitchen\n");
    }

    #[test]
    fn test_directory_sink_reports_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let sink = DirectorySink::new(&blocker);
        assert!(matches!(sink.save("a.md", "x"), Err(ExportError::Write { .. })));
    }
}
