//! Modal dialogs: credential entry and export preview
//!
//! At most one dialog is open at a time. Dialogs hold their own input state
//! and never touch the session; the controller acts on what they return.

use tracing::debug;

/// An open modal dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Credential(CredentialPrompt),
    Export(ExportPreview),
}

impl Dialog {
    /// Title shown in the dialog frame
    pub fn title(&self) -> &'static str {
        match self {
            Self::Credential(_) => " Gemini API key ",
            Self::Export(_) => " Export ",
        }
    }

    /// Whether the dialog owns a text field
    pub fn has_text_focus(&self) -> bool {
        matches!(self, Self::Credential(_))
    }
}

/// Credential entry, optionally resuming a submission once a key is supplied
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialPrompt {
    /// Key typed so far
    pub input: String,

    /// Task text to re-submit after the key is saved
    pub resume: Option<String>,

    /// Show the key in clear text
    pub reveal: bool,
}

impl std::fmt::Debug for CredentialPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPrompt")
            .field("input_len", &self.input.len())
            .field("resume", &self.resume.is_some())
            .field("reveal", &self.reveal)
            .finish()
    }
}

impl CredentialPrompt {
    /// Prompt opened from settings; nothing to resume
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompt opened because a submission had no credential
    pub fn resuming(task: impl Into<String>) -> Self {
        let task = task.into();
        debug!(task_len = task.len(), "CredentialPrompt::resuming: called");
        Self {
            resume: Some(task),
            ..Self::default()
        }
    }

    pub fn push(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn pop(&mut self) {
        self.input.pop();
    }

    pub fn toggle_reveal(&mut self) {
        self.reveal = !self.reveal;
    }

    /// Trimmed key, if anything usable was typed
    pub fn key(&self) -> Option<&str> {
        let key = self.input.trim();
        (!key.is_empty()).then_some(key)
    }

    /// Input as it should be displayed
    pub fn display(&self) -> String {
        if self.reveal {
            self.input.clone()
        } else {
            "•".repeat(self.input.chars().count())
        }
    }
}

/// Buttons on the export dialog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportAction {
    #[default]
    Copy,
    Download,
    Cancel,
}

impl ExportAction {
    pub const ALL: [ExportAction; 3] = [Self::Copy, Self::Download, Self::Cancel];

    pub fn label(self) -> &'static str {
        match self {
            Self::Copy => "Copy",
            Self::Download => "Download",
            Self::Cancel => "Cancel",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Copy => Self::Download,
            Self::Download => Self::Cancel,
            Self::Cancel => Self::Copy,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Copy => Self::Cancel,
            Self::Download => Self::Copy,
            Self::Cancel => Self::Download,
        }
    }
}

/// Rendered export with its derived filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPreview {
    pub document: String,
    pub filename: String,
    pub selected: ExportAction,
    pub scroll: u16,
}

impl ExportPreview {
    pub fn new(document: String, filename: String) -> Self {
        debug!(%filename, "ExportPreview::new: called");
        Self {
            document,
            filename,
            selected: ExportAction::default(),
            scroll: 0,
        }
    }

    pub fn scroll_down(&mut self) {
        let max = self.document.lines().count().saturating_sub(1) as u16;
        self.scroll = (self.scroll + 1).min(max);
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_prompt_key_is_trimmed() {
        let mut prompt = CredentialPrompt::new();
        assert_eq!(prompt.key(), None);

        for c in "  abc ".chars() {
            prompt.push(c);
        }
        assert_eq!(prompt.key(), Some("abc"));

        prompt.input = "   ".to_string();
        assert_eq!(prompt.key(), None);
    }

    #[test]
    fn test_credential_prompt_masks_input() {
        let mut prompt = CredentialPrompt::resuming("my task");
        prompt.push('k');
        prompt.push('e');
        prompt.push('y');
        assert_eq!(prompt.display(), "•••");
        assert_eq!(prompt.resume.as_deref(), Some("my task"));

        prompt.toggle_reveal();
        assert_eq!(prompt.display(), "key");

        prompt.pop();
        assert_eq!(prompt.input, "ke");
    }

    #[test]
    fn test_credential_prompt_debug_hides_key() {
        let mut prompt = CredentialPrompt::new();
        prompt.input = "secret-key".to_string();
        assert!(!format!("{:?}", prompt).contains("secret-key"));
    }

    #[test]
    fn test_export_action_cycles() {
        let mut action = ExportAction::default();
        for expected in [ExportAction::Download, ExportAction::Cancel, ExportAction::Copy] {
            action = action.next();
            assert_eq!(action, expected);
        }
        assert_eq!(ExportAction::Copy.prev(), ExportAction::Cancel);
    }

    #[test]
    fn test_export_preview_scroll_is_bounded() {
        let mut preview = ExportPreview::new("a\nb\nc".to_string(), "x.md".to_string());
        preview.scroll_up();
        assert_eq!(preview.scroll, 0);
        for _ in 0..10 {
            preview.scroll_down();
        }
        assert_eq!(preview.scroll, 2);
    }

    #[test]
    fn test_text_focus() {
        assert!(Dialog::Credential(CredentialPrompt::new()).has_text_focus());
        assert!(!Dialog::Export(ExportPreview::new(String::new(), "task.md".to_string())).has_text_focus());
    }
}
