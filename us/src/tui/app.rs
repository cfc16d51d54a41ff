//! TUI application - key handling
//!
//! The App wraps the controller and turns key events into controller calls.
//! It does not do any rendering - that's delegated to the views module.
//! Work that must leave the UI thread (breakdown jobs) is parked in
//! `pending_job` for the runner to pick up.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::seq::IndexedRandom;
use tracing::{debug, info};

use crate::controller::{BreakdownJob, Controller, SubmitOutcome};
use crate::dialog::{Dialog, ExportAction};
use crate::session::Screen;

/// Words shown while waiting for a breakdown
pub const LOADING_WORDS: &[&str] = &[
    "Breaking it down",
    "Untangling",
    "Finding step one",
    "Shrinking the mountain",
    "Sorting it out",
    "Making it smaller",
];

/// TUI application
pub struct App {
    controller: Controller,
    /// Highlighted row on the all-steps screen
    cursor: usize,
    /// Word shown on the loading screen
    loading_word: String,
    /// Poll ticks seen, drives the spinner
    ticks: u64,
    /// Job waiting to be spawned by the runner
    pending_job: Option<BreakdownJob>,
    should_quit: bool,
}

impl App {
    pub fn new(controller: Controller) -> Self {
        debug!("App::new: called");
        Self {
            controller,
            cursor: 0,
            loading_word: LOADING_WORDS[0].to_string(),
            ticks: 0,
            pending_job: None,
            should_quit: false,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn loading_word(&self) -> &str {
        &self.loading_word
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn take_pending_job(&mut self) -> Option<BreakdownJob> {
        self.pending_job.take()
    }

    /// Advance animation state
    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
    }

    /// Whether keystrokes currently go into a text field
    pub fn has_text_focus(&self) -> bool {
        match self.controller.dialog() {
            Some(dialog) => dialog.has_text_focus(),
            None => self.controller.screen() == Screen::Input,
        }
    }

    /// Handle a key event
    ///
    /// Returns true if the application should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        debug!(?key, "App::handle_key: called");
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            debug!("App::handle_key: Ctrl+C force quit");
            return true;
        }

        // Esc dismisses any dialog, whatever the screen
        if key.code == KeyCode::Esc && self.controller.dialog().is_some() {
            self.controller.close_dialog();
            return false;
        }

        match self.controller.dialog() {
            Some(Dialog::Credential(_)) => {
                self.handle_credential_key(key);
                return false;
            }
            Some(Dialog::Export(_)) => {
                self.handle_export_key(key);
                return false;
            }
            None => {}
        }

        if self.handle_settings_key(key) {
            return false;
        }

        if key.code == KeyCode::Char('q') && key.modifiers.is_empty() && !self.has_text_focus() {
            debug!("App::handle_key: quit requested");
            self.should_quit = true;
            return true;
        }

        match self.controller.screen() {
            Screen::Input => self.handle_input_key(key),
            Screen::Loading => {}
            Screen::StepDetail => self.handle_step_key(key),
            Screen::AllSteps => self.handle_all_steps_key(key),
        }
        self.should_quit
    }

    /// Preference shortcuts available on every screen
    fn handle_settings_key(&mut self, key: KeyEvent) -> bool {
        if !key.modifiers.contains(KeyModifiers::CONTROL) {
            return false;
        }
        match key.code {
            KeyCode::Char('k') => self.controller.open_credential_dialog(),
            KeyCode::Char('s') => self.controller.toggle_sound(),
            KeyCode::Char('t') => {
                let theme = self.controller.toggle_theme();
                debug!(?theme, "App::handle_settings_key: theme toggled");
            }
            KeyCode::Up => self.controller.adjust_timer_minutes(1),
            KeyCode::Down => self.controller.adjust_timer_minutes(-1),
            _ => return false,
        }
        true
    }

    fn dispatch(&mut self, outcome: SubmitOutcome) {
        debug!(?outcome, "App::dispatch: called");
        if let SubmitOutcome::Dispatched(job) = outcome {
            let mut rng = rand::rng();
            self.loading_word = LOADING_WORDS.choose(&mut rng).unwrap_or(&"Thinking").to_string();
            info!(id = job.id, "Queued breakdown job");
            self.pending_job = Some(job);
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, m) if m.contains(KeyModifiers::ALT) || m.contains(KeyModifiers::SHIFT) => {
                self.controller.task_input_mut().push('\n');
            }
            (KeyCode::Enter, _) => {
                let outcome = self.controller.submit();
                self.dispatch(outcome);
            }
            (KeyCode::Backspace, _) => {
                self.controller.task_input_mut().pop();
            }
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.controller.task_input_mut().clear();
            }
            (KeyCode::Char(c), m) if !m.contains(KeyModifiers::CONTROL) => {
                self.controller.task_input_mut().push(c);
            }
            _ => {}
        }
    }

    fn handle_step_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Right | KeyCode::Char('n') => self.controller.advance(),
            KeyCode::Left | KeyCode::Char('p') => self.controller.back(),
            KeyCode::Char(' ') | KeyCode::Enter => self.controller.toggle_timer(),
            KeyCode::Char('r') => self.controller.reset_timer(),
            KeyCode::Char('d') => {
                self.controller.mark_done();
            }
            KeyCode::Char('a') => {
                self.cursor = self.controller.session().current;
                self.controller.show_all_steps();
            }
            KeyCode::Char('e') => self.controller.open_export(),
            KeyCode::Char('s') => self.start_over(),
            _ => {}
        }
    }

    fn handle_all_steps_key(&mut self, key: KeyEvent) {
        let last = self.controller.session().step_count().saturating_sub(1);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.cursor = (self.cursor + 1).min(last),
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.controller.toggle_step(self.cursor);
            }
            KeyCode::Char('f') => self.controller.show_step_detail(),
            KeyCode::Char('e') => self.controller.open_export(),
            KeyCode::Char('s') => self.start_over(),
            _ => {}
        }
    }

    fn start_over(&mut self) {
        self.cursor = 0;
        self.pending_job = None;
        self.controller.start_over();
    }

    fn handle_credential_key(&mut self, key: KeyEvent) {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => {
                if let Some(outcome) = self.controller.confirm_credential() {
                    self.dispatch(outcome);
                }
            }
            (KeyCode::Char('r'), KeyModifiers::CONTROL) => {
                if let Some(Dialog::Credential(prompt)) = self.controller.dialog_mut() {
                    prompt.toggle_reveal();
                }
            }
            (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
                self.controller.clear_credential();
                self.controller.close_dialog();
            }
            (KeyCode::Backspace, _) => {
                if let Some(Dialog::Credential(prompt)) = self.controller.dialog_mut() {
                    prompt.pop();
                }
            }
            (KeyCode::Char(c), m) if !m.contains(KeyModifiers::CONTROL) => {
                if let Some(Dialog::Credential(prompt)) = self.controller.dialog_mut() {
                    prompt.push(c);
                }
            }
            _ => {}
        }
    }

    fn handle_export_key(&mut self, key: KeyEvent) {
        let action = match self.controller.dialog_mut() {
            Some(Dialog::Export(preview)) => match key.code {
                KeyCode::Tab | KeyCode::Right => {
                    preview.selected = preview.selected.next();
                    None
                }
                KeyCode::BackTab | KeyCode::Left => {
                    preview.selected = preview.selected.prev();
                    None
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    preview.scroll_down();
                    None
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    preview.scroll_up();
                    None
                }
                KeyCode::Enter => Some(preview.selected),
                KeyCode::Char('c') => Some(ExportAction::Copy),
                KeyCode::Char('d') => Some(ExportAction::Download),
                _ => None,
            },
            _ => None,
        };

        match action {
            Some(ExportAction::Copy) => {
                self.controller.export_copy();
            }
            Some(ExportAction::Download) => {
                self.controller.export_download();
            }
            Some(ExportAction::Cancel) => self.controller.close_dialog(),
            None => {}
        }
    }
}
