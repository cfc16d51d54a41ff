//! Application controller: owns all mutable state and the screen machine
//!
//! Every user intent arrives here as a method call. Network work is never
//! awaited inside the controller: a submission returns a [`BreakdownJob`]
//! that the caller runs elsewhere, and its [`JobResult`] comes back through
//! [`Controller::complete_submit`]. Only the outstanding job's result is
//! accepted, so a stale reply can never overwrite a newer session.
//!
//! ```text
//! Input --submit--> Loading --ok--> StepDetail <--> AllSteps
//!   ^                  |                 |              |
//!   +------failure-----+                 +--start over--+--> Input
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::breakdown::{Breakdown, BreakdownClient, BreakdownError};
use crate::dialog::{CredentialPrompt, Dialog, ExportPreview};
use crate::export::{self, ClipboardSink, DirectorySink, DocumentSink, Osc52Clipboard};
use crate::prefs::{Prefs, PrefsError, Theme};
use crate::session::{MarkOutcome, Screen, Session};
use crate::timer::{AudioSink, Chime, FallbackSink, NullSink, TickOutcome, Timer, TimerEvent};

pub const EMPTY_TASK_MESSAGE: &str = "Tell me what you're stuck on - even one sentence helps.";
pub const ALL_DONE_TOAST: &str = "All steps complete! Great work!";
pub const TIMES_UP_TOAST: &str = "Time's up! Take a moment to wrap up.";
pub const COPIED_TOAST: &str = "Copied to clipboard!";
pub const COPY_FAILED_TOAST: &str = "Failed to copy. Try again.";
pub const DOWNLOADED_TOAST: &str = "Downloaded!";
pub const DOWNLOAD_FAILED_TOAST: &str = "Failed to download. Try again.";
pub const KEY_SAVED_TOAST: &str = "API key saved!";
pub const KEY_CLEARED_TOAST: &str = "API key cleared";
pub const PREFS_FAILED_TOAST: &str = "Couldn't save settings.";

/// How long a toast stays visible
pub const TOAST_TTL: Duration = Duration::from_secs(3);

/// Short-lived notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub expires_at: Instant,
}

/// Side-effect destinations the controller writes to
pub struct Sinks {
    pub audio: Box<dyn AudioSink>,
    pub clipboard: Box<dyn ClipboardSink>,
    pub documents: Box<dyn DocumentSink>,
}

impl Sinks {
    /// Played chime (bell when no player), OSC 52 clipboard, and files under `export_dir`
    pub fn terminal(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio: Box::new(FallbackSink::default()),
            clipboard: Box::new(Osc52Clipboard::stdout()),
            documents: Box::new(DirectorySink::new(export_dir)),
        }
    }

    /// Silent audio, clipboard to a discarded buffer
    pub fn quiet(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio: Box::new(NullSink),
            clipboard: Box::new(Osc52Clipboard::new(std::io::sink())),
            documents: Box::new(DirectorySink::new(export_dir)),
        }
    }
}

/// A breakdown request ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownJob {
    pub id: u64,
    pub task: String,
    credential: String,
}

impl BreakdownJob {
    /// Perform the request; always resolves exactly once
    pub async fn run(self, client: BreakdownClient) -> JobResult {
        debug!(id = self.id, "BreakdownJob::run: called");
        let result = client.breakdown(&self.credential, &self.task).await;
        JobResult { id: self.id, result }
    }
}

/// Outcome of a [`BreakdownJob`]
#[derive(Debug, Clone)]
pub struct JobResult {
    pub id: u64,
    pub result: Result<Breakdown, BreakdownError>,
}

/// What a submission attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Moved to Loading; the job must be run
    Dispatched(BreakdownJob),
    /// No credential; the credential dialog is open
    NeedsCredential,
    /// Empty input; error message set
    Rejected,
    /// A breakdown is already in flight
    Busy,
}

/// Application controller
pub struct Controller {
    session: Session,
    timer: Timer,
    prefs: Prefs,
    client: BreakdownClient,
    fallback_credential: Option<String>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    tick_period: Option<Duration>,
    sinks: Sinks,
    dialog: Option<Dialog>,
    error: Option<String>,
    toasts: VecDeque<Toast>,
    task_input: String,
    in_flight: Option<u64>,
    next_job_id: u64,
    system_theme: Theme,
}

impl Controller {
    pub fn new(client: BreakdownClient, prefs: Prefs, sinks: Sinks, timer_tx: mpsc::UnboundedSender<TimerEvent>) -> Self {
        debug!(?prefs, "Controller::new: called");
        let timer = Timer::new(prefs.values().timer_minutes);
        Self {
            session: Session::new(),
            timer,
            prefs,
            client,
            fallback_credential: None,
            timer_tx,
            tick_period: None,
            sinks,
            dialog: None,
            error: None,
            toasts: VecDeque::new(),
            task_input: String::new(),
            in_flight: None,
            next_job_id: 1,
            system_theme: Theme::Dark,
        }
    }

    /// Credential used when none is stored in preferences
    pub fn with_fallback_credential(mut self, credential: Option<String>) -> Self {
        self.fallback_credential = credential;
        self
    }

    /// Theme assumed when no explicit theme is stored
    pub fn with_system_theme(mut self, theme: Theme) -> Self {
        self.system_theme = theme;
        self
    }

    /// Timer tick period override (tests)
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = Some(period);
        self.timer = self.fresh_timer();
        self
    }

    // === Accessors ===

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn screen(&self) -> Screen {
        self.session.screen
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn prefs(&self) -> &Prefs {
        &self.prefs
    }

    pub fn client(&self) -> &BreakdownClient {
        &self.client
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn dialog_mut(&mut self) -> Option<&mut Dialog> {
        self.dialog.as_mut()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn task_input(&self) -> &str {
        &self.task_input
    }

    pub fn task_input_mut(&mut self) -> &mut String {
        &mut self.task_input
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Theme in effect: the stored choice, else the system's
    pub fn theme(&self) -> Theme {
        self.prefs.values().theme.unwrap_or(self.system_theme)
    }

    /// Credential from preferences, else the fallback
    pub fn credential(&self) -> Option<&str> {
        self.prefs.credential().or(self.fallback_credential.as_deref())
    }

    fn fresh_timer(&self) -> Timer {
        let timer = Timer::new(self.prefs.values().timer_minutes);
        match self.tick_period {
            Some(period) => timer.with_tick_period(period),
            None => timer,
        }
    }

    // === Submission ===

    /// Submit whatever is in the task input field
    pub fn submit(&mut self) -> SubmitOutcome {
        let text = self.task_input.clone();
        self.begin_submit(&text)
    }

    /// Validate and dispatch a breakdown for `text`
    pub fn begin_submit(&mut self, text: &str) -> SubmitOutcome {
        debug!(text_len = text.len(), "Controller::begin_submit: called");
        if self.in_flight.is_some() {
            debug!("Controller::begin_submit: already in flight, rejecting");
            return SubmitOutcome::Busy;
        }

        let task = text.trim();
        if task.is_empty() {
            self.error = Some(EMPTY_TASK_MESSAGE.to_string());
            return SubmitOutcome::Rejected;
        }

        let Some(credential) = self.credential().map(str::to_string) else {
            info!("No credential available, asking for one");
            self.dialog = Some(Dialog::Credential(CredentialPrompt::resuming(task)));
            return SubmitOutcome::NeedsCredential;
        };

        self.error = None;
        self.session.begin(task);

        let id = self.next_job_id;
        self.next_job_id += 1;
        self.in_flight = Some(id);
        info!(id, task_len = task.len(), "Dispatching breakdown");

        SubmitOutcome::Dispatched(BreakdownJob {
            id,
            task: task.to_string(),
            credential,
        })
    }

    /// Apply a finished job; returns false if the result was stale
    pub fn complete_submit(&mut self, job: JobResult) -> bool {
        debug!(id = job.id, in_flight = ?self.in_flight, "Controller::complete_submit: called");
        if self.in_flight != Some(job.id) {
            debug!(id = job.id, "Controller::complete_submit: stale result ignored");
            return false;
        }
        self.in_flight = None;

        match job.result {
            Ok(breakdown) => {
                info!(steps = breakdown.steps.len(), "Breakdown applied");
                self.session.populate(breakdown);
                // Same timer keeps its run counter, so queued ticks stay stale
                self.timer.reset();
                self.timer.set_duration(self.prefs.values().timer_minutes);
                self.error = None;
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Breakdown failed");
                self.error = Some(e.user_message());
                self.task_input.clear();
                self.session.screen = Screen::Input;
            }
        }
        true
    }

    // === Dialogs ===

    /// Open the credential dialog from settings
    pub fn open_credential_dialog(&mut self) {
        debug!("Controller::open_credential_dialog: called");
        self.dialog = Some(Dialog::Credential(CredentialPrompt::new()));
    }

    /// Save the typed key and resume any pending submission
    ///
    /// A blank key leaves the dialog open and returns `None`.
    pub fn confirm_credential(&mut self) -> Option<SubmitOutcome> {
        debug!("Controller::confirm_credential: called");
        let (key, resume) = match &self.dialog {
            Some(Dialog::Credential(prompt)) => (prompt.key()?.to_string(), prompt.resume.clone()),
            _ => return None,
        };

        self.dialog = None;
        self.set_credential(&key);
        resume.map(|task| self.begin_submit(&task))
    }

    /// Close whatever dialog is open, leaving everything else unchanged
    pub fn close_dialog(&mut self) {
        if let Some(dialog) = self.dialog.take() {
            debug!(title = dialog.title(), "Controller::close_dialog: closed");
        }
    }

    // === Step navigation ===

    pub fn advance(&mut self) {
        if self.session.advance() {
            self.timer.reset();
        }
    }

    pub fn back(&mut self) {
        if self.session.back() {
            self.timer.reset();
        }
    }

    pub fn mark_done(&mut self) -> MarkOutcome {
        let outcome = self.session.mark_current_done();
        debug!(?outcome, "Controller::mark_done: called");
        match outcome {
            MarkOutcome::Advanced => self.timer.reset(),
            MarkOutcome::Finished => self.push_toast(ALL_DONE_TOAST),
            MarkOutcome::AlreadyFinished | MarkOutcome::Empty => {}
        }
        outcome
    }

    pub fn show_all_steps(&mut self) {
        if self.session.screen.is_detail() {
            self.session.screen = Screen::AllSteps;
        }
    }

    pub fn show_step_detail(&mut self) {
        if self.session.screen.is_detail() {
            self.session.screen = Screen::StepDetail;
        }
    }

    pub fn toggle_step(&mut self, index: usize) -> bool {
        self.session.toggle(index)
    }

    /// Clear the session and timer and return to input
    pub fn start_over(&mut self) {
        info!("Starting over");
        self.session.reset();
        self.timer.reset();
        self.task_input.clear();
        self.error = None;
        self.dialog = None;
        self.in_flight = None;
    }

    // === Timer ===

    pub fn start_timer(&mut self) -> bool {
        self.timer.start(self.timer_tx.clone())
    }

    pub fn pause_timer(&mut self) {
        self.timer.pause();
    }

    pub fn reset_timer(&mut self) {
        self.timer.reset();
    }

    /// Start when stopped, pause when running
    pub fn toggle_timer(&mut self) {
        if self.timer.is_running() {
            self.pause_timer();
        } else {
            self.start_timer();
        }
    }

    /// Feed a ticker event into the timer; plays the chime on completion
    pub fn on_timer_event(&mut self, event: TimerEvent) -> TickOutcome {
        let TimerEvent::Tick { run } = event;
        let outcome = self.timer.tick(run);
        if outcome == TickOutcome::Finished {
            info!("Timer finished");
            if self.prefs.values().sound_enabled
                && let Err(e) = self.sinks.audio.play(&Chime::default())
            {
                warn!(error = %e, "Could not play chime");
            }
            self.push_toast(TIMES_UP_TOAST);
        }
        outcome
    }

    // === Export ===

    fn render_export(&self) -> (String, String) {
        let document = export::render_markdown(
            &self.session.task_summary,
            &self.session.steps,
            &self.session.completed,
            Local::now(),
        );
        (document, export::filename(&self.session.task_summary))
    }

    /// Open the export preview
    pub fn open_export(&mut self) {
        debug!("Controller::open_export: called");
        if !self.session.has_steps() {
            return;
        }
        let (document, filename) = self.render_export();
        self.dialog = Some(Dialog::Export(ExportPreview::new(document, filename)));
    }

    fn export_payload(&self) -> (String, String) {
        match &self.dialog {
            Some(Dialog::Export(preview)) => (preview.document.clone(), preview.filename.clone()),
            _ => self.render_export(),
        }
    }

    pub fn export_copy(&mut self) -> bool {
        let (document, _) = self.export_payload();
        match self.sinks.clipboard.copy(&document) {
            Ok(()) => {
                self.push_toast(COPIED_TOAST);
                true
            }
            Err(e) => {
                warn!(error = %e, "Copy failed");
                self.push_toast(COPY_FAILED_TOAST);
                false
            }
        }
    }

    pub fn export_download(&mut self) -> Option<PathBuf> {
        let (document, filename) = self.export_payload();
        match self.sinks.documents.save(&filename, &document) {
            Ok(path) => {
                self.push_toast(DOWNLOADED_TOAST);
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "Download failed");
                self.push_toast(DOWNLOAD_FAILED_TOAST);
                None
            }
        }
    }

    // === Preferences ===

    fn persisted(&mut self, result: Result<(), PrefsError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to persist preference");
                self.push_toast(PREFS_FAILED_TOAST);
                false
            }
        }
    }

    pub fn set_credential(&mut self, key: &str) {
        let result = self.prefs.set_credential(key);
        if self.persisted(result) {
            self.push_toast(KEY_SAVED_TOAST);
        }
    }

    pub fn clear_credential(&mut self) {
        let result = self.prefs.clear_credential();
        if self.persisted(result) {
            self.push_toast(KEY_CLEARED_TOAST);
        }
    }

    /// Store a new timer length and reset the live timer to it
    pub fn set_timer_minutes(&mut self, minutes: u32) {
        let result = self.prefs.set_timer_minutes(minutes);
        self.persisted(result);
        self.timer.set_duration(self.prefs.values().timer_minutes);
        self.timer.reset();
    }

    pub fn adjust_timer_minutes(&mut self, delta: i32) {
        let current = self.prefs.values().timer_minutes as i64;
        let minutes = (current + delta as i64).clamp(1, u32::MAX as i64) as u32;
        self.set_timer_minutes(minutes);
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        let result = self.prefs.set_sound_enabled(enabled);
        self.persisted(result);
    }

    pub fn toggle_sound(&mut self) {
        let enabled = !self.prefs.values().sound_enabled;
        self.set_sound_enabled(enabled);
    }

    /// Flip to the opposite of the theme in effect and store it
    pub fn toggle_theme(&mut self) -> Theme {
        let next = Theme::toggled(self.prefs.values().theme, self.system_theme);
        let result = self.prefs.set_theme(Some(next));
        self.persisted(result);
        next
    }

    // === Toasts ===

    pub fn push_toast(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "Controller::push_toast: called");
        self.toasts.push_back(Toast {
            message,
            expires_at: Instant::now() + TOAST_TTL,
        });
    }

    /// Drop toasts that expired by `now`
    pub fn expire_toasts(&mut self, now: Instant) {
        self.toasts.retain(|t| t.expires_at > now);
    }

    pub fn toasts(&self) -> impl DoubleEndedIterator<Item = &Toast> {
        self.toasts.iter()
    }
}
