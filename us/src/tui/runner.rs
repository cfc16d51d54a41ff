//! TUI Runner - main loop that owns the terminal
//!
//! The TuiRunner is responsible for:
//! - Drawing the current state every iteration
//! - Dispatching key events to App
//! - Feeding timer ticks into the controller
//! - Spawning breakdown jobs and delivering their results

use std::time::{Duration, Instant};

use eyre::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::controller::JobResult;
use crate::timer::TimerEvent;

use super::Tui;
use super::app::App;
use super::events::{Event, EventHandler};
use super::views;

/// Input poll interval; also the redraw rate while idle
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// TUI Runner that manages the terminal and event loop
pub struct TuiRunner {
    app: App,
    terminal: Tui,
    event_handler: EventHandler,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    job_tx: mpsc::UnboundedSender<JobResult>,
    job_rx: mpsc::UnboundedReceiver<JobResult>,
}

impl TuiRunner {
    pub fn new(terminal: Tui, app: App, timer_rx: mpsc::UnboundedReceiver<TimerEvent>) -> Self {
        debug!("TuiRunner::new: called");
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        Self {
            app,
            terminal,
            event_handler: EventHandler::new(POLL_INTERVAL),
            timer_rx,
            job_tx,
            job_rx,
        }
    }

    /// Run the TUI main loop
    pub async fn run(&mut self) -> Result<()> {
        debug!("TuiRunner::run: entering main loop");
        loop {
            self.app.controller_mut().expire_toasts(Instant::now());
            self.terminal.draw(|frame| views::render(&self.app, frame))?;

            tokio::select! {
                event = self.event_handler.next() => {
                    match event? {
                        Event::Tick => self.app.tick(),
                        Event::Key(key_event) => {
                            if self.app.handle_key(key_event) {
                                break;
                            }
                        }
                        Event::Resize(width, height) => {
                            trace!(width, height, "TuiRunner::run: resize");
                        }
                    }
                }
                Some(event) = self.timer_rx.recv() => {
                    self.app.controller_mut().on_timer_event(event);
                }
                Some(result) = self.job_rx.recv() => {
                    debug!(id = result.id, ok = result.result.is_ok(), "TuiRunner::run: job finished");
                    self.app.controller_mut().complete_submit(result);
                }
            }

            self.spawn_pending_job();

            if self.app.should_quit() {
                debug!("TuiRunner::run: should_quit is true, breaking");
                break;
            }
        }

        debug!("TuiRunner::run: exiting");
        Ok(())
    }

    /// Run any job the app queued on a background task
    fn spawn_pending_job(&mut self) {
        let Some(job) = self.app.take_pending_job() else {
            return;
        };
        info!(id = job.id, "Spawning breakdown job");
        let client = self.app.controller().client().clone();
        let tx = self.job_tx.clone();
        tokio::spawn(async move {
            let result = job.run(client).await;
            if tx.send(result).is_err() {
                debug!("breakdown job: runner gone, dropping result");
            }
        });
    }
}
