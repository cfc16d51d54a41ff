//! Countdown timer for focused work on a single step
//!
//! The timer owns its duration, remaining time and running flag. While
//! running, a background tokio task delivers one [`TimerEvent::Tick`] per
//! period on the owner's channel; the owner feeds each event back through
//! [`Timer::tick`], which is the only place remaining time decreases.
//!
//! ```text
//! idle-full --start--> running --tick(0)--> finished
//!                      |    ^
//!                  pause    start
//!                      v    |
//!                      paused
//! {running, paused, finished} --reset--> idle-full
//! ```

mod chime;

pub use chime::{AudioError, AudioSink, BellSink, Chime, FallbackSink, NullSink, PlayerSink, Tone};

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default focus block in minutes
pub const DEFAULT_MINUTES: u32 = 15;

/// Countdown granularity
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Observable timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Stopped with the full duration remaining
    IdleFull,
    /// Counting down
    Running,
    /// Stopped part-way through
    Paused,
    /// Reached zero
    Finished,
}

/// Event emitted by the ticker task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One period elapsed for the given run
    Tick { run: u64 },
}

/// Result of applying a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting; carries the new remaining seconds
    Running(u32),
    /// Reached zero on this tick
    Finished,
    /// Tick belonged to a stale run or the timer is stopped
    Ignored,
}

/// Countdown timer bound to one live ticker task at most
#[derive(Debug)]
pub struct Timer {
    duration: u32,
    remaining: u32,
    running: bool,
    run: u64,
    tick_period: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl Timer {
    /// Create a stopped timer with the given duration in minutes
    pub fn new(minutes: u32) -> Self {
        debug!(minutes, "Timer::new: called");
        let duration = minutes_to_secs(minutes);
        Self {
            duration,
            remaining: duration,
            running: false,
            run: 0,
            tick_period: TICK_PERIOD,
            ticker: None,
        }
    }

    /// Override the tick period (tests use milliseconds)
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Total configured duration in seconds
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Remaining seconds
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Identifier of the current run; ticks carrying another id are stale
    pub fn current_run(&self) -> u64 {
        self.run
    }

    pub fn state(&self) -> TimerState {
        if self.running {
            TimerState::Running
        } else if self.remaining == 0 {
            TimerState::Finished
        } else if self.remaining == self.duration {
            TimerState::IdleFull
        } else {
            TimerState::Paused
        }
    }

    /// Replace the total duration
    ///
    /// A stopped timer is refilled to the new total. A running timer keeps
    /// counting, clamped so remaining never exceeds the new total.
    pub fn set_duration(&mut self, minutes: u32) {
        debug!(minutes, running = self.running, "Timer::set_duration: called");
        self.duration = minutes_to_secs(minutes);
        if self.running {
            self.remaining = self.remaining.min(self.duration);
        } else {
            self.remaining = self.duration;
        }
    }

    /// Start or resume the countdown, delivering ticks on `tx`
    ///
    /// Returns false when already running or finished (reset first).
    pub fn start(&mut self, tx: mpsc::UnboundedSender<TimerEvent>) -> bool {
        debug!(remaining = self.remaining, "Timer::start: called");
        let Some(run) = self.begin_run() else {
            return false;
        };

        let period = self.tick_period;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tx.send(TimerEvent::Tick { run }).is_err() {
                    debug!(run, "Timer ticker: receiver dropped, exiting");
                    break;
                }
            }
        }));
        true
    }

    /// Flip into the running state without spawning a ticker
    fn begin_run(&mut self) -> Option<u64> {
        if self.running {
            debug!("Timer::begin_run: already running, no-op");
            return None;
        }
        if self.remaining == 0 {
            debug!("Timer::begin_run: finished, reset required");
            return None;
        }
        self.run += 1;
        self.running = true;
        Some(self.run)
    }

    /// Apply one tick from the ticker task
    pub fn tick(&mut self, run: u64) -> TickOutcome {
        trace!(run, current = self.run, remaining = self.remaining, "Timer::tick: called");
        if !self.running || run != self.run {
            return TickOutcome::Ignored;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.complete();
            TickOutcome::Finished
        } else {
            TickOutcome::Running(self.remaining)
        }
    }

    /// Stop counting, keeping remaining time
    pub fn pause(&mut self) {
        debug!(remaining = self.remaining, "Timer::pause: called");
        self.running = false;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    /// Stop and refill to the full duration
    pub fn reset(&mut self) {
        debug!("Timer::reset: called");
        self.pause();
        self.remaining = self.duration;
    }

    fn complete(&mut self) {
        debug!(run = self.run, "Timer::complete: called");
        self.pause();
        self.remaining = 0;
    }

    /// Remaining time as `m:ss`
    pub fn formatted(&self) -> String {
        format_time(self.remaining)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(DEFAULT_MINUTES)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

fn minutes_to_secs(minutes: u32) -> u32 {
    minutes.max(1).saturating_mul(60)
}

/// Format seconds as `m:ss`
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run_to_zero(timer: &mut Timer) -> usize {
        let run = timer.begin_run().unwrap();
        let mut finished = 0;
        for _ in 0..timer.duration() {
            if timer.tick(run) == TickOutcome::Finished {
                finished += 1;
            }
        }
        finished
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(59), "0:59");
        assert_eq!(format_time(60), "1:00");
        assert_eq!(format_time(125), "2:05");
        assert_eq!(format_time(15 * 60), "15:00");
    }

    #[test]
    fn test_new_timer_is_idle_full() {
        let timer = Timer::new(15);
        assert_eq!(timer.duration(), 900);
        assert_eq!(timer.remaining(), 900);
        assert_eq!(timer.state(), TimerState::IdleFull);
        assert_eq!(timer.formatted(), "15:00");
    }

    #[test]
    fn test_zero_minutes_clamps_to_one() {
        let timer = Timer::new(0);
        assert_eq!(timer.duration(), 60);
    }

    #[test]
    fn test_runs_to_finished_exactly_once() {
        let mut timer = Timer::new(2);
        assert_eq!(run_to_zero(&mut timer), 1);
        assert_eq!(timer.state(), TimerState::Finished);
        assert_eq!(timer.remaining(), 0);

        // Extra ticks after completion do nothing
        assert_eq!(timer.tick(timer.current_run()), TickOutcome::Ignored);
        assert_eq!(timer.remaining(), 0);
    }

    #[test]
    fn test_tick_reports_remaining() {
        let mut timer = Timer::new(1);
        let run = timer.begin_run().unwrap();
        assert_eq!(timer.tick(run), TickOutcome::Running(59));
        assert_eq!(timer.tick(run), TickOutcome::Running(58));
    }

    #[test]
    fn test_pause_keeps_remaining_and_resume_continues() {
        let mut timer = Timer::new(1);
        let run = timer.begin_run().unwrap();
        timer.tick(run);
        timer.tick(run);
        timer.pause();
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.remaining(), 58);

        // Pause is idempotent
        timer.pause();
        assert_eq!(timer.remaining(), 58);

        let resumed = timer.begin_run().unwrap();
        assert_eq!(timer.tick(resumed), TickOutcome::Running(57));
    }

    #[test]
    fn test_stale_ticks_are_ignored() {
        let mut timer = Timer::new(1);
        let first = timer.begin_run().unwrap();
        timer.pause();
        let second = timer.begin_run().unwrap();
        assert_ne!(first, second);
        assert_eq!(timer.tick(first), TickOutcome::Ignored);
        assert_eq!(timer.remaining(), 60);
        assert_eq!(timer.tick(second), TickOutcome::Running(59));
    }

    #[test]
    fn test_begin_run_is_noop_when_running() {
        let mut timer = Timer::new(1);
        assert!(timer.begin_run().is_some());
        assert!(timer.begin_run().is_none());
    }

    #[test]
    fn test_finished_timer_needs_reset() {
        let mut timer = Timer::new(1);
        run_to_zero(&mut timer);
        assert!(timer.begin_run().is_none());

        timer.reset();
        assert_eq!(timer.state(), TimerState::IdleFull);
        assert!(timer.begin_run().is_some());
    }

    #[test]
    fn test_set_duration_when_stopped_refills() {
        let mut timer = Timer::new(15);
        let run = timer.begin_run().unwrap();
        timer.tick(run);
        timer.pause();
        timer.set_duration(5);
        assert_eq!(timer.duration(), 300);
        assert_eq!(timer.remaining(), 300);
    }

    #[test]
    fn test_set_duration_while_running_keeps_countdown() {
        let mut timer = Timer::new(15);
        let run = timer.begin_run().unwrap();
        timer.tick(run);
        timer.set_duration(20);
        assert_eq!(timer.remaining(), 899);

        timer.set_duration(1);
        assert_eq!(timer.remaining(), 60);
        assert!(timer.is_running());
    }

    #[tokio::test]
    async fn test_start_delivers_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new(1).with_tick_period(Duration::from_millis(5));
        assert!(timer.start(tx.clone()));
        assert!(!timer.start(tx));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("tick should arrive")
            .expect("channel open");
        let TimerEvent::Tick { run } = event;
        assert_eq!(run, timer.current_run());
        assert_eq!(timer.tick(run), TickOutcome::Running(59));
        timer.pause();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Start,
        Pause,
        Reset,
        Tick,
        SetDuration(u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Start),
            Just(Op::Pause),
            Just(Op::Reset),
            Just(Op::Tick),
            (1u32..5).prop_map(Op::SetDuration),
        ]
    }

    proptest! {
        #[test]
        fn prop_remaining_stays_in_bounds(minutes in 1u32..4, ops in prop::collection::vec(op(), 0..400)) {
            let mut timer = Timer::new(minutes);
            for op in ops {
                match op {
                    Op::Start => { timer.begin_run(); }
                    Op::Pause => timer.pause(),
                    Op::Reset => timer.reset(),
                    Op::Tick => { timer.tick(timer.current_run()); }
                    Op::SetDuration(m) => timer.set_duration(m),
                }
                prop_assert!(timer.remaining() <= timer.duration());
                if timer.state() == TimerState::Finished {
                    prop_assert_eq!(timer.remaining(), 0);
                }
            }
        }

        #[test]
        fn prop_full_run_finishes_once(minutes in 1u32..6) {
            let mut timer = Timer::new(minutes);
            prop_assert_eq!(run_to_zero(&mut timer), 1);
            prop_assert_eq!(timer.state(), TimerState::Finished);
        }
    }
}
