//! In-memory session: the current task, its steps and progress

use std::collections::BTreeSet;

use tracing::debug;

use crate::breakdown::Breakdown;

/// Which of the four screens is showing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Input,
    Loading,
    StepDetail,
    AllSteps,
}

impl Screen {
    /// Screens that show a populated session
    pub fn is_detail(self) -> bool {
        matches!(self, Self::StepDetail | Self::AllSteps)
    }
}

/// What marking the current step done did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Marked and moved to the next step
    Advanced,
    /// Marked the final step
    Finished,
    /// Final step was already complete; nothing changed
    AlreadyFinished,
    /// No steps loaded
    Empty,
}

/// One task's worth of state; lives only for the process lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Current screen
    pub screen: Screen,

    /// Task text as the user submitted it
    pub task: String,

    /// Short summary from the breakdown
    pub task_summary: String,

    /// Ordered step descriptions
    pub steps: Vec<String>,

    /// Indices of completed steps; free-form, not a prefix
    pub completed: BTreeSet<usize>,

    /// Index of the step in focus
    pub current: usize,

    /// Encouragement line from the breakdown
    pub encouragement: String,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare for a new submission: remember the task, clear progress
    pub fn begin(&mut self, task: &str) {
        debug!(task_len = task.len(), "Session::begin: called");
        self.task = task.to_string();
        self.current = 0;
        self.completed.clear();
        self.screen = Screen::Loading;
    }

    /// Replace the plan wholesale with a successful breakdown
    pub fn populate(&mut self, breakdown: Breakdown) {
        debug!(steps = breakdown.steps.len(), "Session::populate: called");
        self.task_summary = breakdown.task_summary;
        self.steps = breakdown.steps;
        self.encouragement = breakdown.encouragement;
        self.current = 0;
        self.completed.clear();
        self.screen = Screen::StepDetail;
    }

    /// Clear everything and go back to input
    pub fn reset(&mut self) {
        debug!("Session::reset: called");
        *self = Self::default();
    }

    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn current_step(&self) -> Option<&str> {
        self.steps.get(self.current).map(String::as_str)
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.has_steps() && self.current + 1 == self.steps.len()
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    /// Number of completed steps that exist in the plan
    pub fn completed_count(&self) -> usize {
        self.completed.iter().filter(|&&i| i < self.steps.len()).count()
    }

    /// Position through the plan, 1-based current over total
    pub fn progress_ratio(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        (self.current + 1) as f64 / self.steps.len() as f64
    }

    /// Move to the next step; false on the final step
    pub fn advance(&mut self) -> bool {
        if self.has_steps() && !self.is_last() {
            self.current += 1;
            debug!(current = self.current, "Session::advance: moved");
            true
        } else {
            false
        }
    }

    /// Move to the previous step; false on the first step
    pub fn back(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            debug!(current = self.current, "Session::back: moved");
            true
        } else {
            false
        }
    }

    /// Mark the current step complete, advancing unless it is the last
    pub fn mark_current_done(&mut self) -> MarkOutcome {
        debug!(current = self.current, "Session::mark_current_done: called");
        if !self.has_steps() {
            return MarkOutcome::Empty;
        }
        if self.is_last() && self.is_completed(self.current) {
            return MarkOutcome::AlreadyFinished;
        }

        self.completed.insert(self.current);
        if self.advance() {
            MarkOutcome::Advanced
        } else {
            MarkOutcome::Finished
        }
    }

    /// Flip completion of any step; returns the new membership
    pub fn toggle(&mut self, index: usize) -> bool {
        if index >= self.steps.len() {
            return false;
        }
        let now_done = if self.completed.remove(&index) {
            false
        } else {
            self.completed.insert(index);
            true
        };
        debug!(index, now_done, "Session::toggle: flipped");
        now_done
    }
}
