//! Unstuck - turn an overwhelming task into small first steps
//!
//! One request to a generative-text API breaks a task description into a
//! handful of concrete steps, each small enough for a single focus block.
//! The user then works through them one at a time with a countdown timer,
//! tracks what is done, and exports the plan as a markdown checklist.
//!
//! # Modules
//!
//! - [`llm`] - text-generation client trait and the Gemini implementation
//! - [`breakdown`] - prompt, reply validation and failure taxonomy
//! - [`timer`] - countdown state machine and completion chime
//! - [`session`] - the in-memory task, steps and progress
//! - [`controller`] - screen state machine tying everything together
//! - [`export`] - markdown rendering, clipboard and file sinks
//! - [`prefs`] - persisted user preferences
//! - [`tui`] - terminal interface
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod breakdown;
pub mod cli;
pub mod config;
pub mod controller;
pub mod dialog;
pub mod export;
pub mod llm;
pub mod prefs;
pub mod session;
pub mod timer;
pub mod tui;

pub use breakdown::{Breakdown, BreakdownClient, BreakdownError, ErrorKind};
pub use config::{Config, LlmConfig};
pub use controller::{BreakdownJob, Controller, JobResult, Sinks, SubmitOutcome};
pub use prefs::{FilePrefStore, MemoryPrefStore, PrefStore, Preferences, Prefs, Theme};
pub use session::{Screen, Session};
pub use timer::{Timer, TimerEvent, TimerState};
