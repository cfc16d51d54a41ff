//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

/// Unstuck - break overwhelming tasks into tiny steps
#[derive(Parser)]
#[command(
    name = "us",
    about = "Break an overwhelming task into small steps and work through them with a timer",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute; the TUI runs when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Break a task down and print the steps
    Breakdown {
        /// What you're stuck on
        #[arg(required = true, num_args = 1.., value_name = "TASK")]
        task: Vec<String>,

        /// Print the markdown export instead of the plain list
        #[arg(short, long)]
        markdown: bool,

        /// Also save the markdown export to the export directory
        #[arg(short, long)]
        save: bool,
    },

    /// Check that the stored API key works
    CheckKey,

    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },
}

/// Preference subcommands
#[derive(Debug, Subcommand)]
pub enum PrefsCommand {
    /// Show current preferences
    Show,

    /// Store the Gemini API key
    SetKey {
        /// API key from https://aistudio.google.com/apikey
        key: String,
    },

    /// Remove the stored API key
    ClearKey,

    /// Turn the completion chime on or off
    Sound {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Set the timer length in minutes
    Duration {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        minutes: u32,
    },

    /// Set the color theme
    Theme {
        #[arg(value_enum)]
        theme: ThemeChoice,
    },
}

/// On/off switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

/// Theme argument; `system` clears the stored choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeChoice {
    Light,
    Dark,
    System,
}

/// Path to the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("unstuck")
        .join("logs")
        .join("unstuck.log")
}
