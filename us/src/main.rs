use std::collections::BTreeSet;
use std::fs;

use chrono::Local;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tokio::sync::mpsc;
use tracing::{debug, info};

use unstuck::breakdown::BreakdownClient;
use unstuck::cli::{Cli, Command, PrefsCommand, ThemeChoice, Toggle, get_log_path};
use unstuck::config::Config;
use unstuck::controller::{Controller, Sinks};
use unstuck::export::{self, DirectorySink, DocumentSink};
use unstuck::llm::create_client;
use unstuck::prefs::{FilePrefStore, Prefs, Theme};
use unstuck::tui;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(model = %config.llm.model, "Unstuck loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Breakdown { task, markdown, save }) => cmd_breakdown(&config, &task.join(" "), markdown, save).await,
        Some(Command::CheckKey) => cmd_check_key(&config).await,
        Some(Command::Prefs { command }) => cmd_prefs(&config, command),
        None => {
            debug!("main: no command specified, launching TUI");
            cmd_tui(&config).await
        }
    }
}

fn open_prefs(config: &Config) -> Prefs {
    let path = config.prefs_path();
    debug!(path = %path.display(), "open_prefs: called");
    Prefs::new(Box::new(FilePrefStore::open(path)))
}

/// Stored credential, else the configured environment variable
fn resolve_credential(config: &Config, prefs: &Prefs) -> Option<String> {
    prefs
        .credential()
        .map(str::to_string)
        .or_else(|| config.llm.env_credential())
}

fn breakdown_client(config: &Config) -> Result<BreakdownClient> {
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    Ok(BreakdownClient::from_config(llm, &config.llm))
}

fn missing_key_error(config: &Config) -> eyre::Report {
    eyre!(
        "No API key. Run `us prefs set-key <KEY>` or set {}.\nGet a key at {}",
        config.llm.api_key_env,
        unstuck::breakdown::API_KEY_URL
    )
}

/// Launch the interactive TUI
async fn cmd_tui(config: &Config) -> Result<()> {
    debug!("cmd_tui: called");
    let client = breakdown_client(config)?;
    let prefs = open_prefs(config);
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();

    let controller = Controller::new(client, prefs, Sinks::terminal(config.export_dir()), timer_tx)
        .with_fallback_credential(config.llm.env_credential())
        .with_system_theme(Theme::system());

    tui::run(controller, timer_rx).await
}

/// Break a task down and print it
async fn cmd_breakdown(config: &Config, task: &str, markdown: bool, save: bool) -> Result<()> {
    debug!(task_len = task.len(), markdown, save, "cmd_breakdown: called");
    let task = task.trim();
    if task.is_empty() {
        return Err(eyre!("{}", unstuck::controller::EMPTY_TASK_MESSAGE));
    }

    let prefs = open_prefs(config);
    let credential = resolve_credential(config, &prefs).ok_or_else(|| missing_key_error(config))?;
    let client = breakdown_client(config)?;

    let breakdown = match client.breakdown(&credential, task).await {
        Ok(b) => b,
        Err(e) => {
            info!(kind = %e.kind(), "cmd_breakdown: failed");
            return Err(eyre!("{}", e.user_message()));
        }
    };

    let document = export::render_markdown(&breakdown.task_summary, &breakdown.steps, &BTreeSet::new(), Local::now());

    if markdown {
        print!("{}", document);
    } else {
        println!("{}", breakdown.task_summary.bright_cyan().bold());
        println!();
        for (i, step) in breakdown.steps.iter().enumerate() {
            println!("  {} {}", format!("{}.", i + 1).yellow(), step);
        }
        println!();
        println!("{}", breakdown.encouragement.dimmed());
    }

    if save {
        let sink = DirectorySink::new(config.export_dir());
        let path = sink
            .save(&export::filename(&breakdown.task_summary), &document)
            .context("Failed to save export")?;
        eprintln!("{} {}", "Saved to".green(), path.display());
    }

    Ok(())
}

/// Check the API key with a minimal request
async fn cmd_check_key(config: &Config) -> Result<()> {
    debug!("cmd_check_key: called");
    let prefs = open_prefs(config);
    let credential = resolve_credential(config, &prefs).ok_or_else(|| missing_key_error(config))?;
    let client = breakdown_client(config)?;

    if client.check_credential(&credential).await {
        println!("{} API key works ({})", "✓".green(), client.model());
        Ok(())
    } else {
        println!("{} API key was rejected", "✗".red());
        Err(eyre!("API key check failed"))
    }
}

/// Show a key without revealing it
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "••••".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

fn cmd_prefs(config: &Config, command: PrefsCommand) -> Result<()> {
    debug!(?command, "cmd_prefs: called");
    let mut prefs = open_prefs(config);

    match command {
        PrefsCommand::Show => {
            let values = prefs.values().clone();
            let key = match (&values.credential, config.llm.env_credential()) {
                (Some(k), _) => mask_key(k),
                (None, Some(k)) => format!("{} (from ${})", mask_key(&k), config.llm.api_key_env),
                (None, None) => "not set".dimmed().to_string(),
            };
            let theme = values.theme.map(Theme::as_str).unwrap_or("system");

            println!("{}", "Preferences".bright_cyan().bold());
            println!("  {:10} {}", "file".yellow(), config.prefs_path().display());
            println!("  {:10} {}", "api key".yellow(), key);
            println!("  {:10} {}", "sound".yellow(), if values.sound_enabled { "on" } else { "off" });
            println!("  {:10} {} minutes", "timer".yellow(), values.timer_minutes);
            println!("  {:10} {}", "theme".yellow(), theme);
            println!("  {:10} {}", "log".yellow(), get_log_path().display());
        }
        PrefsCommand::SetKey { key } => {
            if key.trim().is_empty() {
                return Err(eyre!("API key is empty"));
            }
            prefs.set_credential(&key).context("Failed to save API key")?;
            println!("{}", "API key saved!".green());
        }
        PrefsCommand::ClearKey => {
            prefs.clear_credential().context("Failed to clear API key")?;
            println!("API key cleared");
        }
        PrefsCommand::Sound { state } => {
            prefs
                .set_sound_enabled(state == Toggle::On)
                .context("Failed to save sound preference")?;
            println!("Sound {}", if state == Toggle::On { "on" } else { "off" });
        }
        PrefsCommand::Duration { minutes } => {
            prefs
                .set_timer_minutes(minutes)
                .context("Failed to save timer duration")?;
            println!("Timer set to {} minutes", prefs.values().timer_minutes);
        }
        PrefsCommand::Theme { theme } => {
            let choice = match theme {
                ThemeChoice::Light => Some(Theme::Light),
                ThemeChoice::Dark => Some(Theme::Dark),
                ThemeChoice::System => None,
            };
            prefs.set_theme(choice).context("Failed to save theme")?;
            println!("Theme: {}", choice.map(Theme::as_str).unwrap_or("system"));
        }
    }
    Ok(())
}
