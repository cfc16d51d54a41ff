//! TUI views and rendering
//!
//! All rendering logic is contained here. Views read the App and its
//! controller but never modify them.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap};
use tracing::trace;

use super::app::App;
use crate::breakdown::API_KEY_URL;
use crate::controller::Controller;
use crate::dialog::{CredentialPrompt, Dialog, ExportAction, ExportPreview};
use crate::prefs::Theme;
use crate::session::Screen;
use crate::timer::TimerState;

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Most toasts stacked on screen at once
const MAX_VISIBLE_TOASTS: usize = 3;

const PLACEHOLDER: &str = "e.g. I need to clean my apartment but it's such a mess I don't know where to start";

/// Colors for one theme
#[derive(Debug, Clone, Copy)]
struct Palette {
    fg: Color,
    dim: Color,
    accent: Color,
    done: Color,
    warn: Color,
    error: Color,
    selected_bg: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                fg: Color::White,
                dim: Color::DarkGray,
                accent: Color::Rgb(100, 149, 237), // Cornflower blue
                done: Color::Rgb(50, 205, 50),     // Lime green
                warn: Color::Rgb(255, 215, 0),     // Gold
                error: Color::Rgb(220, 20, 60),    // Crimson
                selected_bg: Color::Rgb(40, 40, 40),
            },
            Theme::Light => Self {
                fg: Color::Black,
                dim: Color::Gray,
                accent: Color::Rgb(25, 85, 190),
                done: Color::Rgb(20, 130, 20),
                warn: Color::Rgb(184, 134, 11), // Dark goldenrod
                error: Color::Rgb(178, 34, 34), // Firebrick
                selected_bg: Color::Rgb(225, 225, 225),
            },
        }
    }
}

/// Main render function
pub fn render(app: &App, frame: &mut Frame) {
    let controller = app.controller();
    trace!(screen = ?controller.screen(), "render: called");
    let palette = Palette::for_theme(controller.theme());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Main content
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    render_header(controller, &palette, frame, chunks[0]);

    match controller.screen() {
        Screen::Input => render_input(controller, &palette, frame, chunks[1]),
        Screen::Loading => render_loading(app, &palette, frame, chunks[1]),
        Screen::StepDetail => render_step_detail(controller, &palette, frame, chunks[1]),
        Screen::AllSteps => render_all_steps(app, &palette, frame, chunks[1]),
    }

    render_footer(app, &palette, frame, chunks[2]);

    if let Some(dialog) = controller.dialog() {
        match dialog {
            Dialog::Credential(prompt) => render_credential_dialog(prompt, dialog.title(), &palette, frame, frame.area()),
            Dialog::Export(preview) => render_export_dialog(preview, dialog.title(), &palette, frame, frame.area()),
        }
    }

    render_toasts(controller, &palette, frame, chunks[1]);
}

fn render_header(controller: &Controller, p: &Palette, frame: &mut Frame, area: Rect) {
    let values = controller.prefs().values();
    let key_status = if controller.credential().is_some() {
        Span::styled("key ✓", Style::default().fg(p.done))
    } else {
        Span::styled("no key", Style::default().fg(p.warn))
    };
    let sound = if values.sound_enabled { "on" } else { "off" };

    let line = Line::from(vec![
        Span::styled(" Unstuck ", Style::default().fg(p.accent).add_modifier(Modifier::BOLD)),
        Span::styled("│ ", Style::default().fg(p.dim)),
        Span::styled(format!("timer {}m", values.timer_minutes), Style::default().fg(p.fg)),
        Span::styled("  sound ", Style::default().fg(p.dim)),
        Span::styled(sound, Style::default().fg(p.fg)),
        Span::raw("  "),
        key_status,
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.dim)),
    );
    frame.render_widget(header, area);
}

fn render_input(controller: &Controller, p: &Palette, frame: &mut Frame, area: Rect) {
    let error_height = if controller.error().is_some() { 6 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2),            // Prompt
            Constraint::Min(5),               // Text field
            Constraint::Length(error_height), // Error
        ])
        .split(area);

    let prompt = Paragraph::new(Line::from(Span::styled(
        "What are you stuck on?",
        Style::default().fg(p.fg).add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(prompt, chunks[0]);

    let input = controller.task_input();
    let body = if input.is_empty() {
        vec![Line::from(vec![
            Span::styled("▏", Style::default().fg(p.accent)),
            Span::styled(PLACEHOLDER, Style::default().fg(p.dim)),
        ])]
    } else {
        let mut lines: Vec<Line> = input.split('\n').map(|l| Line::from(l.to_string())).collect();
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::styled("▏", Style::default().fg(p.accent)));
        }
        lines
    };
    let field = Paragraph::new(body).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.accent))
            .title(" Task "),
    );
    frame.render_widget(field, chunks[1]);

    if let Some(error) = controller.error() {
        let error = Paragraph::new(error)
            .style(Style::default().fg(p.error))
            .wrap(Wrap { trim: false });
        frame.render_widget(error, chunks[2]);
    }
}

fn render_loading(app: &App, p: &Palette, frame: &mut Frame, area: Rect) {
    let spinner = SPINNER[(app.ticks() as usize) % SPINNER.len()];
    let task = &app.controller().session().task;
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(spinner, Style::default().fg(p.accent)),
            Span::styled(format!(" {}...", app.loading_word()), Style::default().fg(p.fg)),
        ]),
        Line::from(""),
        Line::from(Span::styled(task.as_str(), Style::default().fg(p.dim))),
    ];
    let loading = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(loading, centered_rect(70, 40, area));
}

fn render_step_detail(controller: &Controller, p: &Palette, frame: &mut Frame, area: Rect) {
    let session = controller.session();
    let Some(step) = session.current_step() else {
        return;
    };
    let total = session.step_count();
    let number = session.current + 1;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // Indicator
            Constraint::Length(1), // Progress
            Constraint::Length(1),
            Constraint::Length(1), // Label
            Constraint::Min(3),    // Step text
            Constraint::Length(3), // Timer
            Constraint::Length(1), // Completion
        ])
        .split(area);

    let indicator = Paragraph::new(Line::from(vec![
        Span::styled(format!("Step {} of {}", number, total), Style::default().fg(p.dim)),
        Span::styled(format!("  ·  {}", session.task_summary), Style::default().fg(p.dim)),
    ]));
    frame.render_widget(indicator, chunks[0]);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(p.accent))
        .ratio(session.progress_ratio().clamp(0.0, 1.0))
        .label("");
    frame.render_widget(gauge, chunks[1]);

    let label = if session.is_first() {
        format!("Your first {} minutes:", controller.prefs().values().timer_minutes)
    } else {
        format!("Step {}:", number)
    };
    frame.render_widget(
        Paragraph::new(Span::styled(label, Style::default().fg(p.accent))),
        chunks[3],
    );

    let text = Paragraph::new(Span::styled(
        step,
        Style::default().fg(p.fg).add_modifier(Modifier::BOLD),
    ))
    .wrap(Wrap { trim: true });
    frame.render_widget(text, chunks[4]);

    render_timer(controller, p, frame, chunks[5]);

    let completed = session.is_completed(session.current);
    let status = if session.is_last() && completed {
        Span::styled("✓ All done!", Style::default().fg(p.done).add_modifier(Modifier::BOLD))
    } else if completed {
        Span::styled("✓ Completed", Style::default().fg(p.done))
    } else {
        Span::styled("○ Not done yet", Style::default().fg(p.dim))
    };
    frame.render_widget(Paragraph::new(status), chunks[6]);
}

fn render_timer(controller: &Controller, p: &Palette, frame: &mut Frame, area: Rect) {
    let timer = controller.timer();
    let (color, state) = match timer.state() {
        TimerState::Running => (p.accent, "running"),
        TimerState::Paused => (p.fg, "paused"),
        TimerState::Finished => (p.warn, "time's up"),
        TimerState::IdleFull => (p.fg, "ready"),
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", timer.formatted()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {}", state), Style::default().fg(p.dim)),
    ]);
    let widget = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(" Timer "),
    );
    frame.render_widget(widget, area);
}

fn render_all_steps(app: &App, p: &Palette, frame: &mut Frame, area: Rect) {
    let session = app.controller().session();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // Summary
            Constraint::Length(1), // Encouragement
            Constraint::Length(1),
            Constraint::Min(3),    // Steps
            Constraint::Length(1), // Progress
        ])
        .split(area);

    frame.render_widget(
        Paragraph::new(Span::styled(
            session.task_summary.as_str(),
            Style::default().fg(p.fg).add_modifier(Modifier::BOLD),
        )),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            session.encouragement.as_str(),
            Style::default().fg(p.accent).add_modifier(Modifier::ITALIC),
        )),
        chunks[1],
    );

    let items: Vec<ListItem> = session
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let done = session.is_completed(i);
            let marker = if i == session.current { "▶ " } else { "  " };
            let check = if done { "[✓] " } else { "[ ] " };
            let mut style = Style::default().fg(if done { p.done } else { p.fg });
            if i == app.cursor() {
                style = style.bg(p.selected_bg).add_modifier(Modifier::BOLD);
            }
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(p.accent)),
                Span::styled(check, style),
                Span::styled(format!("Step {}: ", i + 1), style.add_modifier(Modifier::BOLD)),
                Span::styled(step.as_str(), style),
            ]))
        })
        .collect();
    frame.render_widget(List::new(items), chunks[3]);

    let progress = format!("{} of {} complete", session.completed_count(), session.step_count());
    frame.render_widget(
        Paragraph::new(Span::styled(progress, Style::default().fg(p.dim))),
        chunks[4],
    );
}

/// Key hints for the current context
fn keybinds(app: &App) -> Vec<(&'static str, &'static str)> {
    let controller = app.controller();
    match controller.dialog() {
        Some(Dialog::Credential(_)) => {
            return vec![
                ("Enter", "save"),
                ("Esc", "cancel"),
                ("^R", "show/hide"),
                ("^D", "clear stored key"),
            ];
        }
        Some(Dialog::Export(_)) => {
            return vec![
                ("c", "copy"),
                ("d", "download"),
                ("Tab", "select"),
                ("↑↓", "scroll"),
                ("Esc", "close"),
            ];
        }
        None => {}
    }

    match controller.screen() {
        Screen::Input => vec![
            ("Enter", "break it down"),
            ("Alt+Enter", "newline"),
            ("^K", "API key"),
            ("^S", "sound"),
            ("^T", "theme"),
            ("^↑↓", "timer"),
            ("^C", "quit"),
        ],
        Screen::Loading => vec![("^C", "quit")],
        Screen::StepDetail => vec![
            ("←→", "step"),
            ("Space", "timer"),
            ("r", "reset"),
            ("d", "done"),
            ("a", "all steps"),
            ("e", "export"),
            ("s", "start over"),
            ("q", "quit"),
        ],
        Screen::AllSteps => vec![
            ("↑↓", "select"),
            ("Space", "toggle"),
            ("f", "focus"),
            ("e", "export"),
            ("s", "start over"),
            ("q", "quit"),
        ],
    }
}

fn render_footer(app: &App, p: &Palette, frame: &mut Frame, area: Rect) {
    let mut spans = Vec::new();
    for (key, desc) in keybinds(app) {
        spans.push(Span::styled(format!("<{}>", key), Style::default().fg(p.accent)));
        spans.push(Span::styled(format!(" {}  ", desc), Style::default().fg(p.dim)));
    }

    let footer = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.dim)),
    );
    frame.render_widget(footer, area);
}

fn render_credential_dialog(prompt: &CredentialPrompt, title: &str, p: &Palette, frame: &mut Frame, area: Rect) {
    trace!("render_credential_dialog: called");
    let popup_area = centered_rect(60, 40, area);
    frame.render_widget(Clear, popup_area);

    let mut content = vec![
        Line::from(""),
        Line::from("Paste your Gemini API key to get started."),
        Line::from(Span::styled(format!("Get one at {}", API_KEY_URL), Style::default().fg(p.dim))),
        Line::from(""),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(p.accent)),
            Span::raw(prompt.display()),
            Span::styled("▏", Style::default().fg(p.accent)),
        ]),
    ];
    if prompt.resume.is_some() {
        content.push(Line::from(""));
        content.push(Line::from(Span::styled(
            "Your task will be submitted once the key is saved.",
            Style::default().fg(p.dim),
        )));
    }

    let dialog = Paragraph::new(content).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.accent))
            .title(title),
    );
    frame.render_widget(dialog, popup_area);
}

fn render_export_dialog(preview: &ExportPreview, title: &str, p: &Palette, frame: &mut Frame, area: Rect) {
    trace!("render_export_dialog: called");
    let popup_area = centered_rect(70, 70, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.accent))
        .title(title);
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Preview
            Constraint::Length(1), // Filename
            Constraint::Length(1), // Buttons
        ])
        .split(inner);

    let document = Paragraph::new(preview.document.as_str())
        .style(Style::default().fg(p.fg))
        .wrap(Wrap { trim: false })
        .scroll((preview.scroll, 0));
    frame.render_widget(document, chunks[0]);

    frame.render_widget(
        Paragraph::new(Span::styled(format!("File: {}", preview.filename), Style::default().fg(p.dim))),
        chunks[1],
    );

    let mut buttons = Vec::new();
    for action in ExportAction::ALL {
        let style = if action == preview.selected {
            Style::default()
                .fg(Color::Black)
                .bg(p.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(p.accent)
        };
        buttons.push(Span::styled(format!(" {} ", action.label()), style));
        buttons.push(Span::raw("   "));
    }
    frame.render_widget(
        Paragraph::new(Line::from(buttons)).alignment(Alignment::Center),
        chunks[2],
    );
}

fn render_toasts(controller: &Controller, p: &Palette, frame: &mut Frame, area: Rect) {
    // Newest first, capped
    let toasts: Vec<&str> = controller
        .toasts()
        .rev()
        .take(MAX_VISIBLE_TOASTS)
        .map(|t| t.message.as_str())
        .collect();
    if toasts.is_empty() {
        return;
    }

    let width = toasts.iter().map(|t| t.chars().count()).max().unwrap_or(0) as u16 + 4;
    let width = width.min(area.width);
    let height = (toasts.len() as u16 + 2).min(area.height);
    let toast_area = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + area.height.saturating_sub(height),
        width,
        height,
    };

    frame.render_widget(Clear, toast_area);
    let lines: Vec<Line> = toasts
        .into_iter()
        .rev()
        .map(|t| Line::from(Span::styled(t, Style::default().fg(p.fg))))
        .collect();
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.done)),
    );
    frame.render_widget(widget, toast_area);
}

/// Helper to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    trace!(percent_x, percent_y, "centered_rect: called");
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
