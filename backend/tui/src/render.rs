//! TUI Rendering
//!
//! Translates `AppState` into Ratatui widgets and draws to the terminal frame.

use bankbot_core::{
    star_rating, ChatMessage, Confidence, EvaluationSummary, EvaluationView, Phase, ReactStep,
    Role,
};
use chrono::{Local, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{AppState, Confirm, Focus, LoginField, Screen};
use crate::format::{inline_segments, relative_date, truncate, Inline};

const SIDEBAR_WIDTH: u16 = 34;
const SPINNER: [&str; 4] = ["⠋", "⠙", "⠹", "⠸"];

/// Main draw function.
pub fn draw_ui(f: &mut Frame, state: &AppState) {
    match state.screen {
        Screen::Login => draw_login(f, state),
        Screen::Chat => draw_chat(f, state),
    }
    if let Some(confirm) = &state.confirm {
        draw_confirm(f, confirm);
    }
    if let Some(alert) = &state.alert {
        draw_alert(f, alert);
    }
}

fn focused_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn centered_rect(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    Rect {
        x: r.x + (r.width - width) / 2,
        y: r.y + (r.height - height) / 2,
        width,
        height,
    }
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

fn draw_login(f: &mut Frame, state: &AppState) {
    let form = &state.login;
    let area = centered_rect(52, 15, f.size());
    let block = Block::default()
        .title(" Banking Bot ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // Subtitle
            Constraint::Length(3), // Username
            Constraint::Length(3), // Password
            Constraint::Length(2), // Error / progress
            Constraint::Min(1),    // Hints
        ])
        .split(inner);

    f.render_widget(
        Paragraph::new("Sign in to your account").alignment(Alignment::Center),
        rows[0],
    );

    let username = Paragraph::new(form.username.as_str()).block(
        Block::default()
            .title("Username")
            .borders(Borders::ALL)
            .border_style(focused_border(form.focus == LoginField::Username)),
    );
    f.render_widget(username, rows[1]);

    let shown = if form.show_password {
        form.password.clone()
    } else {
        "•".repeat(form.password.chars().count())
    };
    let password = Paragraph::new(shown.as_str()).block(
        Block::default()
            .title("Password")
            .borders(Borders::ALL)
            .border_style(focused_border(form.focus == LoginField::Password)),
    );
    f.render_widget(password, rows[2]);

    let status = if form.pending {
        Line::styled("Signing in...", Style::default().fg(Color::Yellow))
    } else if let Some(error) = &form.error {
        Line::styled(error.as_str(), Style::default().fg(Color::Red))
    } else {
        Line::default()
    };
    f.render_widget(Paragraph::new(status).wrap(Wrap { trim: true }), rows[3]);

    f.render_widget(
        Paragraph::new(vec![
            Line::styled("Tab switch field · Enter sign in", dim()),
            Line::styled("Ctrl+T show password · Esc quit", dim()),
        ])
        .alignment(Alignment::Center),
        rows[4],
    );

    if !form.pending {
        let (row, text) = match form.focus {
            LoginField::Username => (rows[1], form.username.chars().count()),
            LoginField::Password => (rows[2], form.password.chars().count()),
        };
        f.set_cursor(cursor_x(row, text), row.y + 1);
    }
}

/// Column after `len` typed characters inside a bordered box, kept in the box.
fn cursor_x(area: Rect, len: usize) -> u16 {
    let typed = u16::try_from(len).unwrap_or(u16::MAX);
    area.x
        .saturating_add(1)
        .saturating_add(typed)
        .min(area.right().saturating_sub(2))
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

fn draw_chat(f: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(3),    // Body
        ])
        .split(f.size());
    draw_header(f, state, chunks[0]);

    let main = if state.sidebar_collapsed {
        chunks[1]
    } else {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
            .split(chunks[1]);
        draw_sidebar(f, state, body[0]);
        body[1]
    };

    let panes = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Messages
            Constraint::Length(3), // Input
        ])
        .split(main);
    draw_messages(f, state, panes[0]);
    draw_input(f, state, panes[1]);
}

fn draw_header(f: &mut Frame, state: &AppState, area: Rect) {
    let block = Block::default().borders(Borders::BOTTOM);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(44)])
        .split(inner);

    let title = Line::from(vec![
        Span::styled(
            "Banking Bot",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(state.subtitle(), dim()),
    ]);
    f.render_widget(Paragraph::new(title), halves[0]);

    let user = state
        .user
        .as_ref()
        .map(|u| u.display_name())
        .unwrap_or_default();
    let menu = Line::from(vec![
        Span::styled(user, Style::default().add_modifier(Modifier::BOLD)),
        Span::styled("  Ctrl+L logout", dim()),
    ]);
    f.render_widget(Paragraph::new(menu).alignment(Alignment::Right), halves[1]);
}

fn draw_sidebar(f: &mut Frame, state: &AppState, area: Rect) {
    let block = Block::default()
        .title(" Conversations ")
        .borders(Borders::ALL)
        .border_style(focused_border(state.focus == Focus::Sidebar));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // New chat
            Constraint::Min(1),    // Threads
            Constraint::Length(1), // Hints
        ])
        .split(inner);

    f.render_widget(
        Paragraph::new(Line::styled(
            "+ New Chat (Ctrl+N)",
            Style::default().fg(Color::Green),
        )),
        rows[0],
    );

    if state.threads.is_empty() {
        let note = if state.threads_loading {
            "Loading conversations..."
        } else {
            "No conversations yet"
        };
        f.render_widget(
            Paragraph::new(Line::styled(note, dim())).wrap(Wrap { trim: true }),
            rows[1],
        );
    } else {
        let now = Utc::now();
        let preview_width = inner.width.saturating_sub(3) as usize;
        let items: Vec<ListItem> = state
            .threads
            .iter()
            .map(|thread| {
                let preview = if thread.last_message.trim().is_empty() {
                    "New conversation".to_string()
                } else {
                    truncate(&thread.last_message, preview_width)
                };
                let current = state.current_thread_id.as_deref() == Some(thread.chat_thread_id.as_str());
                let preview_style = if current {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(vec![
                    Line::styled(preview, preview_style),
                    Line::styled(
                        format!(
                            "{} · {} messages",
                            relative_date(thread.last_activity, now),
                            thread.message_count
                        ),
                        dim(),
                    ),
                ])
            })
            .collect();
        let list = List::new(items)
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("▌");
        let mut list_state = state.thread_list_state.clone();
        f.render_stateful_widget(list, rows[1], &mut list_state);
    }

    f.render_widget(
        Paragraph::new(Line::styled("d delete · D delete all", dim())),
        rows[2],
    );
}

fn draw_messages(f: &mut Frame, state: &AppState, area: Rect) {
    let block = Block::default().borders(Borders::NONE);
    let inner = block.inner(area);
    let lines = message_lines(state);

    // Wrapped height, so the newest line stays pinned to the bottom.
    let width = inner.width.max(1) as usize;
    let total: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    let bottom = total.saturating_sub(inner.height as usize);
    let offset = bottom.saturating_sub(state.scroll_back as usize);

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((offset.min(u16::MAX as usize) as u16, 0));
    f.render_widget(paragraph, area);
}

fn draw_input(f: &mut Frame, state: &AppState, area: Rect) {
    let focused = state.focus == Focus::Input;
    let (text, style, title) = if state.input_enabled() {
        (
            state.input.clone(),
            Style::default(),
            " Message (Enter to send) ",
        )
    } else {
        (
            "Waiting for the answer...".to_string(),
            dim(),
            " Message (Esc to stop) ",
        )
    };
    let input = Paragraph::new(text).style(style).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(focused_border(focused)),
    );
    f.render_widget(input, area);

    if focused && state.input_enabled() && state.confirm.is_none() && state.alert.is_none() {
        f.set_cursor(cursor_x(area, state.input.chars().count()), area.y + 1);
    }
}

// ---------------------------------------------------------------------------
// Message list
// ---------------------------------------------------------------------------

/// All lines of the message pane, top to bottom.
pub fn message_lines(state: &AppState) -> Vec<Line<'static>> {
    let transcript = &state.transcript;
    if transcript.is_empty() && !transcript.is_streaming() {
        return if state.history_loading {
            vec![Line::styled("Loading conversation...", dim())]
        } else {
            welcome_lines()
        };
    }

    let last_assistant = transcript.last_assistant_index();
    let mut lines = Vec::new();
    for (index, message) in transcript.messages().iter().enumerate() {
        push_message(&mut lines, message);
        if Some(index) == last_assistant {
            push_evaluation(&mut lines, transcript.evaluation_view(), state.evaluation_expanded);
        }
        lines.push(Line::default());
    }

    if transcript.is_streaming() {
        for step in transcript.live_steps() {
            push_step_card(&mut lines, step);
        }
        let spinner = SPINNER[state.spinner_frame % SPINNER.len()];
        lines.push(Line::styled(
            format!("{spinner} Banking Bot is thinking..."),
            Style::default().fg(Color::Yellow),
        ));
    }
    lines
}

fn welcome_lines() -> Vec<Line<'static>> {
    vec![
        Line::default(),
        Line::styled(
            "Welcome to Banking Bot",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Line::default(),
        Line::raw("Ask about your accounts, for example:"),
        Line::styled("  • What is my current balance?", dim()),
        Line::styled("  • Show my recent transactions", dim()),
        Line::styled("  • How much did I spend on groceries last month?", dim()),
        Line::default(),
        Line::styled("Tab switches to the conversation list.", dim()),
    ]
}

fn push_message(lines: &mut Vec<Line<'static>>, message: &ChatMessage) {
    let (name, color) = match message.role {
        Role::User => ("You", Color::Cyan),
        Role::Assistant => ("Banking Bot", Color::Green),
    };
    let time = message.timestamp.with_timezone(&Local).format("%H:%M").to_string();
    lines.push(Line::from(vec![
        Span::styled(name, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {time}"), dim()),
    ]));

    for text in message.content.lines() {
        lines.push(formatted_line(text));
    }

    if !message.react_steps.is_empty() {
        lines.push(Line::styled(
            format!("  ⋯ reasoned in {} steps", message.react_steps.len()),
            dim(),
        ));
    }
}

/// One content line with inline markup applied.
pub fn formatted_line(text: &str) -> Line<'static> {
    let mut spans = vec![Span::raw("  ")];
    for (style, segment) in inline_segments(text) {
        let style = match style {
            Inline::Plain => Style::default(),
            Inline::Bold => Style::default().add_modifier(Modifier::BOLD),
            Inline::Italic => Style::default().add_modifier(Modifier::ITALIC),
            Inline::Code => Style::default().fg(Color::Yellow).bg(Color::Black),
        };
        spans.push(Span::styled(segment, style));
    }
    Line::from(spans)
}

fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Thought => Color::Blue,
        Phase::Action => Color::Magenta,
        Phase::Observation => Color::Cyan,
        Phase::FinalAnswer => Color::Green,
        Phase::Unknown => Color::Gray,
    }
}

fn push_step_card(lines: &mut Vec<Line<'static>>, step: &ReactStep) {
    let border = Style::default().fg(phase_color(step.phase));
    lines.push(Line::from(vec![
        Span::styled("  ┌ ", border),
        Span::styled(
            format!("Step {}: {}", step.step, step.phase.label()),
            border.add_modifier(Modifier::BOLD),
        ),
    ]));

    let mut row = |text: String, style: Style| {
        lines.push(Line::from(vec![
            Span::styled("  │ ", border),
            Span::styled(text, style),
        ]));
    };
    let content = step.display_content();
    if !content.is_empty() {
        row(content.to_string(), Style::default());
    }
    if let Some(details) = &step.details {
        if let Some(tool) = &details.tool_name {
            row(format!("Tool: {tool}"), dim());
        }
        if let Some(pattern) = &details.react_pattern {
            row(format!("Pattern: {pattern}"), dim());
        }
        if let Some(preview) = &details.result_preview {
            row(format!("Result: {}", truncate(preview, 200)), dim());
        }
    }
    if !step.reasoning.is_empty() {
        row(
            step.reasoning.clone(),
            Style::default().add_modifier(Modifier::ITALIC),
        );
    }
    lines.push(Line::styled("  └", border));
}

fn push_evaluation(lines: &mut Vec<Line<'static>>, view: EvaluationView<'_>, expanded: bool) {
    match view {
        EvaluationView::Hidden => {}
        EvaluationView::Pending => lines.push(Line::styled(
            "  ◌ Evaluating...",
            Style::default().fg(Color::Yellow),
        )),
        EvaluationView::Ready(evaluation) => push_evaluation_panel(lines, evaluation, expanded),
    }
}

fn confidence_label(confidence: Confidence) -> (&'static str, Color) {
    match confidence {
        Confidence::High => ("High confidence", Color::Green),
        Confidence::Medium => ("Medium confidence", Color::Yellow),
        Confidence::Low => ("Low confidence", Color::Red),
        Confidence::Unknown => ("Confidence unknown", Color::Gray),
    }
}

fn push_evaluation_panel(
    lines: &mut Vec<Line<'static>>,
    evaluation: &EvaluationSummary,
    expanded: bool,
) {
    let (label, color) = confidence_label(evaluation.confidence());
    let hint = if expanded {
        "  Ctrl+E hide"
    } else {
        "  Ctrl+E details"
    };
    lines.push(Line::from(vec![
        Span::raw("  Evaluation: "),
        Span::styled(
            star_rating(evaluation.overall_score, 5),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw("  "),
        Span::styled(label, Style::default().fg(color)),
        Span::styled(hint, dim()),
    ]));
    if !expanded {
        return;
    }

    if !evaluation.summary.is_empty() {
        lines.push(Line::raw(format!("    {}", evaluation.summary)));
    }
    if !evaluation.criteria_scores.is_empty() {
        lines.push(Line::styled("    Criteria:", Style::default().add_modifier(Modifier::BOLD)));
        for score in &evaluation.criteria_scores {
            let mut text = format!("      • {}: {}", score.criterion, score.score);
            if !score.reasoning.is_empty() {
                text.push_str(&format!(" - {}", score.reasoning));
            }
            lines.push(Line::raw(text));
        }
    }
    if !evaluation.strengths.is_empty() {
        lines.push(Line::styled(
            "    Strengths:",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
        for strength in &evaluation.strengths {
            lines.push(Line::raw(format!("      + {strength}")));
        }
    }
    if !evaluation.weaknesses.is_empty() {
        lines.push(Line::styled(
            "    Weaknesses:",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
        for weakness in &evaluation.weaknesses {
            lines.push(Line::raw(format!("      - {weakness}")));
        }
    }
}

// ---------------------------------------------------------------------------
// Dialogs
// ---------------------------------------------------------------------------

fn draw_popup(f: &mut Frame, title: &str, color: Color, body: Vec<Line<'static>>) {
    let area = centered_rect(54, 7, f.size());
    f.render_widget(Clear, area);
    let popup = Paragraph::new(body)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(format!(" {title} "))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    f.render_widget(popup, area);
}

fn draw_confirm(f: &mut Frame, confirm: &Confirm) {
    let question = match confirm {
        Confirm::DeleteThread(_) => "Delete this conversation? This cannot be undone.",
        Confirm::DeleteAll => "Delete ALL conversations? This cannot be undone.",
    };
    draw_popup(
        f,
        "Confirm",
        Color::Red,
        vec![
            Line::default(),
            Line::raw(question),
            Line::default(),
            Line::styled("y delete · n cancel", dim()),
        ],
    );
}

fn draw_alert(f: &mut Frame, message: &str) {
    draw_popup(
        f,
        "Error",
        Color::Red,
        vec![
            Line::default(),
            Line::raw(message.to_string()),
            Line::default(),
            Line::styled("Enter to dismiss", dim()),
        ],
    );
}
