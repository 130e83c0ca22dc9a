//! CLI Ask Subcommand
//!
//! One-shot chat: streams the reasoning steps to stdout as they arrive, then
//! prints the answer and its evaluation once the stream closes.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use bankbot_client::ApiClient;
use bankbot_core::{
    new_thread_id, star_rating, strip_phase_glyph, ChatMessage, Confidence, EvaluationSummary,
    Phase, StreamEvent, Transcript,
};
use bankbot_logging::StreamEventLogger;
use tracing::warn;

use crate::terminal_output::{
    note_warn, paint, stream_write, BLUE, BOLD, CYAN, DIM, GREEN, ITALIC, MAGENTA, RED, YELLOW,
};

/// Prints each reasoning step once, the first time its phase is seen.
#[derive(Default)]
pub struct StepPrinter {
    seen: Vec<(u32, Phase)>,
}

impl StepPrinter {
    pub fn line_for(&mut self, event: &StreamEvent) -> Option<String> {
        let StreamEvent::ReactStep(step) = event else {
            return None;
        };
        if step.phase == Phase::FinalAnswer || self.seen.contains(&(step.step, step.phase)) {
            return None;
        }
        self.seen.push((step.step, step.phase));

        let style = match step.phase {
            Phase::Thought => MAGENTA,
            Phase::Action => BLUE,
            Phase::Observation => CYAN,
            _ => DIM,
        };
        let label = paint(style, &format!("Step {} {}", step.step, step.phase.label()));
        let tool = step
            .details
            .as_ref()
            .and_then(|d| d.tool_name.as_deref())
            .map(|name| format!(" [{name}]"))
            .unwrap_or_default();
        let content = strip_phase_glyph(step.content.as_deref().unwrap_or_default());
        let content = content.lines().next().unwrap_or_default();
        Some(format!("  {label}{tool}  {}\n", paint(DIM, content)))
    }
}

pub fn evaluation_line(evaluation: &EvaluationSummary) -> String {
    let (label, style) = match evaluation.confidence() {
        Confidence::High => ("High confidence", GREEN),
        Confidence::Medium => ("Medium confidence", YELLOW),
        Confidence::Low => ("Low confidence", RED),
        Confidence::Unknown => ("Confidence unknown", DIM),
    };
    format!(
        "{}  {}",
        paint(YELLOW, &star_rating(evaluation.overall_score, 5)),
        paint(style, label)
    )
}

pub fn render_answer(message: &ChatMessage) -> String {
    let mut out = format!("\n{}\n", paint(&format!("{BOLD}{GREEN}"), "Banking Bot"));
    for line in message.content.lines() {
        out.push_str(&format!("  {line}\n"));
    }
    if let Some(evaluation) = &message.evaluation {
        out.push_str(&format!("\n  {}\n", evaluation_line(evaluation)));
        if !evaluation.summary.is_empty() {
            out.push_str(&format!("  {}\n", paint(ITALIC, &evaluation.summary)));
        }
    }
    out
}

pub async fn ask(
    api: &ApiClient,
    message: &str,
    thread_id: Option<String>,
    show_steps: bool,
) -> Result<()> {
    if !api.tokens().is_logged_in() {
        bail!("Not logged in. Run `bankbot login` first.");
    }
    let thread_id = thread_id.unwrap_or_else(new_thread_id);
    let mut transcript = Transcript::new();
    let turn = transcript.begin_turn(message, &thread_id)?;

    let mut printer = StepPrinter::default();
    let mut stdout = io::stdout();
    let result = api
        .stream_chat(message, &thread_id, |event| {
            StreamEventLogger::log_event(&thread_id, &event);
            if show_steps {
                if let Some(line) = printer.line_for(&event) {
                    let _ = stream_write(&mut stdout, &line);
                }
            }
            transcript.apply(turn, event);
        })
        .await;

    match result {
        Ok(()) => {
            transcript.finish(turn);
        }
        Err(e) => {
            if transcript.fail(turn) {
                return Err(e).context("The answer could not be completed");
            }
            warn!(error = %e, "Stream failed after the answer arrived");
            note_warn("The stream was interrupted after the answer arrived");
        }
    }

    let answer = transcript
        .last_assistant_index()
        .map(|i| &transcript.messages()[i])
        .filter(|m| !m.content.is_empty());
    match answer {
        Some(message) => stream_write(&mut stdout, &render_answer(message))?,
        None => note_warn("The assistant returned no answer"),
    }
    writeln!(stdout, "{}", paint(DIM, &format!("\n  thread {thread_id}")))?;
    Ok(())
}

/// Print the backend's raw reasoning trace for the most recent turn.
pub async fn trace(api: &ApiClient) -> Result<()> {
    if !api.tokens().is_logged_in() {
        bail!("Not logged in. Run `bankbot login` first.");
    }
    let trace = api.react_trace().await.context("Failed to load reasoning trace")?;
    println!("{}", serde_json::to_string_pretty(&trace)?);
    Ok(())
}
