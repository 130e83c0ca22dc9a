//! Terminal output utilities: ANSI styling, notes, tables, and streamed text.

use std::io::{IsTerminal, Write};
use std::sync::OnceLock;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const ITALIC: &str = "\x1b[3m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";

/// Colors are used when stdout is a terminal that is not `dumb` and
/// `NO_COLOR` is unset. Decided once per process.
pub fn supports_color() -> bool {
    static COLOR: OnceLock<bool> = OnceLock::new();
    *COLOR.get_or_init(|| {
        std::env::var_os("NO_COLOR").is_none()
            && std::io::stdout().is_terminal()
            && std::env::var("TERM").map_or(true, |term| term != "dumb")
    })
}

/// Wrap `text` in `style` when colors are enabled.
pub fn paint(style: &str, text: &str) -> String {
    if supports_color() {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Remove `ESC [ ... m` sequences.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('\x1b') {
        out.push_str(&rest[..start]);
        rest = match rest[start..].find('m') {
            Some(end) => &rest[start + end + 1..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

#[derive(Clone, Copy)]
enum Note {
    Info,
    Warn,
    Error,
    Success,
}

impl Note {
    fn marker(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Note::Info => (CYAN, "ℹ", "INFO:"),
            Note::Warn => (YELLOW, "⚠", "WARN:"),
            Note::Error => (RED, "✗", "ERROR:"),
            Note::Success => (GREEN, "✓", "OK:"),
        }
    }

    fn line(self, msg: &str) -> String {
        let (color, glyph, plain) = self.marker();
        if supports_color() {
            format!("{color}{BOLD}{glyph}{RESET} {msg}")
        } else {
            format!("{plain} {msg}")
        }
    }
}

pub fn note_info(msg: &str) {
    println!("{}", Note::Info.line(msg));
}

/// Warnings and errors go to stderr so piped output stays clean.
pub fn note_warn(msg: &str) {
    eprintln!("{}", Note::Warn.line(msg));
}

pub fn note_error(msg: &str) {
    eprintln!("{}", Note::Error.line(msg));
}

pub fn note_success(msg: &str) {
    println!("{}", Note::Success.line(msg));
}

/// Column alignment.
pub enum Align {
    Left,
    Right,
}

/// A table column definition.
pub struct Column {
    pub header: String,
    pub align: Align,
    pub max_width: Option<usize>,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Left,
            max_width: None,
        }
    }

    pub fn right(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Right,
            max_width: None,
        }
    }

    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }
}

/// Render a table with given columns and rows. Cells wider than a column's
/// `max_width` are cut with an ellipsis.
pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, col)| {
                    let cell = row.get(i).map(String::as_str).unwrap_or("");
                    match col.max_width {
                        Some(max) => clip(cell, max),
                        None => cell.to_string(),
                    }
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| visible_width(&c.header)).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(visible_width(cell));
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| pad_cell(&col.header, widths[i], &col.align))
        .collect();
    out.push_str(&paint(BOLD, &format!("  {}", header.join("  "))));
    out.push('\n');

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}\n", sep.join("  ")));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| pad_cell(cell, widths[i], &columns[i].align))
            .collect();
        out.push_str(&format!("  {}\n", cells.join("  ").trim_end()));
    }
    out
}

fn visible_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

fn clip(s: &str, max: usize) -> String {
    let plain = strip_ansi(s);
    if plain.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = plain.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

fn pad_cell(s: &str, width: usize, align: &Align) -> String {
    let pad = width.saturating_sub(visible_width(s));
    match align {
        Align::Left => format!("{s}{}", " ".repeat(pad)),
        Align::Right => format!("{}{s}", " ".repeat(pad)),
    }
}

/// Write a chunk and flush so partial answers show up immediately.
pub fn stream_write(writer: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    writer.write_all(chunk.as_bytes())?;
    writer.flush()
}
