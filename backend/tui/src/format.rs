//! Text helpers for the chat view: relative dates and inline markup.

use chrono::{DateTime, Utc};

/// Sidebar date label: `Today`, `Yesterday`, `N days ago`, or the date.
pub fn relative_date(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now.date_naive() - timestamp.date_naive()).num_days();
    match days {
        d if d <= 0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        d if d < 7 => format!("{d} days ago"),
        _ => timestamp.format("%-m/%-d/%Y").to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inline {
    Plain,
    Bold,
    Italic,
    Code,
}

/// Split `**bold**`, `*italic*` and `` `code` `` spans out of one line.
///
/// Unclosed markers are kept as literal text.
pub fn inline_segments(text: &str) -> Vec<(Inline, String)> {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        let marker = if rest.starts_with("**") {
            Some(("**", Inline::Bold))
        } else if rest.starts_with('`') {
            Some(("`", Inline::Code))
        } else if rest.starts_with('*') {
            Some(("*", Inline::Italic))
        } else {
            None
        };

        if let Some((marker, style)) = marker {
            let body = &rest[marker.len()..];
            // `2 * 3` is not emphasis: the span may not touch whitespace.
            let closed = body.find(marker).filter(|end| {
                let inner = &body[..*end];
                !inner.is_empty() && inner.trim() == inner
            });
            if let Some(end) = closed {
                if !plain.is_empty() {
                    segments.push((Inline::Plain, std::mem::take(&mut plain)));
                }
                segments.push((style, body[..end].to_string()));
                rest = &body[end + marker.len()..];
                continue;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            plain.push(c);
        }
        rest = chars.as_str();
    }

    if !plain.is_empty() {
        segments.push((Inline::Plain, plain));
    }
    segments
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_relative_dates() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();
        let at = |d, h| Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap();
        assert_eq!(relative_date(at(10, 1), now), "Today");
        assert_eq!(relative_date(at(9, 23), now), "Yesterday");
        assert_eq!(relative_date(at(6, 12), now), "4 days ago");
        assert_eq!(relative_date(at(1, 12), now), "6/1/2024");
    }

    #[test]
    fn test_inline_markup() {
        let segments = inline_segments("Your **balance** is `$1,204.55` as of *today*.");
        assert_eq!(
            segments,
            vec![
                (Inline::Plain, "Your ".to_string()),
                (Inline::Bold, "balance".to_string()),
                (Inline::Plain, " is ".to_string()),
                (Inline::Code, "$1,204.55".to_string()),
                (Inline::Plain, " as of ".to_string()),
                (Inline::Italic, "today".to_string()),
                (Inline::Plain, ".".to_string()),
            ]
        );
    }

    #[test]
    fn test_unclosed_markers_stay_literal() {
        assert_eq!(
            inline_segments("2 * 3 = 6 and ** alone"),
            vec![(Inline::Plain, "2 * 3 = 6 and ** alone".to_string())]
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("What is my balance today", 10), "What is m…");
    }
}
