//! Turns message text into terminal output: prose, highlighted code blocks,
//! and the collapsed view of long user messages.

pub mod highlight;
pub mod runner;
pub mod segments;

use crate::client::message::{Message, Role};
pub use segments::{parse_segments, Segment, DEFAULT_LANGUAGE};

/// User messages longer than this are collapsed until expanded.
pub const TRUNCATE_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub segments: Vec<Segment>,
    pub truncated: bool,
    pub hidden_lines: usize,
}

pub fn render_message(message: &Message, expanded: bool) -> RenderedMessage {
    let text = message.text();
    let total = text.lines().count();

    if message.role == Role::User && !expanded && total > TRUNCATE_LINES {
        let visible: String = text.split_inclusive('\n').take(TRUNCATE_LINES).collect();
        let visible = visible.strip_suffix('\n').unwrap_or(&visible);
        return RenderedMessage {
            segments: parse_segments(visible),
            truncated: true,
            hidden_lines: total - TRUNCATE_LINES,
        };
    }

    RenderedMessage {
        segments: parse_segments(text),
        truncated: false,
        hidden_lines: 0,
    }
}

/// Code blocks of a message in display order, as `(language, code)`.
pub fn code_blocks(message: &Message) -> Vec<(String, String)> {
    parse_segments(message.text())
        .into_iter()
        .filter_map(|s| match s {
            Segment::Code { language, code } => Some((language, code)),
            Segment::Text(_) => None,
        })
        .collect()
}

/// ANSI rendering of a message body.
pub fn to_terminal(rendered: &RenderedMessage) -> String {
    let mut out = String::new();
    let mut block = 0;

    for segment in &rendered.segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Code { language, code } => {
                block += 1;
                let tag = if runner::is_runnable(language) {
                    format!("{} · /run {}", language, block)
                } else {
                    language.clone()
                };
                out.push_str(&format!("┌── {}\n", tag));
                out.push_str(&highlight::highlight(code, language));
                out.push_str("\n└──");
            }
        }
    }

    if rendered.truncated {
        out.push_str(&format!(
            "\n… {} more line(s) hidden (/expand to show)",
            rendered.hidden_lines
        ));
    }
    out
}
