use lazy_static::lazy_static;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};
use tracing::debug;

lazy_static! {
    static ref SYNTAX_SET: SyntaxSet = SyntaxSet::load_defaults_newlines();
    static ref THEME_SET: ThemeSet = ThemeSet::load_defaults();
    static ref THEME: &'static Theme = &THEME_SET.themes["base16-ocean.dark"];
}

const RESET: &str = "\x1b[0m";

/// Tags that syntect does not know by their usual chat spelling.
fn alias(language: &str) -> &str {
    match language {
        "javascript" | "node" => "js",
        "typescript" => "ts",
        "shell" | "bash" | "zsh" => "sh",
        "python3" => "py",
        "c++" => "cpp",
        other => other,
    }
}

fn find_syntax(language: &str) -> Option<&'static SyntaxReference> {
    let lower = language.trim().to_ascii_lowercase();
    let token = alias(&lower);
    SYNTAX_SET
        .find_syntax_by_token(token)
        .or_else(|| SYNTAX_SET.find_syntax_by_name(language.trim()))
}

/// Renders `code` with 24-bit terminal colors. Unknown languages fall back to
/// plain text.
pub fn highlight(code: &str, language: &str) -> String {
    let syntax = find_syntax(language).unwrap_or_else(|| {
        debug!(language, "No syntax definition; rendering as plain text");
        SYNTAX_SET.find_syntax_plain_text()
    });
    let mut h = HighlightLines::new(syntax, &THEME);
    let mut out = String::new();

    for line in LinesWithEndings::from(code) {
        match h.highlight_line(line, &SYNTAX_SET) {
            Ok(regions) => out.push_str(&as_24_bit_terminal_escaped(&regions, false)),
            Err(e) => {
                debug!("Highlighting failed, emitting raw line: {}", e);
                out.push_str(line);
            }
        }
    }
    out.push_str(RESET);
    out
}
