/// Language assumed for a fence without a tag.
pub const DEFAULT_LANGUAGE: &str = "javascript";

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Code { language: String, code: String },
}

impl Segment {
    pub fn is_code(&self) -> bool {
        matches!(self, Segment::Code { .. })
    }
}

/// Splits message text into prose and fenced code.
///
/// The rest of the opening fence line is the language tag. Code runs to the
/// next fence or to the end of the text; one newline right before the closing
/// fence belongs to the fence, not the code.
pub fn parse_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        if open > 0 {
            segments.push(Segment::Text(rest[..open].to_string()));
        }
        let after_fence = &rest[open + FENCE.len()..];

        let (tag, body) = match after_fence.find('\n') {
            Some(nl) => (&after_fence[..nl], &after_fence[nl + 1..]),
            None => (after_fence, ""),
        };
        let language = match tag.trim() {
            "" => DEFAULT_LANGUAGE.to_string(),
            t => t.to_string(),
        };

        let (code, remainder) = match body.find(FENCE) {
            Some(close) => (&body[..close], &body[close + FENCE.len()..]),
            None => (body, ""),
        };
        let code = code.strip_suffix('\n').unwrap_or(code);
        let code = code.strip_suffix('\r').unwrap_or(code);

        segments.push(Segment::Code {
            language,
            code: code.to_string(),
        });
        rest = remainder;
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_code_text() {
        let segments = parse_segments("a\n```js\nconsole.log(1)\n```\nb");
        assert_eq!(
            segments,
            vec![
                Segment::Text("a\n".into()),
                Segment::Code {
                    language: "js".into(),
                    code: "console.log(1)".into()
                },
                Segment::Text("\nb".into()),
            ]
        );
    }

    #[test]
    fn test_missing_tag_uses_default_language() {
        let segments = parse_segments("```\nx = 1\n```");
        assert_eq!(
            segments,
            vec![Segment::Code {
                language: DEFAULT_LANGUAGE.into(),
                code: "x = 1".into()
            }]
        );
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let segments = parse_segments("look:\n```python\nprint('hi')\nprint('there')");
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[1],
            Segment::Code {
                language: "python".into(),
                code: "print('hi')\nprint('there')".into()
            }
        );
    }

    #[test]
    fn test_plain_text_is_one_segment() {
        assert_eq!(parse_segments("just words"), vec![Segment::Text("just words".into())]);
        assert!(parse_segments("").is_empty());
    }

    #[test]
    fn test_two_blocks() {
        let segments = parse_segments("```sh\nls\n```\n```rust\nfn main() {}\n```");
        let code: Vec<_> = segments.iter().filter(|s| s.is_code()).collect();
        assert_eq!(code.len(), 2);
        assert_eq!(segments[1], Segment::Text("\n".into()));
    }
}
