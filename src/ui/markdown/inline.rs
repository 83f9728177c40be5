//! Inline styling for a single line of message text.
//!
//! Three marker pairs are recognized: `**bold**`, `` `code` `` and `*italic*`.
//! Markers never nest and there is no escape syntax, so a lone `*` or
//! backtick that does not close is kept as plain text.

use serde::Serialize;

/// One styled run of text produced by [`parse_inline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StyledSpan {
    PlainText(String),
    Bold(String),
    InlineCode(String),
    Italic(String),
}

impl StyledSpan {
    /// Text content without markers.
    pub fn text(&self) -> &str {
        match self {
            StyledSpan::PlainText(text)
            | StyledSpan::Bold(text)
            | StyledSpan::InlineCode(text)
            | StyledSpan::Italic(text) => text,
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, StyledSpan::PlainText(_))
    }
}

/// Split `line` into styled spans, scanning left to right.
///
/// Returns `None` for empty input so callers can tell "nothing to draw" apart
/// from "one unstyled span". Any non-empty input yields at least one span and
/// the concatenated span texts plus their markers reproduce the input.
pub fn parse_inline(line: &str) -> Option<Vec<StyledSpan>> {
    if line.is_empty() {
        return None;
    }

    let bytes = line.as_bytes();
    let mut spans = Vec::new();
    let mut plain_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        let matched = match bytes[pos] {
            b'*' | b'`' => match_token(line, pos),
            _ => None,
        };

        match matched {
            Some((span, end)) => {
                if plain_start < pos {
                    spans.push(StyledSpan::PlainText(line[plain_start..pos].to_string()));
                }
                spans.push(span);
                pos = end;
                plain_start = end;
            }
            // Markers are ASCII, so stepping a byte never lands a slice inside a
            // multi-byte character: slices only start or end at marker bytes.
            None => pos += 1,
        }
    }

    if plain_start < bytes.len() {
        spans.push(StyledSpan::PlainText(line[plain_start..].to_string()));
    }

    Some(spans)
}

/// Try the three token patterns at `pos` in priority order: bold, code, italic.
fn match_token(line: &str, pos: usize) -> Option<(StyledSpan, usize)> {
    let rest = &line[pos..];

    if let Some(body) = rest.strip_prefix("**") {
        if let Some(close) = body.find("**") {
            let content = &body[..close];
            if !content.chars().any(is_line_terminator) {
                return Some((StyledSpan::Bold(content.to_string()), pos + 2 + close + 2));
            }
        }
    }

    if let Some(body) = rest.strip_prefix('`') {
        if let Some(close) = memchr::memchr(b'`', body.as_bytes()) {
            if close > 0 {
                return Some((
                    StyledSpan::InlineCode(body[..close].to_string()),
                    pos + 1 + close + 1,
                ));
            }
        }
    }

    if let Some(body) = rest.strip_prefix('*') {
        if let Some(close) = memchr::memchr(b'*', body.as_bytes()) {
            if close > 0 {
                return Some((
                    StyledSpan::Italic(body[..close].to_string()),
                    pos + 1 + close + 1,
                ));
            }
        }
    }

    None
}

// Bold content may not cross a line break.
fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> StyledSpan {
        StyledSpan::PlainText(text.to_string())
    }

    #[test]
    fn empty_input_produces_nothing() {
        assert_eq!(parse_inline(""), None);
    }

    #[test]
    fn unstyled_text_is_a_single_plain_span() {
        assert_eq!(parse_inline("  just words  "), Some(vec![plain("  just words  ")]));
    }

    #[test]
    fn recognizes_each_marker_kind() {
        let spans = parse_inline("a **b** c `d` e *f* g").expect("spans");
        assert_eq!(
            spans,
            vec![
                plain("a "),
                StyledSpan::Bold("b".into()),
                plain(" c "),
                StyledSpan::InlineCode("d".into()),
                plain(" e "),
                StyledSpan::Italic("f".into()),
                plain(" g"),
            ]
        );
    }

    #[test]
    fn bold_is_non_greedy_and_may_be_empty() {
        let spans = parse_inline("**one** and **two**").expect("spans");
        assert_eq!(
            spans,
            vec![
                StyledSpan::Bold("one".into()),
                plain(" and "),
                StyledSpan::Bold("two".into()),
            ]
        );
        assert_eq!(parse_inline("****"), Some(vec![StyledSpan::Bold(String::new())]));
    }

    #[test]
    fn bold_wins_over_italic_at_the_same_position() {
        let spans = parse_inline("**x*").expect("spans");
        // No closing `**`, and `*` followed by `*` cannot open italic, so the
        // second star opens an italic run instead.
        assert_eq!(spans, vec![plain("*"), StyledSpan::Italic("x".into())]);
    }

    #[test]
    fn unterminated_markers_fall_through_as_plain_text() {
        assert_eq!(parse_inline("a * b"), Some(vec![plain("a * b")]));
        assert_eq!(parse_inline("tick ` only"), Some(vec![plain("tick ` only")]));
        assert_eq!(parse_inline("**open"), Some(vec![plain("**open")]));
        assert_eq!(parse_inline("``"), Some(vec![plain("``")]));
    }

    #[test]
    fn code_content_keeps_stars_verbatim() {
        let spans = parse_inline("`a*b*c`").expect("spans");
        assert_eq!(spans, vec![StyledSpan::InlineCode("a*b*c".into())]);
    }

    #[test]
    fn multibyte_text_around_markers_is_preserved() {
        let spans = parse_inline("¿Dónde **está** el señor?").expect("spans");
        assert_eq!(
            spans,
            vec![
                plain("¿Dónde "),
                StyledSpan::Bold("está".into()),
                plain(" el señor?"),
            ]
        );
    }

    #[test]
    fn bold_does_not_span_carriage_returns() {
        let spans = parse_inline("**a\rb**").expect("spans");
        assert!(spans.iter().all(|span| !matches!(span, StyledSpan::Bold(_))));
    }

    #[test]
    fn parser_is_total_over_awkward_inputs() {
        for input in ["*", "**", "***", "`", "*`*`", "** **", "*\u{2028}*", "ñ*ñ"] {
            let spans = parse_inline(input).expect("non-empty input yields spans");
            assert!(!spans.is_empty());
        }
    }
}
