//! Turns markdown [`Block`]s into styled `ratatui` lines.
//!
//! Block content and order are kept exactly; only styling and decoration
//! (bullets, card separators, uppercased headings) are added here.

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use crate::core::message::{Role, TranscriptEntry};
use crate::ui::markdown::{render_blocks, Block, InlineText, StyledSpan, Table};
use crate::ui::theme::Theme;

const BULLET: &str = "• ";
const CARD_SEPARATOR: &str = " │ ";

pub fn render_blocks_to_lines(blocks: &[Block], theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block {
            Block::Heading { text, .. } => {
                lines.push(inline_line(text, theme.heading_style, true));
            }
            Block::ListItem(text) => {
                let mut line = inline_line(text, theme.text_style, false);
                line.spans
                    .insert(0, Span::styled(BULLET, theme.bullet_style));
                lines.push(line);
            }
            Block::Paragraph(text) => lines.push(inline_line(text, theme.text_style, false)),
            Block::BlankLine => lines.push(Line::default()),
            Block::CodeLine(code) => {
                lines.push(Line::from(Span::styled(code.clone(), theme.code_style)));
            }
            Block::Table(table) => push_table_cards(&mut lines, table, theme),
        }
    }
    lines
}

/// Parse and style a whole message in one go.
pub fn render_markdown(text: &str, theme: &Theme) -> Vec<Line<'static>> {
    render_blocks_to_lines(&render_blocks(text), theme)
}

fn inline_line(text: &InlineText, base: Style, uppercase: bool) -> Line<'static> {
    let spans = text
        .spans
        .iter()
        .map(|span| {
            let content = if uppercase {
                span.text().to_uppercase()
            } else {
                span.text().to_string()
            };
            Span::styled(content, span_style(span, base))
        })
        .collect::<Vec<_>>();
    Line::from(spans)
}

fn span_style(span: &StyledSpan, base: Style) -> Style {
    match span {
        StyledSpan::PlainText(_) => base,
        StyledSpan::Bold(_) => base.add_modifier(Modifier::BOLD),
        StyledSpan::Italic(_) => base.add_modifier(Modifier::ITALIC),
        StyledSpan::InlineCode(_) => base.add_modifier(Modifier::DIM),
    }
}

// Each body row becomes a card; cards are separated by a blank line.
fn push_table_cards(lines: &mut Vec<Line<'static>>, table: &Table, theme: &Theme) {
    for (index, card) in table.cards().into_iter().enumerate() {
        if index > 0 {
            lines.push(Line::default());
        }
        let labels: Vec<String> = card.iter().map(|field| field.label.to_uppercase()).collect();
        let label_width = labels.iter().map(|label| label.width()).max().unwrap_or(0);
        for (field, label) in card.iter().zip(labels) {
            let value_style = if field.lead {
                theme.card_lead_style
            } else {
                theme.card_value_style
            };
            let padding = " ".repeat(label_width - label.width());
            lines.push(Line::from(vec![
                Span::styled(format!("{label}{padding}"), theme.card_label_style),
                Span::styled(CARD_SEPARATOR, theme.card_separator_style),
                Span::styled(field.value.to_string(), value_style),
            ]));
        }
    }
}

/// Lines for one transcript entry: a role header, the body, then any
/// grounding sources.
pub fn render_entry(entry: &TranscriptEntry, theme: &Theme, markdown: bool) -> Vec<Line<'static>> {
    let (label, style) = match entry.role {
        Role::User => ("YOU", theme.user_prefix_style),
        Role::Model => ("MODEL", theme.model_prefix_style),
        Role::System => ("SYSTEM", theme.text_style),
    };
    let mut lines = vec![Line::from(Span::styled(label, style))];

    if markdown && entry.role == Role::Model {
        lines.extend(render_markdown(&entry.text, theme));
    } else {
        lines.extend(
            entry
                .text
                .split('\n')
                .map(|line| Line::from(Span::styled(line.to_string(), theme.text_style))),
        );
    }

    if !entry.images.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("[{} image(s) attached]", entry.images.len()),
            theme.citation_style,
        )));
    }

    let grounding = &entry.grounding;
    for (tag, sources) in [("web", &grounding.web_sources), ("map", &grounding.map_sources)] {
        for source in sources {
            lines.push(Line::from(Span::styled(
                format!("[{tag}] {} <{}>", source.title, source.uri),
                theme.citation_style,
            )));
        }
    }
    lines
}

/// Concatenated span text of a line, without styling.
pub fn line_text(line: &Line<'_>) -> String {
    line.spans.iter().map(|span| span.content.as_ref()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::GroundingCitation;

    fn texts(lines: &[Line<'_>]) -> Vec<String> {
        lines.iter().map(line_text).collect()
    }

    #[test]
    fn headings_are_uppercased_and_bold() {
        let theme = Theme::monochrome();
        let lines = render_markdown("## Budget *draft*", &theme);
        assert_eq!(texts(&lines), vec!["BUDGET DRAFT"]);
        let italic = &lines[0].spans[1];
        assert!(italic.style.add_modifier.contains(Modifier::BOLD));
        assert!(italic.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn list_items_get_a_bullet() {
        let lines = render_markdown("* one\n- **two**", &Theme::dark_default());
        assert_eq!(texts(&lines), vec!["• one", "• two"]);
        assert!(lines[1].spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn code_lines_are_kept_verbatim() {
        let theme = Theme::dark_default();
        let lines = render_markdown("```\n  let x = *y*;\n```", &theme);
        assert_eq!(texts(&lines), vec!["  let x = *y*;"]);
        assert_eq!(lines[0].spans[0].style, theme.code_style);
    }

    #[test]
    fn tables_become_cards_with_a_highlighted_lead() {
        let theme = Theme::dark_default();
        let text = "| Name | Role |\n|---|---|\n| Ada | Clerk |\n| Bo |";
        let lines = render_markdown(text, &theme);
        assert_eq!(
            texts(&lines),
            vec!["NAME │ Ada", "ROLE │ Clerk", "", "NAME │ Bo", "ROLE │ "]
        );
        assert_eq!(lines[0].spans[2].style, theme.card_lead_style);
        assert_eq!(lines[1].spans[2].style, theme.card_value_style);
    }

    #[test]
    fn card_labels_are_padded_to_a_common_width() {
        let text = "| Name | Occupation |\n|---|---|\n| Ada | Clerk |";
        let lines = render_markdown(text, &Theme::monochrome());
        assert_eq!(texts(&lines), vec!["NAME       │ Ada", "OCCUPATION │ Clerk"]);
    }

    #[test]
    fn blank_lines_survive_between_paragraphs() {
        let lines = render_markdown("a\n\nb", &Theme::monochrome());
        assert_eq!(texts(&lines), vec!["a", "", "b"]);
    }

    #[test]
    fn rendering_twice_gives_the_same_lines() {
        let theme = Theme::dark_default();
        let text = "# T\n| A |\n|---|\n| 1 |\n* x";
        assert_eq!(render_markdown(text, &theme), render_markdown(text, &theme));
    }

    #[test]
    fn entries_list_their_sources() {
        let mut entry = TranscriptEntry::model("2", "**Done**");
        entry.grounding.extend([
            GroundingCitation::web("https://a.example", "A"),
            GroundingCitation::map("https://maps.example/p", "Plaza"),
        ]);
        let lines = render_entry(&entry, &Theme::monochrome(), true);
        assert_eq!(
            texts(&lines),
            vec![
                "MODEL",
                "Done",
                "[web] A <https://a.example>",
                "[map] Plaza <https://maps.example/p>"
            ]
        );
    }

    #[test]
    fn user_entries_are_not_markdown_rendered() {
        let entry = TranscriptEntry::user("1", "# not a heading");
        let lines = render_entry(&entry, &Theme::monochrome(), true);
        assert_eq!(texts(&lines), vec!["YOU", "# not a heading"]);
    }
}
