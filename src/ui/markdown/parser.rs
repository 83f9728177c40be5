use serde::Serialize;

use super::inline::{parse_inline, StyledSpan};
use super::table::{Table, TableBuffer};

/// Text that is drawn with inline styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineText {
    pub raw: String,
    pub spans: Vec<StyledSpan>,
}

impl InlineText {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let spans = parse_inline(&raw).unwrap_or_default();
        Self { raw, spans }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// One structural unit of a rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Block {
    Heading { level: usize, text: InlineText },
    ListItem(InlineText),
    Paragraph(InlineText),
    BlankLine,
    /// A line inside a fenced code block, kept exactly as written.
    CodeLine(String),
    Table(Table),
}

impl Block {
    pub fn heading(level: usize, text: &str) -> Self {
        Block::Heading {
            level,
            text: InlineText::parse(text),
        }
    }

    pub fn list_item(text: &str) -> Self {
        Block::ListItem(InlineText::parse(text))
    }

    pub fn paragraph(text: &str) -> Self {
        Block::Paragraph(InlineText::parse(text))
    }
}

/// Line scanner turning message text into [`Block`]s.
///
/// A renderer carries state between lines (pending table rows and whether a
/// code fence is open), so each message gets a fresh one.
#[derive(Debug, Default)]
pub struct BlockRenderer {
    table: TableBuffer,
    in_code_block: bool,
    blocks: Vec<Block>,
}

impl BlockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(mut self, text: &str) -> Vec<Block> {
        for line in text.split('\n') {
            self.push_line(line);
        }
        self.flush_table();
        self.blocks
    }

    fn push_line(&mut self, line: &str) {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            self.flush_table();
            self.in_code_block = !self.in_code_block;
            return;
        }

        if self.in_code_block {
            self.blocks.push(Block::CodeLine(line.to_string()));
            return;
        }

        if trimmed.starts_with('|') {
            self.table.push(line);
            return;
        }

        self.flush_table();

        if trimmed.is_empty() {
            self.blocks.push(Block::BlankLine);
        } else if trimmed.starts_with('#') {
            let level = trimmed.chars().take_while(|ch| *ch == '#').count().max(1);
            // '#' is one byte, so the char count is also the byte offset.
            let text = trimmed[level..].trim();
            self.blocks.push(Block::heading(level, text));
        } else if let Some(text) = list_item_text(line) {
            self.blocks.push(Block::list_item(text));
        } else {
            self.blocks.push(Block::paragraph(line));
        }
    }

    fn flush_table(&mut self) {
        if self.table.is_empty() {
            return;
        }
        if let Some(table) = self.table.flush() {
            self.blocks.push(Block::Table(table));
        }
    }
}

/// `* item` / `- item` at the very start of the line, marker followed by whitespace.
fn list_item_text(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('*').or_else(|| line.strip_prefix('-'))?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Render `text` into blocks with a fresh [`BlockRenderer`].
pub fn render_blocks(text: &str) -> Vec<Block> {
    BlockRenderer::new().render(text)
}
