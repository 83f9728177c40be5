//! Lightweight markdown for chat transcripts.
//!
//! This is deliberately not a CommonMark implementation: it understands
//! headings, flat `*`/`-` list items, fenced code, pipe tables and three inline
//! styles, which is what model answers in the transcript actually use. Both
//! entry points are total over arbitrary text.

mod inline;
mod parser;
mod table;

#[cfg(test)]
mod tests;

pub use inline::{parse_inline, StyledSpan};
pub use parser::{render_blocks, Block, BlockRenderer, InlineText};
pub use table::{CardField, Table};
