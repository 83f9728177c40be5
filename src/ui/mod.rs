//! Presentation layer for terminal output.
//!
//! - [`markdown`]: the line-oriented markdown parser producing [`markdown::Block`]s.
//! - [`render`]: styles blocks and transcript entries as `ratatui` lines.
//! - [`theme`]: color and modifier policy.
//! - [`ansi`]: writes styled lines to a plain terminal stream.
//!
//! Ownership boundary: this layer never changes block content or order; the
//! transcript itself lives in [`crate::core`].

pub mod ansi;
pub mod markdown;
pub mod render;
pub mod theme;
