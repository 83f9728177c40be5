use std::error::Error;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use crate::ui::ansi::{write_plain, write_styled};
use crate::ui::render::render_markdown;
use crate::ui::theme::Theme;

/// Render a markdown file, or stdin when no file is given.
pub fn run_render(file: Option<PathBuf>, theme: &str, plain: bool) -> Result<(), Box<dyn Error>> {
    let text = match file {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let mut stdout = io::stdout();
    if plain || !stdout.is_terminal() {
        write_plain(&mut stdout, &render_markdown(&text, &Theme::monochrome()))?;
    } else {
        write_styled(&mut stdout, &render_markdown(&text, &Theme::from_name(theme)))?;
    }
    Ok(())
}
