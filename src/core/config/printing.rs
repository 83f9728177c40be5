use crate::core::config::data::{path_display, Config};

fn explicit_or_default(value: Option<impl std::fmt::Display>, fallback: &str) -> String {
    match value {
        Some(value) => value.to_string(),
        None => format!("{fallback} (default)"),
    }
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!(
            "  model: {}",
            explicit_or_default(self.model.as_deref(), self.model())
        );
        println!(
            "  image-model: {}",
            explicit_or_default(self.image_model.as_deref(), self.image_model())
        );
        println!(
            "  base-url: {}",
            explicit_or_default(self.base_url.as_deref(), self.base_url())
        );
        println!(
            "  aspect-ratio: {}",
            explicit_or_default(self.aspect_ratio, self.aspect_ratio().as_str())
        );
        match self.image_size {
            Some(size) => println!("  image-size: {size}"),
            None => println!("  image-size: (unset)"),
        }
        match self.markdown_enabled() {
            true => println!("  markdown: on"),
            false => println!("  markdown: off"),
        }
        println!(
            "  log-level: {}",
            explicit_or_default(self.log_level.as_deref(), self.log_level())
        );
        match self.sessions_path() {
            Some(path) => println!("  sessions-path: {}", path_display(path)),
            None => println!("  sessions-path: (unavailable)"),
        }
        match &self.system_instruction {
            Some(text) => println!("  system-instruction: {} chars (custom)", text.chars().count()),
            None => println!("  system-instruction: (default)"),
        }
    }
}
