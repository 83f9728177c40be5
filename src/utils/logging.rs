use crate::core::message::{Role, TranscriptEntry};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Plain-text transcript log, appended one finalized entry at a time.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl TranscriptLog {
    pub fn new(log_file: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut log = TranscriptLog {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = log_file {
            log.set_log_file(path)?;
        }
        Ok(log)
    }

    pub fn set_log_file(&mut self, path: PathBuf) -> Result<String, Box<dyn std::error::Error>> {
        // Fail early if the file cannot be created or appended to
        Self::test_file_access(&path)?;

        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn status_string(&self) -> String {
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), active) => format!(
                "{} ({})",
                if active { "active" } else { "paused" },
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
        }
    }

    pub fn pause(&mut self) {
        self.is_active = false;
    }

    /// Append one entry. System entries and entries still streaming are skipped.
    pub fn log_entry(&self, entry: &TranscriptEntry) -> Result<(), Box<dyn std::error::Error>> {
        let Some(path) = self.file_path.as_deref().filter(|_| self.is_active) else {
            return Ok(());
        };
        if entry.is_streaming || entry.role == Role::System {
            return Ok(());
        }
        Self::write_to_log(path, &format_entry(entry))
    }

    fn write_to_log(path: &Path, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between entries
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }

    fn test_file_access(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.flush()?;
        Ok(())
    }
}

fn format_entry(entry: &TranscriptEntry) -> String {
    let mut out = match entry.role {
        Role::User => format!("You: {}", entry.text),
        _ => entry.text.clone(),
    };
    for source in entry
        .grounding
        .web_sources
        .iter()
        .chain(&entry.grounding.map_sources)
    {
        out.push_str(&format!("\n- {} <{}>", source.title, source.uri));
    }
    out
}
