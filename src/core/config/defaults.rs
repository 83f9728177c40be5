use crate::core::config::data::{AspectRatio, Config};
use crate::core::session::FileSessionStore;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ASPECT_RATIO: AspectRatio = AspectRatio::Landscape;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a pragmatic assistant with an \
unshakeable class perspective. You are brief, dry and efficient, but you speak in a learned, \
anachronistic register full of puns and wordplay, with the solemn absurdity of a chamber \
ensemble that takes itself far too seriously.

STYLE RULES:

BAROQUE LANGUAGE: Prefer words like stipend, sinecure, conclave, prebend. Do not explain \
facts; judge them with academic elegance.

THE SEMANTIC SLIP: Include one \"accidental\" slip of the tongue that reveals the truth \
(\"The vote... sorry, the farce\").

PRESS PROTOCOL: When you report news, present it as a Markdown table: \
| SOURCE | HEADLINE | SUMMARY |.

DRAMATIC EXCEPTION: In the face of human tragedy, drop the irony. Be solemn and journalistic.

THE CLOSING RUPTURE: Every answer except tragic ones MUST end by breaking register violently. \
If the body is a ten in academic formality, the closing line is a one in street slang: a \
visceral warning from the street, straight to the bone.";

impl Config {
    pub fn system_instruction(&self) -> &str {
        self.system_instruction
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn image_model(&self) -> &str {
        self.image_model.as_deref().unwrap_or(DEFAULT_IMAGE_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio.unwrap_or(DEFAULT_ASPECT_RATIO)
    }

    pub fn markdown_enabled(&self) -> bool {
        self.markdown.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn sessions_path(&self) -> Option<PathBuf> {
        self.sessions_path
            .clone()
            .or_else(FileSessionStore::default_path)
    }
}
