//! `config set` / `config unset` key handling.

use crate::core::config::data::{AspectRatio, Config, ImageSize};
use crate::core::config::io::ConfigError;
use std::path::PathBuf;

pub const KEYS: &[&str] = &[
    "model",
    "image-model",
    "base-url",
    "aspect-ratio",
    "image-size",
    "markdown",
    "log-level",
    "sessions-path",
    "system-instruction",
];

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn non_empty(key: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(key, value, "value cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(invalid(key, value, "expected on or off")),
    }
}

impl Config {
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "model" => self.model = Some(non_empty(key, value)?),
            "image-model" => self.image_model = Some(non_empty(key, value)?),
            "base-url" => {
                let url = non_empty(key, value)?;
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(invalid(key, value, "expected an http(s) URL"));
                }
                self.base_url = Some(url);
            }
            "aspect-ratio" => {
                let ratio = value
                    .parse::<AspectRatio>()
                    .map_err(|reason| invalid(key, value, reason))?;
                self.aspect_ratio = Some(ratio);
            }
            "image-size" => {
                let size = value
                    .parse::<ImageSize>()
                    .map_err(|reason| invalid(key, value, reason))?;
                self.image_size = Some(size);
            }
            "markdown" => self.markdown = Some(parse_bool(key, value)?),
            "log-level" => self.log_level = Some(non_empty(key, value)?),
            "sessions-path" => self.sessions_path = Some(PathBuf::from(non_empty(key, value)?)),
            "system-instruction" => self.system_instruction = Some(non_empty(key, value)?),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn unset(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "model" => self.model = None,
            "image-model" => self.image_model = None,
            "base-url" => self.base_url = None,
            "aspect-ratio" => self.aspect_ratio = None,
            "image-size" => self.image_size = None,
            "markdown" => self.markdown = None,
            "log-level" => self.log_level = None,
            "sessions-path" => self.sessions_path = None,
            "system-instruction" => self.system_instruction = None,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}
