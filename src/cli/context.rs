//! Shared wiring for commands that talk to the model or the session store.

use std::error::Error;
use std::sync::Arc;

use tracing::debug;

use crate::core::chat::{ChatService, ChatSettings};
use crate::core::config::Config;
use crate::core::keyring::resolve_api_key;
use crate::core::session::FileSessionStore;
use crate::providers::gemini::GeminiClient;

const MISSING_KEY_HELP: &str =
    "No API key found. Set GEMINI_API_KEY or run `mande auth` to store one in the system keyring.";

pub fn gemini_client(
    config: &Config,
    model_override: Option<&str>,
) -> Result<GeminiClient, Box<dyn Error>> {
    let Some((api_key, source)) = resolve_api_key()? else {
        return Err(MISSING_KEY_HELP.into());
    };
    debug!(%source, "resolved API key");

    let model = model_override.unwrap_or_else(|| config.model());
    Ok(GeminiClient::new(
        reqwest::Client::builder().build()?,
        config.base_url(),
        api_key,
        model,
        config.image_model(),
    ))
}

pub fn session_store(config: &Config) -> Result<Arc<FileSessionStore>, Box<dyn Error>> {
    let path = config
        .sessions_path()
        .ok_or("Could not determine where to keep sessions; set sessions-path")?;
    Ok(Arc::new(FileSessionStore::new(path)))
}

pub fn chat_settings(config: &Config) -> ChatSettings {
    ChatSettings {
        system_instruction: config.system_instruction().to_string(),
        aspect_ratio: config.aspect_ratio().to_string(),
        image_size: config.image_size.map(|size| size.to_string()),
    }
}

pub fn chat_service(
    config: &Config,
    model_override: Option<&str>,
) -> Result<ChatService, Box<dyn Error>> {
    let client = Arc::new(gemini_client(config, model_override)?);
    Ok(ChatService::new(
        client.clone(),
        client,
        session_store(config)?,
        chat_settings(config),
    ))
}
