//! Image generation and editing from the command line.

use std::error::Error;
use std::path::{Path, PathBuf};

use crate::cli::context;
use crate::cli::say::{finish, load_image};
use crate::core::chat::{ChatMode, SendOutcome, SendRequest};
use crate::core::chat_stream::TurnOutcome;
use crate::core::config::{path_display, AspectRatio, Config, ImageSize};
use crate::core::message::ImagePayload;
use crate::core::retry::RetryExecutor;
use crate::providers::{ImageProvider, ImageRequest};

pub struct ImageOptions {
    pub prompt: Vec<String>,
    pub edit: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub aspect_ratio: Option<AspectRatio>,
    pub size: Option<ImageSize>,
}

pub async fn run_image(options: ImageOptions) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    if let Some(ratio) = options.aspect_ratio {
        config.aspect_ratio = Some(ratio);
    }
    if let Some(size) = options.size {
        config.image_size = Some(size);
    }
    let prompt = options.prompt.join(" ");

    let (text, images) = match options.edit {
        Some(source) => edit_image(&config, &source, prompt).await?,
        None => generate_image(&config, prompt).await?,
    };

    if !text.trim().is_empty() {
        println!("{}", text.trim());
    }
    if images.is_empty() {
        eprintln!("⚠️  The model returned no image");
        return Ok(());
    }
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    for path in save_images(&images, &options.out_dir, &stamp)? {
        println!("✅ Saved {}", path_display(&path));
    }
    Ok(())
}

// Runs as a chat turn so the result lands in a saved session.
async fn generate_image(
    config: &Config,
    prompt: String,
) -> Result<(String, Vec<ImagePayload>), Box<dyn Error>> {
    let chat = context::chat_service(config, None)?;
    let outcome = chat
        .send(SendRequest::text(prompt).with_mode(ChatMode::ImageGeneration))
        .await;
    let entry_id = match outcome {
        SendOutcome::Completed(TurnOutcome::Finalized { entry_id }) => entry_id,
        other => {
            finish(other)?;
            return Ok((String::new(), Vec::new()));
        }
    };
    let entry = chat
        .transcript()
        .entry(&entry_id)
        .ok_or("image entry disappeared from the transcript")?;
    Ok((entry.text, entry.images))
}

// An explicit edit goes straight to the image model with the source attached.
async fn edit_image(
    config: &Config,
    source: &Path,
    prompt: String,
) -> Result<(String, Vec<ImagePayload>), Box<dyn Error>> {
    if prompt.trim().is_empty() {
        return Err("Describe the edit to make".into());
    }
    let client = context::gemini_client(config, None)?;
    let settings = context::chat_settings(config);
    let request = ImageRequest {
        prompt,
        source_image: Some(load_image(source)?),
        aspect_ratio: settings.aspect_ratio,
        image_size: settings.image_size,
    };
    let response = RetryExecutor::default()
        .execute(|| client.generate(&request))
        .await?;
    Ok((response.text_parts.concat(), response.images))
}

/// Write images as `mande-<stamp>-<n>.<ext>` under `dir`.
pub fn save_images(
    images: &[ImagePayload],
    dir: &Path,
    stamp: &str,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    std::fs::create_dir_all(dir)?;
    let mut saved = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let path = dir.join(format!("mande-{stamp}-{}.{}", index + 1, image.extension()));
        std::fs::write(&path, &image.data)
            .map_err(|err| format!("Failed to write {}: {err}", path.display()))?;
        saved.push(path);
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn images_are_numbered_with_their_extension() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("renders");
        let images = vec![
            ImagePayload::new("image/png", vec![1, 2, 3]),
            ImagePayload::new("image/jpeg", vec![4]),
        ];

        let saved = save_images(&images, &out, "20250101-120000").expect("save");
        assert_eq!(
            saved,
            vec![
                out.join("mande-20250101-120000-1.png"),
                out.join("mande-20250101-120000-2.jpg"),
            ]
        );
        assert_eq!(std::fs::read(&saved[0]).expect("read"), vec![1, 2, 3]);
    }
}
