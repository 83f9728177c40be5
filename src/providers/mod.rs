//! Collaborators that talk to a generative model.
//!
//! The chat core only ever sees these traits. [`gemini::GeminiClient`] is the
//! production implementation; tests use the scripted fakes in
//! `utils::test_utils`.

pub mod error;
pub mod gemini;

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::core::message::{Chunk, ImagePayload, Role};

pub use error::ProviderError;

/// Lazy, finite, non-restartable sequence of decoded chunks.
pub type ChunkStream = BoxStream<'static, Result<Chunk, ProviderError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    Search,
    Maps,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSettings {
    pub system_instruction: String,
    pub tools: BTreeSet<Tool>,
}

/// One earlier turn of the conversation as sent back to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
    pub images: Vec<ImagePayload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub history: Vec<HistoryTurn>,
    pub prompt: String,
    pub image: Option<ImagePayload>,
    pub settings: GenerationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub source_image: Option<ImagePayload>,
    pub aspect_ratio: String,
    pub image_size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageResponse {
    pub text_parts: Vec<String>,
    pub images: Vec<ImagePayload>,
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Open a streamed answer. Errors returned here happen before any chunk
    /// exists; errors yielded by the stream happen mid-answer.
    async fn stream_generate(&self, request: &StreamRequest) -> Result<ChunkStream, ProviderError>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageResponse, ProviderError>;
}
