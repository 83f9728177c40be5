use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::core::chat::{ChatService, ChatSettings};
use crate::core::message::Chunk;
use crate::core::retry::{RetryExecutor, RetryPolicy, Sleeper};
use crate::core::session::MemorySessionStore;
use crate::providers::{
    ChunkStream, ImageProvider, ImageRequest, ImageResponse, ModelProvider, ProviderError,
    StreamRequest,
};

/// Sleeper that returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays_ms(&self) -> Vec<u64> {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|delay| delay.as_millis() as u64)
            .collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delay);
    }
}

enum ScriptedOpen {
    Fail(ProviderError),
    Stream {
        items: Vec<Result<Chunk, ProviderError>>,
        hang: bool,
    },
}

/// Model provider that replays a fixed script, one entry per
/// `stream_generate` call.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ScriptedOpen>>,
    requests: Mutex<Vec<StreamRequest>>,
    opens: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, open: ScriptedOpen) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(open);
        self
    }

    /// Next call fails before any stream exists.
    pub fn then_open_error(self, err: ProviderError) -> Self {
        self.push(ScriptedOpen::Fail(err))
    }

    /// Next call yields these items and ends.
    pub fn then_stream(self, items: Vec<Result<Chunk, ProviderError>>) -> Self {
        self.push(ScriptedOpen::Stream { items, hang: false })
    }

    /// Next call yields these text chunks and ends.
    pub fn then_texts(self, texts: &[&str]) -> Self {
        self.then_stream(texts.iter().map(|text| Ok(Chunk::text(*text))).collect())
    }

    /// Next call yields these items and then never finishes.
    pub fn then_hang(self, items: Vec<Result<Chunk, ProviderError>>) -> Self {
        self.push(ScriptedOpen::Stream { items, hang: true })
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn stream_generate(&self, request: &StreamRequest) -> Result<ChunkStream, ProviderError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(ScriptedOpen::Fail(err)) => Err(err),
            Some(ScriptedOpen::Stream { items, hang: false }) => Ok(stream::iter(items).boxed()),
            Some(ScriptedOpen::Stream { items, hang: true }) => {
                Ok(stream::iter(items).chain(stream::pending()).boxed())
            }
            None => Err(ProviderError::new("script exhausted")),
        }
    }
}

/// Image provider returning queued responses in order.
#[derive(Default)]
pub struct FakeImageProvider {
    responses: Mutex<VecDeque<Result<ImageResponse, ProviderError>>>,
    requests: Mutex<Vec<ImageRequest>>,
}

impl FakeImageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, response: Result<ImageResponse, ProviderError>) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ImageProvider for FakeImageProvider {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageResponse, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::new("no scripted image response")))
    }
}

/// Everything a chat test needs to inspect after a turn.
pub struct TestChat {
    pub service: Arc<ChatService>,
    pub provider: Arc<ScriptedProvider>,
    pub images: Arc<FakeImageProvider>,
    pub sessions: Arc<MemorySessionStore>,
    pub sleeper: Arc<RecordingSleeper>,
}

pub fn create_test_chat(provider: ScriptedProvider, images: FakeImageProvider) -> TestChat {
    let provider = Arc::new(provider);
    let images = Arc::new(images);
    let sessions = Arc::new(MemorySessionStore::new());
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = ChatService::new(
        provider.clone(),
        images.clone(),
        sessions.clone(),
        ChatSettings {
            system_instruction: "Answer like a clerk.".to_string(),
            aspect_ratio: "16:9".to_string(),
            image_size: None,
        },
    )
    .with_retry(RetryExecutor::new(RetryPolicy::default(), sleeper.clone()));

    TestChat {
        service: Arc::new(service),
        provider,
        images,
        sessions,
        sleeper,
    }
}
