//! Folding a streamed model answer into the transcript.
//!
//! One [`StreamAggregator`] drives one model turn:
//! `Idle -> AwaitingFirstChunk -> Streaming -> Finalized`, with `Failed`
//! reachable from either waiting state. Every chunk is applied to the
//! transcript as it arrives so observers see partial text.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::message::TranscriptEntry;
use crate::core::retry::RetryExecutor;
use crate::core::session::{Session, SessionStore};
use crate::core::transcript::TranscriptHandle;
use crate::providers::{ChunkStream, ModelProvider, ProviderError, StreamRequest};

const INTERNAL_ERROR_PREFIX: &str = "INTERNAL BUREAUCRACY ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingFirstChunk,
    Streaming,
    Finalized,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Stream completed; the entry was frozen and the session persisted.
    Finalized { entry_id: String },
    /// Stream broke mid-answer; the entry carries an inline error marker.
    Failed { entry_id: String, message: String },
    /// The request never produced a stream; a standalone error entry was added.
    ConnectionFailed { entry_id: String, message: String },
    /// The caller stopped waiting. Nothing was persisted.
    Abandoned { entry_id: Option<String> },
}

impl TurnOutcome {
    pub fn entry_id(&self) -> Option<&str> {
        match self {
            TurnOutcome::Finalized { entry_id }
            | TurnOutcome::Failed { entry_id, .. }
            | TurnOutcome::ConnectionFailed { entry_id, .. } => Some(entry_id),
            TurnOutcome::Abandoned { entry_id } => entry_id.as_deref(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TurnOutcome::Finalized { .. })
    }
}

/// Append a standalone model entry describing an internal failure.
pub fn push_internal_error(transcript: &TranscriptHandle, message: &str) -> String {
    transcript.update(|store| {
        let id = store.next_id();
        let entry = TranscriptEntry::model(id.clone(), format!("{INTERNAL_ERROR_PREFIX}: {message}"));
        // next_id never returns an id already present.
        let _ = store.push(entry);
        id
    })
}

pub struct StreamAggregator {
    transcript: TranscriptHandle,
    sessions: Arc<dyn SessionStore>,
    session_id: String,
    state: TurnState,
    entry_id: Option<String>,
}

impl StreamAggregator {
    pub fn new(
        transcript: TranscriptHandle,
        sessions: Arc<dyn SessionStore>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            transcript,
            sessions,
            session_id: session_id.into(),
            state: TurnState::Idle,
            entry_id: None,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    fn transition(&mut self, next: TurnState) {
        debug!(from = ?self.state, to = ?next, "turn state");
        self.state = next;
    }

    /// Open the stream through the retry executor and consume it.
    pub async fn run(
        mut self,
        provider: &dyn ModelProvider,
        retry: &RetryExecutor,
        request: &StreamRequest,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        self.transition(TurnState::AwaitingFirstChunk);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.abandon(),
            opened = retry.execute(|| provider.stream_generate(request)) => opened,
        };

        match opened {
            Ok(stream) => self.consume(stream, cancel).await,
            Err(err) => self.connection_failed(err),
        }
    }

    /// Consume an already opened stream until it ends, fails or is cancelled.
    pub async fn consume(mut self, mut stream: ChunkStream, cancel: &CancellationToken) -> TurnOutcome {
        if self.state == TurnState::Idle {
            self.transition(TurnState::AwaitingFirstChunk);
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.abandon(),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let id = self.ensure_entry();
                    self.transcript.update(|store| store.apply_chunk(&id, chunk));
                }
                Some(Err(err)) => return self.fail(err),
                None => return self.finish().await,
            }
        }
    }

    /// Create the streaming entry on first use.
    fn ensure_entry(&mut self) -> String {
        if let Some(id) = &self.entry_id {
            return id.clone();
        }
        let id = self.transcript.update(|store| {
            let id = store.next_id();
            let _ = store.push(TranscriptEntry::streaming(id.clone()));
            id
        });
        self.transition(TurnState::Streaming);
        self.entry_id = Some(id.clone());
        id
    }

    async fn finish(mut self) -> TurnOutcome {
        let id = self.ensure_entry();
        self.transcript.update(|store| store.finalize(&id));
        self.transition(TurnState::Finalized);

        let session = Session::new(self.session_id.clone(), self.transcript.snapshot());
        if let Err(err) = self.sessions.put(session).await {
            warn!(session = %self.session_id, "failed to persist session: {err}");
        }
        TurnOutcome::Finalized { entry_id: id }
    }

    fn fail(mut self, err: ProviderError) -> TurnOutcome {
        let id = self.ensure_entry();
        let message = err.to_string();
        warn!(entry = %id, "stream failed mid-answer: {message}");
        self.transcript.update(|store| store.fail(&id, &message));
        self.transition(TurnState::Failed);
        TurnOutcome::Failed {
            entry_id: id,
            message,
        }
    }

    fn connection_failed(mut self, err: ProviderError) -> TurnOutcome {
        let message = err.to_string();
        warn!("request failed before streaming: {message}");
        let entry_id = push_internal_error(&self.transcript, &message);
        self.transition(TurnState::Failed);
        TurnOutcome::ConnectionFailed { entry_id, message }
    }

    fn abandon(self) -> TurnOutcome {
        debug!(state = ?self.state, "turn abandoned");
        if let Some(id) = &self.entry_id {
            self.transcript.update(|store| {
                store.update_streaming(id, |entry| entry.is_streaming = false)
            });
        }
        TurnOutcome::Abandoned {
            entry_id: self.entry_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{Chunk, GroundingCitation};
    use crate::core::retry::RetryPolicy;
    use crate::core::session::MemorySessionStore;
    use crate::providers::GenerationSettings;
    use crate::utils::test_utils::{RecordingSleeper, ScriptedProvider};

    fn request() -> StreamRequest {
        StreamRequest {
            history: Vec::new(),
            prompt: "hola".into(),
            image: None,
            settings: GenerationSettings::default(),
        }
    }

    struct Harness {
        transcript: TranscriptHandle,
        sessions: Arc<MemorySessionStore>,
        retry: RetryExecutor,
        sleeper: Arc<RecordingSleeper>,
    }

    impl Harness {
        fn new() -> Self {
            let sleeper = Arc::new(RecordingSleeper::default());
            Self {
                transcript: TranscriptHandle::default(),
                sessions: Arc::new(MemorySessionStore::new()),
                retry: RetryExecutor::new(RetryPolicy::default(), sleeper.clone()),
                sleeper,
            }
        }

        async fn run(&self, provider: &ScriptedProvider) -> TurnOutcome {
            StreamAggregator::new(self.transcript.clone(), self.sessions.clone(), "42")
                .run(provider, &self.retry, &request(), &CancellationToken::new())
                .await
        }

        fn entry(&self, outcome: &TurnOutcome) -> TranscriptEntry {
            let id = outcome.entry_id().expect("entry id");
            self.transcript.entry(id).expect("entry present")
        }
    }

    #[tokio::test]
    async fn chunks_accumulate_and_persist_once() {
        let harness = Harness::new();
        let provider = ScriptedProvider::new().then_texts(&["Hola", " mun", "do"]);

        let outcome = harness.run(&provider).await;

        assert!(outcome.is_success());
        let entry = harness.entry(&outcome);
        assert_eq!(entry.text, "Hola mundo");
        assert!(!entry.is_streaming);
        assert_eq!(harness.sessions.put_count(), 1);
        let saved = harness.sessions.get("42").await.expect("get").expect("saved");
        assert_eq!(saved.entries.last().map(|e| e.text.as_str()), Some("Hola mundo"));
    }

    #[tokio::test]
    async fn repeated_citations_are_all_kept_in_order() {
        let harness = Harness::new();
        let provider = ScriptedProvider::new().then_stream(vec![
            Ok(Chunk::text("a").with_citation(GroundingCitation::web("https://x", "X"))),
            Ok(Chunk::text("b").with_citation(GroundingCitation::web("https://x", "X"))),
            Ok(Chunk::text("c").with_citation(GroundingCitation::map("https://m", "Place"))),
        ]);

        let outcome = harness.run(&provider).await;
        let grounding = harness.entry(&outcome).grounding;
        assert_eq!(grounding.web_sources.len(), 2);
        assert_eq!(grounding.web_sources[0], grounding.web_sources[1]);
        assert_eq!(grounding.map_sources.len(), 1);
    }

    #[tokio::test]
    async fn mid_stream_failure_marks_entry_and_skips_persistence() {
        let harness = Harness::new();
        let provider = ScriptedProvider::new().then_stream(vec![
            Ok(Chunk::text("Hola")),
            Err(ProviderError::new("socket closed")),
        ]);

        let outcome = harness.run(&provider).await;

        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        let entry = harness.entry(&outcome);
        assert_eq!(entry.text, "Hola\n[ERROR: socket closed]");
        assert!(!entry.is_streaming);
        assert_eq!(harness.sessions.put_count(), 0);
    }

    #[tokio::test]
    async fn connection_failure_appends_standalone_error_entry() {
        let harness = Harness::new();
        let provider =
            ScriptedProvider::new().then_open_error(ProviderError::with_status(400, "bad key"));

        let outcome = harness.run(&provider).await;

        assert!(matches!(outcome, TurnOutcome::ConnectionFailed { .. }));
        let entries = harness.transcript.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "INTERNAL BUREAUCRACY ERROR: bad key");
        assert!(!entries[0].is_streaming);
        assert_eq!(provider.open_count(), 1);
        assert_eq!(harness.sessions.put_count(), 0);
    }

    #[tokio::test]
    async fn transient_open_errors_are_retried_before_streaming() {
        let harness = Harness::new();
        let provider = ScriptedProvider::new()
            .then_open_error(ProviderError::with_status(429, "quota"))
            .then_open_error(ProviderError::with_status(503, "busy"))
            .then_texts(&["ok"]);

        let outcome = harness.run(&provider).await;

        assert!(outcome.is_success());
        assert_eq!(provider.open_count(), 3);
        assert_eq!(harness.sleeper.delays_ms(), vec![2000, 4000]);
        assert_eq!(harness.transcript.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn empty_stream_finalizes_an_empty_entry() {
        let harness = Harness::new();
        let provider = ScriptedProvider::new().then_texts(&[]);

        let outcome = harness.run(&provider).await;

        let entry = harness.entry(&outcome);
        assert!(entry.text.is_empty());
        assert!(!entry.is_streaming);
        assert_eq!(harness.sessions.put_count(), 1);
    }

    #[tokio::test]
    async fn partial_text_is_visible_while_streaming() {
        let harness = Harness::new();
        let provider = ScriptedProvider::new().then_hang(vec![Ok(Chunk::text("Hola"))]);
        let cancel = CancellationToken::new();
        let mut revisions = harness.transcript.subscribe();

        let transcript = harness.transcript.clone();
        let sessions = harness.sessions.clone();
        let retry = harness.retry.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            StreamAggregator::new(transcript, sessions, "42")
                .run(&provider, &retry, &request(), &token)
                .await
        });

        loop {
            revisions.changed().await.expect("transcript alive");
            let seen = harness.transcript.snapshot();
            if seen.iter().any(|entry| entry.text == "Hola") {
                assert!(seen[0].is_streaming);
                break;
            }
        }

        cancel.cancel();
        let outcome = task.await.expect("task joins");
        assert!(matches!(outcome, TurnOutcome::Abandoned { entry_id: Some(_) }));
        assert!(!harness.transcript.snapshot()[0].is_streaming);
        assert_eq!(harness.sessions.put_count(), 0);
    }
}
