//! Turn orchestration for one conversation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::chat_stream::{push_internal_error, StreamAggregator, TurnOutcome};
use crate::core::message::{ImagePayload, Role, TranscriptEntry};
use crate::core::retry::RetryExecutor;
use crate::core::routing::{is_edit_request, tools_for_prompt};
use crate::core::session::{Session, SessionStore, SessionStoreError, UNSAVED_SESSION_ID};
use crate::core::transcript::{TranscriptHandle, TranscriptStore};
use crate::providers::{
    GenerationSettings, HistoryTurn, ImageProvider, ImageRequest, ModelProvider, StreamRequest,
};

pub const GREETING: &str = "The processing system operates under strict parameters. \
State your petition with due diligence... and move it, I haven't got all day.";
const IMAGE_DONE_TEXT: &str = "VISUAL PRODUCTION COMPLETE.";
const IMAGE_FALLBACK_PROMPT: &str = "Image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    Chat,
    ImageGeneration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub system_instruction: String,
    pub aspect_ratio: String,
    pub image_size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendRequest {
    pub text: String,
    pub attachment: Option<ImagePayload>,
    pub hidden: bool,
    pub mode: ChatMode,
}

impl SendRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_attachment(mut self, image: ImagePayload) -> Self {
        self.attachment = Some(image);
        self
    }

    pub fn with_mode(mut self, mode: ChatMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Another turn was in flight or there was nothing to send.
    Rejected,
    Completed(TurnOutcome),
}

/// Clears the in-flight flag when a turn ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub fn greeting_entry() -> TranscriptEntry {
    TranscriptEntry::model(UNSAVED_SESSION_ID, GREETING)
}

/// One conversation: its transcript, its session id and its collaborators.
///
/// At most one turn runs at a time; a `send` issued while another is in
/// flight is rejected rather than queued.
pub struct ChatService {
    transcript: TranscriptHandle,
    session_id: Mutex<String>,
    sessions: Arc<dyn SessionStore>,
    model: Arc<dyn ModelProvider>,
    images: Arc<dyn ImageProvider>,
    retry: RetryExecutor,
    settings: ChatSettings,
    in_flight: AtomicBool,
}

impl ChatService {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        images: Arc<dyn ImageProvider>,
        sessions: Arc<dyn SessionStore>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            transcript: TranscriptHandle::new(TranscriptStore::from_entries(vec![greeting_entry()])),
            session_id: Mutex::new(UNSAVED_SESSION_ID.to_string()),
            sessions,
            model,
            images,
            retry: RetryExecutor::default(),
            settings,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn transcript(&self) -> &TranscriptHandle {
        &self.transcript
    }

    pub fn session_id(&self) -> String {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session_id(&self, id: String) {
        *self.session_id.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    /// Reset to an unsaved conversation holding only the greeting.
    pub fn start_new_session(&self) -> bool {
        let Some(_guard) = self.try_begin() else {
            return false;
        };
        self.set_session_id(UNSAVED_SESSION_ID.to_string());
        self.transcript
            .update(|store| store.replace_all(vec![greeting_entry()]));
        true
    }

    /// Replace the transcript with a saved session. Returns `Ok(false)` when
    /// the id is unknown or a turn is in flight.
    pub async fn load_session(&self, id: &str) -> Result<bool, SessionStoreError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(false);
        };
        let Some(session) = self.sessions.get(id).await? else {
            return Ok(false);
        };
        debug!(id = %session.id, entries = session.entries.len(), "loaded session");
        self.set_session_id(session.id);
        self.transcript
            .update(|store| store.replace_all(session.entries));
        Ok(true)
    }

    /// Add an entry that is not a model turn (a press clipping, for instance).
    /// It is saved with the next persisted turn.
    pub fn append_entry(&self, entry: impl FnOnce(String) -> TranscriptEntry) -> String {
        self.transcript.update(|store| {
            let id = store.next_id();
            let _ = store.push(entry(id.clone()));
            id
        })
    }

    async fn persist(&self, session_id: &str) {
        let session = Session::new(session_id, self.transcript.snapshot());
        if let Err(err) = self.sessions.put(session).await {
            warn!(session = %session_id, "failed to persist session: {err}");
        }
    }

    /// Turn the unsaved sentinel into a real id on first send.
    fn claim_session_id(&self, now_id: &str) -> String {
        let mut current = self.session_id.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == UNSAVED_SESSION_ID {
            *current = now_id.to_string();
            info!(id = %now_id, "started session");
        }
        current.clone()
    }

    pub async fn send(&self, request: SendRequest) -> SendOutcome {
        self.send_with_cancel(request, &CancellationToken::new()).await
    }

    pub async fn send_with_cancel(
        &self,
        request: SendRequest,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        if request.text.trim().is_empty() && request.attachment.is_none() {
            return SendOutcome::Rejected;
        }
        let Some(_guard) = self.try_begin() else {
            debug!("send rejected: a turn is already in flight");
            return SendOutcome::Rejected;
        };

        let history = self.history();
        let user_entry_id = self.transcript.update(|store| {
            let id = store.next_id();
            let mut entry = TranscriptEntry::user(id.clone(), request.text.clone())
                .with_hidden(request.hidden);
            if let Some(image) = &request.attachment {
                entry = entry.with_images(vec![image.clone()]);
            }
            let _ = store.push(entry);
            id
        });
        let session_id = self.claim_session_id(&user_entry_id);
        self.persist(&session_id).await;

        let wants_edit = request.attachment.is_some() && is_edit_request(&request.text);
        let outcome = if request.mode == ChatMode::ImageGeneration || wants_edit {
            self.image_turn(&request, &session_id, cancel).await
        } else {
            let stream_request = StreamRequest {
                history,
                prompt: request.text.clone(),
                image: request.attachment.clone(),
                settings: GenerationSettings {
                    system_instruction: self.settings.system_instruction.clone(),
                    tools: tools_for_prompt(&request.text),
                },
            };
            StreamAggregator::new(self.transcript.clone(), self.sessions.clone(), session_id)
                .run(self.model.as_ref(), &self.retry, &stream_request, cancel)
                .await
        };

        SendOutcome::Completed(outcome)
    }

    /// Conversation so far as provider history. System entries stay local.
    fn history(&self) -> Vec<HistoryTurn> {
        self.transcript.read(|store| {
            store
                .entries()
                .iter()
                .filter(|entry| entry.role != Role::System)
                .map(|entry| HistoryTurn {
                    role: entry.role,
                    text: entry.text.clone(),
                    images: entry.images.clone(),
                })
                .collect()
        })
    }

    async fn image_turn(
        &self,
        request: &SendRequest,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let generating = request.mode == ChatMode::ImageGeneration;
        let prompt = if request.text.trim().is_empty() && generating {
            IMAGE_FALLBACK_PROMPT.to_string()
        } else {
            request.text.clone()
        };
        let image_request = ImageRequest {
            prompt,
            // Generate mode ignores attachments.
            source_image: if generating {
                None
            } else {
                request.attachment.clone()
            },
            aspect_ratio: self.settings.aspect_ratio.clone(),
            image_size: self.settings.image_size.clone(),
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TurnOutcome::Abandoned { entry_id: None },
            result = self.retry.execute(|| self.images.generate(&image_request)) => result,
        };

        match result {
            Ok(response) => {
                let mut text = response.text_parts.concat();
                if text.is_empty() && generating {
                    text = IMAGE_DONE_TEXT.to_string();
                }
                let entry_id = self.transcript.update(|store| {
                    let id = store.next_id();
                    let _ = store.push(
                        TranscriptEntry::model(id.clone(), text).with_images(response.images),
                    );
                    id
                });
                self.persist(session_id).await;
                TurnOutcome::Finalized { entry_id }
            }
            Err(err) => {
                let message = err.to_string();
                warn!("image request failed: {message}");
                let entry_id = push_internal_error(&self.transcript, &message);
                TurnOutcome::ConnectionFailed { entry_id, message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Chunk;
    use crate::providers::{ImageResponse, ProviderError, Tool};
    use crate::utils::test_utils::{create_test_chat, FakeImageProvider, ScriptedProvider};

    #[tokio::test]
    async fn first_send_claims_a_session_id_and_persists_user_then_answer() {
        let chat = create_test_chat(
            ScriptedProvider::new().then_texts(&["Hola", " mundo"]),
            FakeImageProvider::new(),
        );
        assert_eq!(chat.service.session_id(), UNSAVED_SESSION_ID);

        let outcome = chat.service.send(SendRequest::text("¿qué trámite?")).await;

        assert!(matches!(outcome, SendOutcome::Completed(TurnOutcome::Finalized { .. })));
        let session_id = chat.service.session_id();
        assert_ne!(session_id, UNSAVED_SESSION_ID);
        // Once for the user entry, once for the finished answer.
        assert_eq!(chat.sessions.put_count(), 2);

        let saved = chat.sessions.get(&session_id).await.expect("get").expect("saved");
        let texts: Vec<&str> = saved.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec![GREETING, "¿qué trámite?", "Hola mundo"]);
        assert_eq!(saved.title, "¿QUÉ TRÁMITE?");
    }

    #[tokio::test]
    async fn blank_input_is_rejected() {
        let chat = create_test_chat(ScriptedProvider::new(), FakeImageProvider::new());
        assert_eq!(chat.service.send(SendRequest::text("   ")).await, SendOutcome::Rejected);
        assert_eq!(chat.provider.open_count(), 0);
        assert_eq!(chat.service.transcript().snapshot().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_send_is_rejected_not_queued() {
        let chat = create_test_chat(
            ScriptedProvider::new().then_hang(vec![Ok(Chunk::text("..."))]),
            FakeImageProvider::new(),
        );
        let mut revisions = chat.service.transcript().subscribe();
        let cancel = CancellationToken::new();

        let service = chat.service.clone();
        let token = cancel.clone();
        let first = tokio::spawn(async move {
            service
                .send_with_cancel(SendRequest::text("first"), &token)
                .await
        });

        revisions.changed().await.expect("user entry appended");
        assert!(chat.service.is_busy());
        assert_eq!(
            chat.service.send(SendRequest::text("second")).await,
            SendOutcome::Rejected
        );

        cancel.cancel();
        let outcome = first.await.expect("join");
        assert!(matches!(
            outcome,
            SendOutcome::Completed(TurnOutcome::Abandoned { .. })
        ));
        assert!(!chat.service.is_busy());
        assert_eq!(chat.provider.open_count(), 1);
    }

    #[tokio::test]
    async fn history_excludes_system_entries_and_tools_follow_the_prompt() {
        let chat = create_test_chat(
            ScriptedProvider::new().then_texts(&["Calle Mayor 1"]),
            FakeImageProvider::new(),
        );
        chat.service.append_entry(|id| TranscriptEntry::new(id, Role::System, "note"));

        chat.service
            .send(SendRequest::text("¿Dónde está el registro civil?"))
            .await;

        let requests = chat.provider.requests();
        assert_eq!(requests.len(), 1);
        let sent = &requests[0];
        assert_eq!(sent.history.len(), 1);
        assert_eq!(sent.history[0].text, GREETING);
        assert_eq!(sent.prompt, "¿Dónde está el registro civil?");
        assert_eq!(sent.settings.system_instruction, "Answer like a clerk.");
        assert!(sent.settings.tools.contains(&Tool::Maps));
        assert!(sent.settings.tools.contains(&Tool::Search));
    }

    #[tokio::test]
    async fn image_mode_uses_fallback_text_and_persists() {
        let chat = create_test_chat(
            ScriptedProvider::new(),
            FakeImageProvider::new().then(Ok(ImageResponse {
                text_parts: Vec::new(),
                images: vec![ImagePayload::new("image/png", vec![1, 2, 3])],
            })),
        );

        let outcome = chat
            .service
            .send(SendRequest::text("a rubber stamp").with_mode(ChatMode::ImageGeneration))
            .await;

        let SendOutcome::Completed(TurnOutcome::Finalized { entry_id }) = outcome else {
            panic!("expected finalized image turn, got {outcome:?}");
        };
        let entry = chat.service.transcript().entry(&entry_id).expect("entry");
        assert_eq!(entry.text, IMAGE_DONE_TEXT);
        assert_eq!(entry.images.len(), 1);
        assert_eq!(chat.images.requests()[0].aspect_ratio, "16:9");
        assert_eq!(chat.sessions.put_count(), 2);
        assert_eq!(chat.provider.open_count(), 0);
    }

    #[tokio::test]
    async fn attachment_with_edit_keyword_routes_to_image_edit() {
        let chat = create_test_chat(
            ScriptedProvider::new(),
            FakeImageProvider::new().then(Ok(ImageResponse {
                text_parts: vec!["Done.".into()],
                images: vec![ImagePayload::new("image/png", vec![7])],
            })),
        );
        let photo = ImagePayload::new("image/jpeg", vec![9, 9]);

        chat.service
            .send(SendRequest::text("Editar: remove the stamp").with_attachment(photo.clone()))
            .await;

        let requests = chat.images.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].source_image, Some(photo));
        let last = chat.service.transcript().snapshot().pop().expect("entry");
        assert_eq!(last.text, "Done.");
    }

    #[tokio::test]
    async fn image_failure_becomes_internal_error_entry() {
        let chat = create_test_chat(
            ScriptedProvider::new(),
            FakeImageProvider::new().then(Err(ProviderError::with_status(400, "unsupported"))),
        );

        let outcome = chat
            .service
            .send(SendRequest::text("x").with_mode(ChatMode::ImageGeneration))
            .await;

        assert!(matches!(
            outcome,
            SendOutcome::Completed(TurnOutcome::ConnectionFailed { .. })
        ));
        let last = chat.service.transcript().snapshot().pop().expect("entry");
        assert_eq!(last.text, "INTERNAL BUREAUCRACY ERROR: unsupported");
    }

    #[tokio::test]
    async fn sessions_can_be_reloaded_and_reset() {
        let chat = create_test_chat(
            ScriptedProvider::new().then_texts(&["answer"]),
            FakeImageProvider::new(),
        );
        chat.service.send(SendRequest::text("question")).await;
        let saved_id = chat.service.session_id();

        assert!(chat.service.start_new_session());
        assert_eq!(chat.service.session_id(), UNSAVED_SESSION_ID);
        assert_eq!(chat.service.transcript().snapshot().len(), 1);

        assert!(chat.service.load_session(&saved_id).await.expect("load"));
        assert_eq!(chat.service.transcript().snapshot().len(), 3);
        assert!(!chat.service.load_session("missing").await.expect("load"));
    }

    #[tokio::test]
    async fn hidden_prompts_do_not_title_the_session() {
        let chat = create_test_chat(
            ScriptedProvider::new().then_texts(&["ok"]).then_texts(&["ok"]),
            FakeImageProvider::new(),
        );
        chat.service
            .send(SendRequest::text("internal instructions").with_hidden(true))
            .await;
        let id = chat.service.session_id();
        let saved = chat.sessions.get(&id).await.expect("get").expect("saved");
        assert_eq!(saved.title, crate::core::session::UNTITLED_SESSION);

        chat.service.send(SendRequest::text("visible")).await;
        let saved = chat.sessions.get(&id).await.expect("get").expect("saved");
        assert_eq!(saved.title, "VISIBLE");
    }
}
