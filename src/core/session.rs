//! Saved conversations and the stores that keep them.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::task::{self, JoinError};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::core::message::{now_millis, TranscriptEntry};

/// Id of a session that has not been saved yet. Never persisted.
pub const UNSAVED_SESSION_ID: &str = "init";
pub const UNTITLED_SESSION: &str = "UNTITLED FILE";
const TITLE_MAX_GRAPHEMES: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub entries: Vec<TranscriptEntry>,
    pub updated_at: i64,
}

impl Session {
    pub fn new(id: impl Into<String>, entries: Vec<TranscriptEntry>) -> Self {
        Self {
            id: id.into(),
            title: derive_title(&entries),
            entries,
            updated_at: now_millis(),
        }
    }

    pub fn is_unsaved(&self) -> bool {
        self.id == UNSAVED_SESSION_ID
    }

    fn refresh(&mut self) {
        self.title = derive_title(&self.entries);
        self.updated_at = now_millis();
    }
}

/// Title from the first visible user entry: uppercased, at most 30 graphemes.
pub fn derive_title(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .find(|entry| entry.is_user() && !entry.hidden)
        .map(|entry| {
            entry
                .text
                .graphemes(true)
                .take(TITLE_MAX_GRAPHEMES)
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| UNTITLED_SESSION.to_string())
}

#[derive(Debug)]
pub enum SessionStoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The blocking file task panicked or was cancelled.
    Task(JoinError),
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStoreError::Io { path, source } => {
                write!(f, "Failed to access sessions at {}: {}", path.display(), source)
            }
            SessionStoreError::Format { path, source } => {
                write!(f, "Invalid sessions file {}: {}", path.display(), source)
            }
            SessionStoreError::Task(err) => write!(f, "Session file task failed: {err}"),
        }
    }
}

impl StdError for SessionStoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SessionStoreError::Io { source, .. } => Some(source),
            SessionStoreError::Format { source, .. } => Some(source),
            SessionStoreError::Task(source) => Some(source),
        }
    }
}

/// Keyed persistence of transcript snapshots.
///
/// `list` returns sessions newest first. `put` on the unsaved sentinel id is
/// a no-op.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionStoreError>;
    async fn put(&self, session: Session) -> Result<(), SessionStoreError>;
    async fn list(&self) -> Result<Vec<Session>, SessionStoreError>;
    /// Returns whether a session was removed.
    async fn delete(&self, id: &str) -> Result<bool, SessionStoreError>;
}

/// Replace in place when the id exists, otherwise insert at the front.
fn upsert(sessions: &mut Vec<Session>, mut session: Session) {
    session.refresh();
    match sessions.iter_mut().find(|existing| existing.id == session.id) {
        Some(existing) => *existing = session,
        None => sessions.insert(0, session),
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<Session>>,
    puts: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes that reached the store.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionStoreError> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.iter().find(|session| session.id == id).cloned())
    }

    async fn put(&self, session: Session) -> Result<(), SessionStoreError> {
        if session.is_unsaved() {
            return Ok(());
        }
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        upsert(&mut sessions, session);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Session>, SessionStoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn delete(&self, id: &str) -> Result<bool, SessionStoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|session| session.id != id);
        Ok(sessions.len() != before)
    }
}

/// All sessions in one JSON document, rewritten atomically on every change.
///
/// File access runs on the blocking pool; writers are serialized so a
/// read-modify-write never interleaves with another.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "mande", "mande").map(|dirs| dirs.data_dir().join("sessions.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_file<T, F>(&self, f: F) -> Result<T, SessionStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, SessionStoreError> + Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || f(&path))
            .await
            .map_err(SessionStoreError::Task)?
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SessionStoreError {
    SessionStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn load_sessions(path: &Path) -> Result<Vec<Session>, SessionStoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).map_err(|err| io_error(path, err))?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&contents).map_err(|source| SessionStoreError::Format {
        path: path.to_path_buf(),
        source,
    })
}

fn save_sessions(path: &Path, sessions: &[Session]) -> Result<(), SessionStoreError> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(|err| io_error(path, err))?;
    }

    let contents = serde_json::to_string(sessions).map_err(|source| SessionStoreError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(|err| io_error(path, err))?;

    temp_file
        .write_all(contents.as_bytes())
        .map_err(|err| io_error(path, err))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|err| io_error(path, err))?;
    temp_file
        .persist(path)
        .map_err(|err| io_error(path, err.error))?;
    Ok(())
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionStoreError> {
        let id = id.to_string();
        self.with_file(move |path| {
            Ok(load_sessions(path)?
                .into_iter()
                .find(|session| session.id == id))
        })
        .await
    }

    async fn put(&self, session: Session) -> Result<(), SessionStoreError> {
        if session.is_unsaved() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        debug!(id = %session.id, entries = session.entries.len(), "saving session");
        self.with_file(move |path| {
            let mut sessions = load_sessions(path)?;
            upsert(&mut sessions, session);
            save_sessions(path, &sessions)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Session>, SessionStoreError> {
        self.with_file(load_sessions).await
    }

    async fn delete(&self, id: &str) -> Result<bool, SessionStoreError> {
        let _guard = self.write_lock.lock().await;
        let id = id.to_string();
        self.with_file(move |path| {
            let mut sessions = load_sessions(path)?;
            let before = sessions.len();
            sessions.retain(|session| session.id != id);
            if sessions.len() == before {
                return Ok(false);
            }
            save_sessions(path, &sessions)?;
            Ok(true)
        })
        .await
    }
}
