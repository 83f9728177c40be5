//! The conversation transcript and its shared handle.
//!
//! Entries are append-only. The single exception is an entry whose
//! `is_streaming` flag is still set: the stream aggregator may grow its text
//! and grounding through [`TranscriptStore::update_streaming`] until the entry
//! is finalized, after which it is frozen.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::core::message::{now_millis, Chunk, TranscriptEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    DuplicateId(String),
}

impl std::fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptError::DuplicateId(id) => write!(f, "transcript already has an entry {id}"),
        }
    }
}

impl std::error::Error for TranscriptError {}

/// Hands out millisecond-timestamp ids that never repeat, even when two
/// entries are created within the same millisecond.
#[derive(Debug, Default)]
pub struct IdClock {
    last: i64,
}

impl IdClock {
    pub fn next(&mut self) -> String {
        self.next_at(now_millis())
    }

    pub fn next_at(&mut self, now: i64) -> String {
        self.last = now.max(self.last + 1);
        self.last.to_string()
    }
}

#[derive(Debug, Default)]
pub struct TranscriptStore {
    entries: Vec<TranscriptEntry>,
    ids: IdClock,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<TranscriptEntry>) -> Self {
        Self {
            entries,
            ids: IdClock::default(),
        }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TranscriptEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn next_id(&mut self) -> String {
        loop {
            let id = self.ids.next();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    pub fn push(&mut self, entry: TranscriptEntry) -> Result<(), TranscriptError> {
        if self.get(&entry.id).is_some() {
            return Err(TranscriptError::DuplicateId(entry.id));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Mutate an entry that is still streaming. Returns `false` when the id is
    /// unknown or the entry has already been frozen.
    pub fn update_streaming(&mut self, id: &str, f: impl FnOnce(&mut TranscriptEntry)) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id && entry.is_streaming)
        {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    /// Append a chunk's text and citations to a streaming entry.
    pub fn apply_chunk(&mut self, id: &str, chunk: Chunk) -> bool {
        self.update_streaming(id, |entry| {
            entry.text.push_str(&chunk.text);
            entry.grounding.extend(chunk.citations);
        })
    }

    pub fn finalize(&mut self, id: &str) -> bool {
        self.update_streaming(id, |entry| entry.is_streaming = false)
    }

    /// Close a streaming entry with an inline error marker.
    pub fn fail(&mut self, id: &str, message: &str) -> bool {
        self.update_streaming(id, |entry| {
            entry.text.push_str(&format!("\n[ERROR: {message}]"));
            entry.is_streaming = false;
        })
    }

    pub fn replace_all(&mut self, entries: Vec<TranscriptEntry>) {
        self.entries = entries;
    }
}

/// Shared, observable access to a [`TranscriptStore`].
///
/// The lock is only ever held for the duration of a closure and never across
/// an `.await`. Every mutation bumps a revision number that observers can
/// wait on through [`TranscriptHandle::subscribe`].
#[derive(Clone)]
pub struct TranscriptHandle {
    store: Arc<Mutex<TranscriptStore>>,
    revision: Arc<watch::Sender<u64>>,
}

impl TranscriptHandle {
    pub fn new(store: TranscriptStore) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            store: Arc::new(Mutex::new(store)),
            revision: Arc::new(revision),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TranscriptStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&TranscriptStore) -> R) -> R {
        f(&self.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut TranscriptStore) -> R) -> R {
        let result = f(&mut self.lock());
        self.revision.send_modify(|revision| *revision += 1);
        result
    }

    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.read(|store| store.entries().to_vec())
    }

    pub fn entry(&self, id: &str) -> Option<TranscriptEntry> {
        self.read(|store| store.get(id).cloned())
    }

    /// Receiver that changes whenever the transcript is mutated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }
}

impl Default for TranscriptHandle {
    fn default() -> Self {
        Self::new(TranscriptStore::new())
    }
}
