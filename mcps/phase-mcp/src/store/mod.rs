//! Session persistence
//!
//! [`SessionStore`] is the only shared mutable state of the server. It wraps a
//! [`SessionBackend`] and serializes read-modify-write per session key; calls
//! for different keys never wait on each other.
//!
//! - `memory` - in-process backend, used in test mode
//! - `sqlite` - on-disk backend (default)

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

use crate::types::{InteractionRecord, NewSession, PhaseError, PhaseResult, Session, SessionUpdate};

/// Retries after a failed compare-and-swap before reporting a conflict
const MAX_CONFLICT_RETRIES: usize = 1;

/// Storage operations a backend provides
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn load(&self, key: &str) -> PhaseResult<Option<Session>>;

    /// Insert unless the key exists. Returns whether a row was written.
    async fn insert(&self, session: &Session) -> PhaseResult<bool>;

    /// Replace the stored session only if its revision is still `expected_revision`
    async fn compare_and_swap(&self, expected_revision: u64, session: &Session) -> PhaseResult<bool>;

    async fn remove(&self, key: &str) -> PhaseResult<bool>;

    async fn append_interaction(&self, record: &InteractionRecord) -> PhaseResult<()>;

    /// Interactions of a session, oldest first
    async fn interactions(&self, key: &str) -> PhaseResult<Vec<InteractionRecord>>;

    async fn remove_interactions(&self, key: &str) -> PhaseResult<usize>;
}

/// One async mutex per session key, dropped once nobody holds or waits on it
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &str) -> KeyGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key.to_string()).or_default().clone()
        };
        KeyGuard {
            locks: self,
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    // Only the map's own reference left: no holder, no waiter
    fn prune(&self, key: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.prune(&self.key);
    }
}

/// Session store with per-key atomic updates
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    locks: Arc<KeyLocks>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            locks: Arc::new(KeyLocks::default()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub async fn get(&self, key: &str) -> PhaseResult<Option<Session>> {
        self.backend.load(key).await
    }

    /// Create a session. An existing session is returned unchanged.
    pub async fn create(&self, new: NewSession) -> PhaseResult<Session> {
        let key = new.session_key.clone();
        let _guard = self.locks.acquire(&key).await;

        if let Some(existing) = self.backend.load(&key).await? {
            return Ok(existing);
        }

        let session = new.into_session();
        if self.backend.insert(&session).await? {
            tracing::info!(session_key = %key, phase = %session.current_phase, "Session created");
            return Ok(session);
        }

        // another process inserted between load and insert
        self.backend
            .load(&key)
            .await?
            .ok_or(PhaseError::StoreWriteConflict { session_key: key })
    }

    /// Apply `update` as one read-modify-write
    pub async fn update(&self, key: &str, update: SessionUpdate) -> PhaseResult<Session> {
        let _guard = self.locks.acquire(key).await;

        if update.is_empty() {
            return self
                .backend
                .load(key)
                .await?
                .ok_or_else(|| PhaseError::SessionNotFound {
                    session_key: key.to_string(),
                });
        }

        let mut conflicts = 0;
        loop {
            let mut session = self
                .backend
                .load(key)
                .await?
                .ok_or_else(|| PhaseError::SessionNotFound {
                    session_key: key.to_string(),
                })?;
            let expected = session.revision;
            update.clone().apply_to(&mut session);

            if self.backend.compare_and_swap(expected, &session).await? {
                tracing::debug!(session_key = %key, revision = session.revision, "Session updated");
                return Ok(session);
            }

            conflicts += 1;
            if conflicts > MAX_CONFLICT_RETRIES {
                return Err(PhaseError::StoreWriteConflict {
                    session_key: key.to_string(),
                });
            }
            tracing::warn!(session_key = %key, "Revision changed underneath update, retrying");
        }
    }

    /// Delete a session and its interaction log
    pub async fn delete(&self, key: &str) -> PhaseResult<bool> {
        let _guard = self.locks.acquire(key).await;

        let removed_interactions = self.backend.remove_interactions(key).await?;
        let removed = self.backend.remove(key).await?;
        tracing::info!(
            session_key = %key,
            removed,
            removed_interactions,
            "Session deleted"
        );
        Ok(removed)
    }

    pub async fn log_interaction(&self, record: &InteractionRecord) -> PhaseResult<()> {
        self.backend.append_interaction(record).await
    }

    pub async fn interactions(&self, key: &str) -> PhaseResult<Vec<InteractionRecord>> {
        self.backend.interactions(key).await
    }
}
