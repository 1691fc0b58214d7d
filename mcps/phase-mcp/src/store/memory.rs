//! In-memory session backend

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::SessionBackend;
use crate::types::{InteractionRecord, PhaseResult, Session};

/// Process-local storage; contents are lost on exit
#[derive(Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, Session>>,
    interactions: RwLock<Vec<InteractionRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn load(&self, key: &str) -> PhaseResult<Option<Session>> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn insert(&self, session: &Session) -> PhaseResult<bool> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.session_key) {
            return Ok(false);
        }
        sessions.insert(session.session_key.clone(), session.clone());
        Ok(true)
    }

    async fn compare_and_swap(&self, expected_revision: u64, session: &Session) -> PhaseResult<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.session_key) {
            Some(stored) if stored.revision == expected_revision => {
                *stored = session.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, key: &str) -> PhaseResult<bool> {
        Ok(self.sessions.write().await.remove(key).is_some())
    }

    async fn append_interaction(&self, record: &InteractionRecord) -> PhaseResult<()> {
        self.interactions.write().await.push(record.clone());
        Ok(())
    }

    async fn interactions(&self, key: &str) -> PhaseResult<Vec<InteractionRecord>> {
        Ok(self
            .interactions
            .read()
            .await
            .iter()
            .filter(|r| r.session_key == key)
            .cloned()
            .collect())
    }

    async fn remove_interactions(&self, key: &str) -> PhaseResult<usize> {
        let mut interactions = self.interactions.write().await;
        let before = interactions.len();
        interactions.retain(|r| r.session_key != key);
        Ok(before - interactions.len())
    }
}
