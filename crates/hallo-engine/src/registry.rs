//! Session registry: which participants belong to which active session.

use std::collections::HashMap;
use std::sync::Arc;

use hallo_common::new_id;
use tokio::sync::RwLock;

/// Forward and reverse maps kept consistent under a single lock.
#[derive(Default)]
struct RegistryState {
    sessions: HashMap<String, [String; 2]>,
    by_participant: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed pairing, returning its generated session id.
    pub async fn create(&self, pair: [String; 2]) -> String {
        let session_id = new_id();
        let mut state = self.inner.write().await;
        for pid in &pair {
            state.by_participant.insert(pid.clone(), session_id.clone());
        }
        state.sessions.insert(session_id.clone(), pair);
        session_id
    }

    pub async fn get(&self, session_id: &str) -> Option<[String; 2]> {
        self.inner.read().await.sessions.get(session_id).cloned()
    }

    pub async fn session_of(&self, participant_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .by_participant
            .get(participant_id)
            .cloned()
    }

    /// Tear a session down, returning the participants it held. Unknown
    /// ids return empty, so repeated destruction is harmless.
    pub async fn destroy(&self, session_id: &str) -> Vec<String> {
        let mut state = self.inner.write().await;
        let Some(pair) = state.sessions.remove(session_id) else {
            return Vec::new();
        };
        for pid in &pair {
            state.by_participant.remove(pid);
        }
        pair.into()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }
}
