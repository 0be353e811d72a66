//! Participant roster and state machine.
//!
//! Exactly one record exists per authenticated identity; the record lives
//! from authenticate to disconnect. The state tag is the single source of
//! truth for which queue-like structure may currently hold the id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Where a participant currently stands in the pairing flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParticipantState {
    #[default]
    Idle,
    Queued,
    CandidatePending {
        candidate_id: String,
    },
    InSession {
        session_id: String,
    },
}

/// All live participants, keyed by user id.
#[derive(Clone, Default)]
pub struct Roster {
    inner: Arc<RwLock<HashMap<String, ParticipantState>>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly authenticated participant as `Idle`. Refused when the
    /// identity already has a live record.
    pub async fn insert(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.contains_key(id) {
            return false;
        }
        inner.insert(id.to_string(), ParticipantState::Idle);
        true
    }

    pub async fn remove(&self, id: &str) -> Option<ParticipantState> {
        self.inner.write().await.remove(id)
    }

    pub async fn get(&self, id: &str) -> Option<ParticipantState> {
        self.inner.read().await.get(id).cloned()
    }

    /// Transition a live participant. A miss (the participant disconnected
    /// under us) is recovered as a no-op.
    pub async fn set(&self, id: &str, state: ParticipantState) -> bool {
        let mut inner = self.inner.write().await;
        match inner.get_mut(id) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
