//! Engine facade: the operations the transport layer is allowed to call.
//!
//! All queue and registry mutations go through here (or through the
//! matchmaker); connection handlers never touch those structures
//! directly. The handle is cheap to clone — every component is Arc-backed
//! — and is cloned into the coordinator task and each connection task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hallo_common::{ParticipantInfo, ServerMessage};

use crate::bus::{Bus, Envelope, Subscription};
use crate::participant::{ParticipantState, Roster};
use crate::queue::WaitQueue;
use crate::registry::SessionRegistry;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long both sides of a candidate get to accept.
    pub accept_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            accept_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    bus: Bus,
    queue: WaitQueue,
    roster: Roster,
    registry: SessionRegistry,
    /// Candidates currently mid-negotiation; only ever 0 or 1 with a
    /// single coordinator, but reported in server-stats regardless.
    candidates: Arc<AtomicUsize>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            bus: Bus::new(),
            queue: WaitQueue::new(),
            roster: Roster::new(),
            registry: SessionRegistry::new(),
            candidates: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn queue(&self) -> &WaitQueue {
        &self.queue
    }

    pub(crate) fn roster(&self) -> &Roster {
        &self.roster
    }

    pub(crate) fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub(crate) fn candidate_started(&self) {
        self.candidates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn candidate_finished(&self) {
        self.candidates.fetch_sub(1, Ordering::Relaxed);
    }

    /// Bind an identity to the calling connection and hand back the
    /// subscription for that participant's topic. Refused when the
    /// identity already has a live record.
    pub async fn authenticate(&self, user_id: &str) -> Option<Subscription> {
        if !self.roster.insert(user_id).await {
            tracing::warn!(user_id, "identity already connected, refusing authenticate");
            return None;
        }
        tracing::info!(user_id, "participant authenticated");
        Some(self.bus.subscribe(user_id).await)
    }

    /// Release a subscription taken via [`Engine::authenticate`]; part of
    /// the connection's teardown disposers.
    pub async fn release(&self, sub: Subscription) {
        self.bus.unsubscribe(sub).await;
    }

    /// Enter the waiting queue. Only an `Idle` participant may enter;
    /// a participant already queued is reported as a success without
    /// duplicating its entry.
    pub async fn join_queue(&self, user_id: &str) -> bool {
        match self.roster.get(user_id).await {
            Some(ParticipantState::Idle) => {
                self.roster.set(user_id, ParticipantState::Queued).await;
                self.queue.enqueue(user_id).await;
                let queue_size = self.queue.len().await;
                tracing::info!(user_id, queue_size, "joined queue");
                true
            }
            Some(ParticipantState::Queued) => true,
            Some(_) | None => false,
        }
    }

    pub async fn leave_queue(&self, user_id: &str) {
        if self.queue.remove(user_id).await {
            self.roster.set(user_id, ParticipantState::Idle).await;
            tracing::info!(user_id, "left queue");
        }
    }

    /// Vote to accept a pending candidate. Votes for a candidate this
    /// participant is not pending on are protocol misuse: dropped with a
    /// debug log, never surfaced as an error.
    pub async fn accept_candidate(&self, user_id: &str, candidate_id: &str) {
        match self.roster.get(user_id).await {
            Some(ParticipantState::CandidatePending { candidate_id: pending })
                if pending == candidate_id =>
            {
                self.bus
                    .publish(
                        candidate_id,
                        Envelope::Accept {
                            from: user_id.to_string(),
                        },
                    )
                    .await;
            }
            _ => {
                tracing::debug!(user_id, candidate_id, "accept for unknown or stale candidate");
            }
        }
    }

    /// End the caller's active session. The peer is notified with its own
    /// resulting state.
    pub async fn leave_session(&self, user_id: &str) {
        let Some(session_id) = self.registry.session_of(user_id).await else {
            tracing::debug!(user_id, "leave-session outside a session");
            return;
        };
        self.end_session(&session_id, user_id).await;
    }

    /// Single teardown entry point for a departing connection. Idempotent:
    /// the second call for the same id finds no roster record and does
    /// nothing.
    pub async fn disconnect(&self, user_id: &str) {
        let Some(state) = self.roster.get(user_id).await else {
            return;
        };
        match state {
            ParticipantState::Queued => {
                self.queue.remove(user_id).await;
            }
            // The candidate's own deadline resolves it; the departed
            // participant simply never accepts.
            ParticipantState::CandidatePending { .. } => {}
            ParticipantState::InSession { session_id } => {
                self.end_session(&session_id, user_id).await;
            }
            ParticipantState::Idle => {}
        }
        self.roster.remove(user_id).await;
        tracing::info!(user_id, "participant disconnected");
    }

    /// Relay an opaque payload to the session peer. Never inspected.
    pub async fn relay_signal(&self, user_id: &str, data: serde_json::Value) {
        let Some(session_id) = self.registry.session_of(user_id).await else {
            tracing::debug!(user_id, "signal outside a session dropped");
            return;
        };
        let Some(pair) = self.registry.get(&session_id).await else {
            return;
        };
        for pid in &pair {
            if pid != user_id {
                self.bus
                    .publish(
                        pid,
                        Envelope::Deliver(ServerMessage::Signal {
                            from: user_id.to_string(),
                            data: data.clone(),
                        }),
                    )
                    .await;
            }
        }
    }

    pub async fn queue_size(&self) -> usize {
        self.queue.len().await
    }

    pub async fn stats(&self) -> ServerMessage {
        ServerMessage::ServerStats {
            queue_size: self.queue.len().await,
            num_sessions: self.registry.len().await,
            num_candidates: self.candidates.load(Ordering::Relaxed),
        }
    }

    pub async fn participant_info(&self, user_id: &str) -> ParticipantInfo {
        let state = self.roster.get(user_id).await.unwrap_or_default();
        let session_id = match &state {
            ParticipantState::InSession { session_id } => Some(session_id.clone()),
            _ => None,
        };
        ParticipantInfo {
            user_id: user_id.to_string(),
            is_in_queue: state == ParticipantState::Queued,
            is_in_session: session_id.is_some(),
            session_id,
        }
    }

    async fn end_session(&self, session_id: &str, departing: &str) {
        let removed = self.registry.destroy(session_id).await;
        if removed.is_empty() {
            return;
        }
        for pid in &removed {
            self.roster.set(pid, ParticipantState::Idle).await;
        }
        for pid in &removed {
            if pid != departing {
                let info = self.participant_info(pid).await;
                self.bus
                    .publish(pid, Envelope::Deliver(ServerMessage::SessionEnded(info)))
                    .await;
            }
        }
        tracing::info!(session_id, departing, "session ended");
    }
}
