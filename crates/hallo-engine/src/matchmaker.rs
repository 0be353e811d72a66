//! Queue-drain coordinator and candidate negotiator.
//!
//! A single spawned task owns all pairing decisions: it sleeps on the
//! queue's change notifier, dequeues the front two participants, and runs
//! one negotiation to completion before looking at the queue again. With
//! exactly one task there is never a concurrent drain, so two attempts
//! cannot race for overlapping participants.

use hallo_common::{new_id, ServerMessage};

use crate::bus::Envelope;
use crate::engine::Engine;
use crate::participant::ParticipantState;

pub struct Matchmaker {
    engine: Engine,
}

impl Matchmaker {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Coordinator loop. Change notifications arriving while a
    /// negotiation is in flight collapse into one stored permit; the
    /// inner loop re-checks the queue until it can no longer form a pair.
    pub async fn run(&self) {
        let changed = self.engine.queue().changed();
        loop {
            changed.notified().await;
            while let Some(pair) = self.engine.queue().dequeue_front_two().await {
                self.negotiate(pair).await;
            }
        }
    }

    /// Run the two-phase acceptance protocol for one dequeued pair.
    ///
    /// The sequential select loop is the resolution guard: the candidate
    /// resolves exactly once, at the earlier of both-accepted or the
    /// deadline, and an accept arriving after the loop exits lands on an
    /// unsubscribed topic.
    async fn negotiate(&self, pair: [String; 2]) {
        let engine = &self.engine;
        let candidate_id = new_id();
        engine.candidate_started();
        tracing::info!(candidate_id, a = %pair[0], b = %pair[1], "candidate proposed");

        // Subscribe before the offers go out so no accept can be missed.
        let mut votes = engine.bus().subscribe(&candidate_id).await;

        for pid in &pair {
            engine
                .roster()
                .set(
                    pid,
                    ParticipantState::CandidatePending {
                        candidate_id: candidate_id.clone(),
                    },
                )
                .await;
        }
        for pid in &pair {
            engine
                .bus()
                .publish(
                    pid,
                    Envelope::Deliver(ServerMessage::ConversationCandidate {
                        candidate_id: candidate_id.clone(),
                    }),
                )
                .await;
        }

        // One deadline for the whole candidate, not per participant.
        let deadline = tokio::time::sleep(engine.config().accept_timeout);
        tokio::pin!(deadline);
        let mut accepted = [false, false];

        loop {
            tokio::select! {
                envelope = votes.recv() => match envelope {
                    Some(Envelope::Accept { from }) => {
                        if let Some(i) = pair.iter().position(|p| *p == from) {
                            tracing::debug!(candidate_id, user_id = %from, "accept recorded");
                            accepted[i] = true;
                            if accepted.iter().all(|a| *a) {
                                break;
                            }
                        }
                    }
                    Some(Envelope::Deliver(_)) => {}
                    None => break,
                },
                () = &mut deadline => {
                    tracing::debug!(candidate_id, "deadline elapsed");
                    break;
                }
            }
        }

        engine.bus().unsubscribe(votes).await;
        // The candidate is resolved from here on; it no longer counts as
        // in flight even while the aftermath is being applied.
        engine.candidate_finished();

        // A participant that disconnected mid-negotiation has no roster
        // record anymore; a candidate missing a live member cannot be
        // promoted even if both votes arrived before the disconnect.
        let both_live = engine.roster().contains(&pair[0]).await
            && engine.roster().contains(&pair[1]).await;

        if accepted.iter().all(|a| *a) && both_live {
            self.commit(&candidate_id, pair).await;
        } else {
            self.cancel(&candidate_id, pair, accepted).await;
        }
    }

    async fn commit(&self, candidate_id: &str, pair: [String; 2]) {
        let engine = &self.engine;
        let session_id = engine.registry().create(pair.clone()).await;
        for pid in &pair {
            engine
                .roster()
                .set(
                    pid,
                    ParticipantState::InSession {
                        session_id: session_id.clone(),
                    },
                )
                .await;
        }
        for pid in &pair {
            engine
                .bus()
                .publish(
                    pid,
                    Envelope::Deliver(ServerMessage::CandidateResult {
                        joined_session: true,
                        session_id: Some(session_id.clone()),
                        is_queued: None,
                    }),
                )
                .await;
        }
        tracing::info!(candidate_id, session_id, "candidate promoted to session");
    }

    /// Failure path: whoever accepted goes back to the front of the queue,
    /// whoever did not is dropped to `Idle` — non-response is taken as a
    /// connectivity problem, so re-queueing must be requested explicitly.
    async fn cancel(&self, candidate_id: &str, pair: [String; 2], accepted: [bool; 2]) {
        let engine = &self.engine;
        for (pid, did_accept) in pair.iter().zip(accepted) {
            if !engine.roster().contains(pid).await {
                // Disconnected mid-negotiation: nothing to restore and
                // nobody listening on the topic anyway.
                continue;
            }
            let is_queued = if did_accept {
                engine.roster().set(pid, ParticipantState::Queued).await;
                engine.queue().enqueue_front(pid).await
            } else {
                engine.roster().set(pid, ParticipantState::Idle).await;
                false
            };
            engine
                .bus()
                .publish(
                    pid,
                    Envelope::Deliver(ServerMessage::CandidateResult {
                        joined_session: false,
                        session_id: None,
                        is_queued: Some(is_queued),
                    }),
                )
                .await;
        }
        tracing::info!(candidate_id, "candidate canceled");
    }
}
