//! Wire protocol: every frame is a `{type, payload}` envelope carried as a
//! WebSocket text message. Message types are kebab-case, payload fields
//! camelCase. `echo` and `signal` payloads are opaque — the server never
//! inspects them.

use serde::{Deserialize, Serialize};

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Associate this connection with a user id.
    #[serde(rename_all = "camelCase")]
    Authenticate { user_id: String },

    /// Enter the waiting queue (requires authentication).
    JoinQueue {},

    /// Leave the waiting queue.
    LeaveQueue {},

    /// Vote to accept a pending candidate pairing.
    #[serde(rename_all = "camelCase")]
    AcceptCandidate { candidate_id: String },

    /// End the active session.
    LeaveSession {},

    /// Ask for the current queue size.
    QueueSize {},

    /// Ask for server-wide counters.
    ServerStats {},

    /// Ask for this participant's own state.
    UserInfo {},

    /// Echoed back verbatim, for testing.
    Echo(serde_json::Value),

    /// Opaque payload relayed to the session peer.
    Signal(serde_json::Value),
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Authenticate { user_id: String },

    #[serde(rename_all = "camelCase")]
    JoinQueue { did_join_queue: bool },

    LeaveQueue {},

    /// A candidate pairing has been proposed to this participant.
    #[serde(rename_all = "camelCase")]
    ConversationCandidate { candidate_id: String },

    /// Resolution of one candidate, individual to each participant:
    /// `session_id` is present on success, `is_queued` on failure.
    #[serde(rename_all = "camelCase")]
    CandidateResult {
        joined_session: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_queued: Option<bool>,
    },

    /// The peer left or disconnected; payload is the recipient's own
    /// resulting state.
    SessionEnded(ParticipantInfo),

    LeaveSession {},

    #[serde(rename_all = "camelCase")]
    QueueSize { queue_size: usize },

    #[serde(rename_all = "camelCase")]
    ServerStats {
        queue_size: usize,
        num_sessions: usize,
        num_candidates: usize,
    },

    UserInfo(ParticipantInfo),

    Echo(serde_json::Value),

    /// Opaque payload relayed from the session peer.
    #[serde(rename_all = "camelCase")]
    Signal {
        from: String,
        data: serde_json::Value,
    },

    Error { message: String },
}

/// Snapshot of one participant's state, as reported to that participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub user_id: String,
    pub is_in_queue: bool,
    pub is_in_session: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ParticipantInfo {
    /// State reported for a connection that has not authenticated.
    pub fn unauthenticated() -> Self {
        Self {
            user_id: String::new(),
            is_in_queue: false,
            is_in_session: false,
            session_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_message_wire_shape() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "join-queue", "payload": {}})).unwrap();
        assert_eq!(msg, ClientMessage::JoinQueue {});

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "accept-candidate",
            "payload": {"candidateId": "c-1"}
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::AcceptCandidate {
                candidate_id: "c-1".into()
            }
        );
    }

    #[test]
    fn authenticate_uses_camel_case() {
        let wire = serde_json::to_value(ClientMessage::Authenticate {
            user_id: "u-1".into(),
        })
        .unwrap();
        assert_eq!(
            wire,
            json!({"type": "authenticate", "payload": {"userId": "u-1"}})
        );
    }

    #[test]
    fn candidate_result_success_shape() {
        let wire = serde_json::to_value(ServerMessage::CandidateResult {
            joined_session: true,
            session_id: Some("s-1".into()),
            is_queued: None,
        })
        .unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "candidate-result",
                "payload": {"joinedSession": true, "sessionId": "s-1"}
            })
        );
    }

    #[test]
    fn candidate_result_failure_shape() {
        let wire = serde_json::to_value(ServerMessage::CandidateResult {
            joined_session: false,
            session_id: None,
            is_queued: Some(true),
        })
        .unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "candidate-result",
                "payload": {"joinedSession": false, "isQueued": true}
            })
        );
    }

    #[test]
    fn server_stats_wire_shape() {
        let wire = serde_json::to_value(ServerMessage::ServerStats {
            queue_size: 2,
            num_sessions: 1,
            num_candidates: 0,
        })
        .unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "server-stats",
                "payload": {"queueSize": 2, "numSessions": 1, "numCandidates": 0}
            })
        );
    }

    #[test]
    fn queue_size_round_trip() {
        let wire = serde_json::to_string(&ServerMessage::QueueSize { queue_size: 3 }).unwrap();
        let back: ServerMessage = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, ServerMessage::QueueSize { queue_size: 3 });
    }

    #[test]
    fn signal_payload_is_opaque() {
        let data = json!({"sdp": "v=0...", "nested": {"ice": [1, 2, 3]}});
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "signal", "payload": data.clone()})).unwrap();
        assert_eq!(msg, ClientMessage::Signal(data));
    }

    #[test]
    fn session_ended_carries_own_state() {
        let wire = serde_json::to_value(ServerMessage::SessionEnded(ParticipantInfo {
            user_id: "u-2".into(),
            is_in_queue: false,
            is_in_session: false,
            session_id: None,
        }))
        .unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "session-ended",
                "payload": {"userId": "u-2", "isInQueue": false, "isInSession": false}
            })
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let res = serde_json::from_value::<ClientMessage>(
            json!({"type": "mystery", "payload": {}}),
        );
        assert!(res.is_err());
    }
}
