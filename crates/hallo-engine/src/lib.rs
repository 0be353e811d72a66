//! hallo-engine: the matchmaking core.
//!
//! Pairs anonymous waiting participants into two-party sessions after a
//! two-phase acceptance handshake with an explicit deadline. Everything
//! here is single-process, in-memory state; the transport is an external
//! collaborator reached through the delivery [`Bus`].

pub mod bus;
pub mod engine;
pub mod matchmaker;
pub mod participant;
pub mod queue;
pub mod registry;

pub use bus::{Bus, Envelope, Subscription};
pub use engine::{Engine, EngineConfig};
pub use matchmaker::Matchmaker;
pub use participant::{ParticipantState, Roster};
pub use queue::WaitQueue;
pub use registry::SessionRegistry;
