pub mod errors;
pub mod id;
pub mod protocol;

pub use errors::RelayError;
pub use id::new_id;
pub use protocol::{ClientMessage, ParticipantInfo, ServerMessage};

pub type Result<T> = std::result::Result<T, RelayError>;
