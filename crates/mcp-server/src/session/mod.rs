//! Session registry shared by both transports

mod id;
mod registry;

pub use id::SessionId;
pub use registry::{SessionError, SessionInfo, SessionRegistry, SessionState, TransportKind};
