//! AI agent side of a call.
//!
//! - `session`: one agent participant per room, driven by meeting events
//! - `driver`: the realtime model conversation started when the caller arrives
//! - `registry`: live sessions and event routing
//! - `subscription`: per-participant stream tracking

pub mod driver;
pub mod registry;
pub mod session;
pub mod subscription;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::{ConversationDriver, DriverContext, DriverError, DriverSettings, DriverTask};
pub use registry::{SessionInfo, SessionRegistry};
pub use session::{
    AgentSession, DEFAULT_DRIVER_STOP_TIMEOUT, SessionDeps, SessionError, SessionState,
};
pub use subscription::ParticipantSubscription;
