//! Exercise session orchestration.
//!
//! Wires the pieces together for the lifetime of one exercise run: the pose
//! source feeds the frame bus from a capture thread, the classify task runs
//! the active motion detector and updates shared session state, and the
//! totals land in the profile store when the session ends, whether by time
//! budget, coin cap, manual stop, source end, or source failure.

mod controller;
mod state;

pub use controller::{
    SessionConfig, SessionController, SessionEnd, SessionHandle, DEFAULT_COIN_CAP,
};
pub use state::{SessionSnapshot, SharedSession};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a session is already active")]
    AlreadyActive,
    #[error("profile store error: {0}")]
    Profile(#[from] fitquest_profile::ProfileError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
