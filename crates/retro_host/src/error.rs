// crates/retro_host/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;

/// Errors surfaced by the host. Loader and negotiation failures are
/// permanent for the load attempt that produced them; `GameLoadFailure` is
/// recoverable (retry with different content, same core). Callback-time
/// problems (malformed payloads, unknown commands) never reach this type:
/// they are logged and declined inside the callback instead.
#[derive(Debug, Error)]
pub enum HostError {
    /// The shared library was not found or failed to open.
    #[error("failed to load core library '{}': {reason}", path.display())]
    LoadFailure { path: PathBuf, reason: String },

    /// A required entry point is absent. Names the first missing symbol in
    /// resolution order; indicates an incompatible core build.
    #[error("core is missing required symbol '{0}'")]
    SymbolMissing(&'static str),

    /// The core's init path signaled failure (e.g. it speaks a different
    /// ABI revision than this host).
    #[error("core initialization failed: {0}")]
    InitializationFailure(String),

    /// `retro_load_game` returned false, or the content was unreadable.
    /// The session stays initialized; the caller may retry with another path.
    #[error("core refused to load content '{}': {reason}", path.display())]
    GameLoadFailure { path: PathBuf, reason: String },

    /// The single global bridge slot is already occupied by another session.
    /// The foreign ABI's callbacks carry no context pointer, so at most one
    /// core can be live per process.
    #[error("another core session is already active in this process")]
    SessionActive,

    /// The requested operation is not valid in the session's current state.
    #[error("operation not valid in session state {0:?}")]
    InvalidState(SessionState),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed host configuration: {0}")]
    Config(#[from] serde_json::Error),
}
