//! Snapshot errors.

use thiserror::Error;

/// Failure reported by the debug session for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    pub message: String,
}

impl RequestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Which kind of handle a stale-reference error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Variables,
    Memory,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Variables => write!(f, "variables"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Errors that abort a snapshot build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// No debug session to act on.
    #[error("No active debug session to snapshot.")]
    NoActiveSession,

    /// The session reported zero threads.
    #[error("Debugger has not reported any threads.")]
    NoThreads,

    /// The pause request failed with an unrecognized message.
    #[error("Unable to pause debugger: {0}")]
    PauseFailed(String),

    /// Stack-trace polling exhausted its retry budget.
    #[error("No stack frames available (is the debugger paused?).")]
    NoStackFrames,

    /// The top frame has no scopes.
    #[error("Debugger did not return any scopes.")]
    NoScopes,

    /// A request the build cannot continue without failed.
    #[error("{command} request failed: {message}")]
    Request { command: String, message: String },

    /// A reference issued before the debuggee last resumed was used.
    #[error("stale {kind} reference {reference} (issued in stop {issued}, current stop {current})")]
    StaleReference {
        kind: ReferenceKind,
        reference: String,
        issued: u64,
        current: u64,
    },
}

impl SnapshotError {
    /// Single user-facing line for a failed snapshot.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoActiveSession => self.to_string(),
            _ => format!("Snapshot failed: {self}"),
        }
    }

    pub(crate) fn request(command: &str, err: RequestError) -> Self {
        Self::Request {
            command: command.to_string(),
            message: err.message,
        }
    }
}

pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;
