//! Authentication engine error types.

use thiserror::Error;

use crate::flow::FlowResponse;

/// Errors produced while driving the login flow.
#[derive(Error, Debug)]
pub enum AuthError {
    /// HTTP request failed at the network level
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest transport
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint returned a terminal non-2xx response
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The flow endpoint rejected the round with an explicit error entry
    #[error("login flow error {code}: {message}")]
    Flow { code: i64, message: String },

    /// The endpoint queued the explicit deny subtask
    #[error("login denied by remote endpoint")]
    Denied,

    /// The response violated the flow protocol (e.g. missing flow token)
    #[error("flow protocol violation: {0}")]
    Protocol(String),

    /// A queued subtask has no registered handler
    #[error("no handler registered for subtask {0}")]
    UnknownSubtask(String),

    /// A required credential is missing or unusable; no network call was made
    #[error("credential error: {0}")]
    Credential(String),

    /// Login attempt failed, with the subtask the failure occurred after
    #[error("authentication failed after {subtask}: {source}")]
    Subtask {
        subtask: String,
        #[source]
        source: Box<AuthError>,
    },
}

impl AuthError {
    /// Whether this error originated below the flow protocol (network level).
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Transport(_))
    }

    /// The subtask context attached by the orchestrator, if any.
    #[must_use]
    pub fn subtask(&self) -> Option<&str> {
        match self {
            Self::Subtask { subtask, .. } => Some(subtask),
            _ => None,
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Result of one flow round; threaded through the loop and every handler.
pub type FlowResult = AuthResult<FlowResponse>;
