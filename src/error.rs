//! Errors produced by the remote bridge.

use thiserror::Error;

/// A failed remote call. None of these are fatal to a session: mutation
/// failures are rolled back locally and shown as a notice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The request never got a usable answer (network, TLS, timeout).
    #[error("transport failure during {op}: {reason}")]
    Transport { op: &'static str, reason: String },

    /// The remote side answered but refused the request.
    #[error("{op} rejected: {reason}")]
    Rejected { op: &'static str, reason: String },

    /// The item or thread does not exist (anymore) on the remote side.
    #[error("{0} not found")]
    NotFound(String),

    /// Credentials are missing or expired.
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl BridgeError {
    pub fn transport(op: &'static str, reason: impl ToString) -> Self {
        Self::Transport {
            op,
            reason: reason.to_string(),
        }
    }

    pub fn rejected(op: &'static str, reason: impl ToString) -> Self {
        Self::Rejected {
            op,
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias for bridge results
pub type Result<T> = std::result::Result<T, BridgeError>;
