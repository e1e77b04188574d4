//! Error taxonomy for the Dune client.
//!
//! Every failure propagates to the caller immediately; nothing in the client
//! retries. The job poll loop is the one intentional repetition and it treats
//! "job still listed" as a normal state, not an error.

use std::time::Duration;

use crate::ids::JobId;

/// Typed error hierarchy for client operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DuneError {
    /// Bad credentials, a missing or expired session, or a subject that
    /// matches no user.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The platform answered with a body this client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The remote query engine reported a failure for the job.
    #[error("query execution failed for job {job_id}: {message}")]
    RemoteExecution {
        /// The failed job.
        job_id: JobId,
        /// Error text from the result metadata.
        message: String,
    },

    /// Network or HTTP failure below the protocol layer.
    #[error("transport error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Transport {
        /// HTTP status, when a response arrived.
        status: Option<u16>,
        /// Underlying error or truncated response body.
        message: String,
    },

    /// The job was still active when the poll policy ran out.
    #[error("job {job_id} still running after {attempts} polls ({elapsed:?})")]
    Timeout {
        /// The job being waited on.
        job_id: JobId,
        /// Polls issued.
        attempts: u32,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, DuneError>;

impl DuneError {
    /// Build a transport error from an HTTP status and response body.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: body.into(),
        }
    }

    /// Build a transport error for a failure with no HTTP response.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Whether the error means the session is not (or no longer) valid.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::Protocol(_) => "protocol",
            Self::RemoteExecution { .. } => "remote_execution",
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for DuneError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn transport_display_includes_status() {
        let err = DuneError::from_status(502, "bad gateway");
        assert_eq!(err.to_string(), "transport error (502): bad gateway");

        let err = DuneError::network("connection refused");
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn json_error_is_protocol() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: DuneError = json_err.into();
        assert_matches!(err, DuneError::Protocol(_));
    }

    #[test]
    fn remote_execution_display() {
        let job_id: JobId = "7d1d5a3e-7c55-4c1f-9a43-3f0b5b5f2a10".parse().unwrap();
        let err = DuneError::RemoteExecution {
            job_id,
            message: "column \"x\" does not exist".into(),
        };
        let text = err.to_string();
        assert!(text.contains("7d1d5a3e"));
        assert!(text.contains("does not exist"));
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(DuneError::Authentication("x".into()).error_kind(), "authentication");
        assert_eq!(DuneError::Protocol("x".into()).error_kind(), "protocol");
        assert_eq!(DuneError::network("x").error_kind(), "transport");
        assert_eq!(DuneError::Config("x".into()).error_kind(), "config");
    }

    #[test]
    fn authentication_classification() {
        assert!(DuneError::Authentication("expired".into()).is_authentication());
        assert!(!DuneError::Protocol("shape".into()).is_authentication());
    }
}
