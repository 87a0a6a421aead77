use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::models::session_types::UploadState;

/// Failures surfaced by the gateway client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Bad input detected locally. No request was sent.
    #[error("{0}")]
    Validation(String),

    /// The Gateway could not be reached, or failed without a usable body.
    #[error("Cannot reach the analysis service: {0}")]
    Transport(String),

    /// The Gateway answered with a failure status and an error body.
    #[error("Analysis service error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// A successful response that carries nothing usable.
    #[error("{0}")]
    Processing(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::Transport(_) => ErrorKind::Transport,
            GatewayError::Server { .. } => ErrorKind::Server,
            GatewayError::Processing(_) => ErrorKind::Processing,
        }
    }
}

/// A user action the current session cannot accept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Cannot {action} while the session is {state}")]
    NotAllowed {
        action: &'static str,
        state: UploadState,
    },

    #[error("No image selected")]
    NoFileSelected,

    #[error("The analysis service is not reachable")]
    Disconnected,

    #[error("Another {0} is already in progress")]
    Busy(&'static str),

    #[error("Select a model before starting the analysis")]
    ModelRequired,

    #[error("Model {0} is not available on the server")]
    UnknownModel(String),

    #[error("The selected method does not use a model list")]
    ModelsNotUsed,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transport,
    Server,
    Processing,
    Session,
}

#[derive(Debug, Serialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Gateway(inner) => inner.into(),
            other => AppError {
                kind: ErrorKind::Session,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_failures_keep_their_kind_across_commands() {
        let err: AppError = SessionError::Gateway(GatewayError::Server {
            status: 500,
            message: "CUDA out of memory".into(),
        })
        .into();
        assert_eq!(err.kind, ErrorKind::Server);
        assert!(err.message.contains("CUDA out of memory"));
    }

    #[test]
    fn test_rejected_actions_are_session_errors() {
        let err: AppError = SessionError::Busy("analysis").into();
        assert_eq!(err.kind, ErrorKind::Session);
        assert_eq!(err.to_string(), "Another analysis is already in progress");
    }
}
