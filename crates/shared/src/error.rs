use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Connection,
    ParseSkip,
    DirectiveExecution,
    ConfigurationGap,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("scene controller is not connected")]
    NotConnected,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("request {request} failed: {message}")]
    RequestFailed { request: String, message: String },
    #[error("request {request} timed out")]
    Timeout { request: String },
}

impl ControllerError {
    pub fn request_failed(request: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            request: request.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ControllerError::NotConnected
            | ControllerError::Transport(_)
            | ControllerError::Authentication(_)
            | ControllerError::Timeout { .. } => ErrorCategory::Connection,
            ControllerError::RequestFailed { .. } => ErrorCategory::DirectiveExecution,
        }
    }
}

/// Categorises an error surfaced by a collaborator call.
pub fn classify(err: &anyhow::Error) -> ErrorCategory {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ControllerError>())
        .map(ControllerError::category)
        .unwrap_or(ErrorCategory::DirectiveExecution)
}
