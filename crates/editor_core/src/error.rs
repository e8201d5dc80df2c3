use shared::{
    domain::SizeParseError,
    error::{ApiError, ErrorCode},
    handle::HandleError,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Size(#[from] SizeParseError),
    #[error(transparent)]
    Handle(#[from] HandleError),
    #[error("unknown block {0}")]
    UnknownBlock(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("not allowed: {0}")]
    Authorization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("save failed: {0}")]
    Persistence(String),
    #[error("network failure: {0}")]
    Transport(String),
    #[error("{0} already in progress")]
    Busy(&'static str),
}

impl EditorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EditorError::Validation(_) => ErrorCode::Validation,
            EditorError::Authorization(_) => ErrorCode::Unauthorized,
            EditorError::NotFound(_) => ErrorCode::NotFound,
            EditorError::Persistence(_) | EditorError::Busy(_) => ErrorCode::Persistence,
            EditorError::Transport(_) => ErrorCode::Transport,
        }
    }

    /// Human-readable reason for a notification description.
    pub fn reason(&self) -> String {
        match self {
            EditorError::Validation(err) => err.to_string(),
            EditorError::Authorization(message)
            | EditorError::NotFound(message)
            | EditorError::Persistence(message)
            | EditorError::Transport(message) => message.clone(),
            EditorError::Busy(what) => format!("{what} already in progress"),
        }
    }

    pub fn owner_only() -> Self {
        EditorError::Authorization("only the page owner can edit blocks".to_string())
    }
}

impl From<ApiError> for EditorError {
    fn from(value: ApiError) -> Self {
        match value.code {
            ErrorCode::Validation => {
                EditorError::Persistence(format!("rejected by backend: {}", value.message))
            }
            ErrorCode::Unauthorized => EditorError::Authorization(value.message),
            ErrorCode::NotFound => EditorError::NotFound(value.message),
            ErrorCode::Persistence => EditorError::Persistence(value.message),
            ErrorCode::Transport => EditorError::Transport(value.message),
        }
    }
}

impl From<SizeParseError> for EditorError {
    fn from(value: SizeParseError) -> Self {
        EditorError::Validation(value.into())
    }
}

impl From<HandleError> for EditorError {
    fn from(value: HandleError) -> Self {
        EditorError::Validation(value.into())
    }
}
