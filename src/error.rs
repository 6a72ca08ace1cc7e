use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// Error body shape the backend uses for failures (`{"message": ..}` or `{"error": ..}`).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorBody {
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("validation error: {0}")] Validation(String),
    #[error("authentication error: {0}")] Auth(String),
    #[error("not found")] NotFound,
    #[error("network error: {0}")] Network(String),
    #[error("server error ({status}): {message}")] Server { status: u16, message: String },
    #[error("storage error: {0}")] Storage(#[from] StorageError),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// What a caller should offer the user after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Retry,
    GoBack,
    SignIn,
    FixInput,
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            ApiError::Validation(_) => Recovery::FixInput,
            ApiError::Auth(_) => Recovery::SignIn,
            ApiError::NotFound => Recovery::GoBack,
            ApiError::Network(_) | ApiError::Server { .. } | ApiError::Storage(_) => Recovery::Retry,
        }
    }

    /// Errors a list fetch degrades to an empty list on.
    pub fn is_degradable(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::NotFound | ApiError::Server { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Network(format!("request timed out: {e}"))
        } else if e.is_decode() {
            ApiError::Network(format!("malformed response body: {e}"))
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_affordances() {
        assert_eq!(ApiError::NotFound.recovery(), Recovery::GoBack);
        assert_eq!(ApiError::Network("down".into()).recovery(), Recovery::Retry);
        assert_eq!(ApiError::Auth("expired".into()).recovery(), Recovery::SignIn);
        assert_eq!(ApiError::validation("empty title").recovery(), Recovery::FixInput);
        assert!(!ApiError::Auth("x".into()).is_degradable());
        assert!(ApiError::Server { status: 502, message: "bad gateway".into() }.is_degradable());
    }

    #[test]
    fn error_body_prefers_message() {
        let body: ApiErrorBody = serde_json::from_str(r#"{"message":"Invalid credentials","error":"x"}"#).unwrap();
        assert_eq!(body.text(), Some("Invalid credentials"));
        let body: ApiErrorBody = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert_eq!(body.text(), Some("nope"));
        let body: ApiErrorBody = serde_json::from_str(r#"{"message":"  "}"#).unwrap();
        assert_eq!(body.text(), None);
    }
}
