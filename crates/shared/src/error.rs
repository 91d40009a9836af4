use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            429 => ErrorCode::RateLimited,
            400..=499 => ErrorCode::Validation,
            _ => ErrorCode::Internal,
        }
    }
}

/// Error body shapes returned by the hosted auth and row APIs. Whichever
/// message field is present wins, in declaration order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteErrorBody {
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RemoteErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .filter(|message| !message.trim().is_empty())
    }
}

/// Displays as the bare provider message so it can be shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Builds an exception from an HTTP status and raw response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<RemoteErrorBody>(body)
            .ok()
            .and_then(RemoteErrorBody::into_message)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Self::new(ErrorCode::from_status(status), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_error_description_over_generic_error() {
        let err = ApiException::from_response(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[test]
    fn reads_row_api_message_field() {
        let err = ApiException::from_response(
            401,
            r#"{"code":"42501","message":"permission denied for table projects"}"#,
        );
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.message, "permission denied for table projects");
    }

    #[test]
    fn falls_back_to_status_for_unparseable_body() {
        let err = ApiException::from_response(502, "<html>bad gateway</html>");
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "request failed with status 502");
    }
}
