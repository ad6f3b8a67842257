use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Internal,
}

impl ErrorCode {
    /// Maps an HTTP status to the client-side taxonomy. Anything the table
    /// does not name is treated as an internal backend failure.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            400 | 422 => ErrorCode::Validation,
            _ => ErrorCode::Internal,
        }
    }

    /// Auth failures are surfaced to the user only at explicit action
    /// points; background sync degrades silently on them.
    pub fn is_auth(self) -> bool {
        matches!(self, ErrorCode::Unauthorized | ErrorCode::Forbidden)
    }
}

/// Typed failure for user-initiated operations (login, register, save,
/// payment). Background synchronization never raises these; it logs and
/// degrades instead.
#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_auth_codes() {
        assert_eq!(ErrorCode::from_status(401), ErrorCode::Unauthorized);
        assert_eq!(ErrorCode::from_status(403), ErrorCode::Forbidden);
        assert_eq!(ErrorCode::from_status(400), ErrorCode::Validation);
        assert!(ErrorCode::from_status(401).is_auth());
        assert!(!ErrorCode::from_status(500).is_auth());
    }

    #[test]
    fn exception_formats_code_and_message() {
        let err = ApiException::new(ErrorCode::Unauthorized, "bad token");
        assert_eq!(err.to_string(), "Unauthorized: bad token");
    }
}
