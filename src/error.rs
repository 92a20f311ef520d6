use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error.
    #[error("Book not found: {0}")]
    NotFound(String),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The server already holds this file.
    #[error("Duplicate file: {0}")]
    Conflict(String),

    /// The server answered with a non-success status.
    #[error("Request failed with status {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Network or HTTP client error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is the server's duplicate-file answer.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    /// Message suitable for showing next to a failed item.
    ///
    /// API errors show the server's message alone, without the status prefix.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Api { message, .. } => message.trim().to_string(),
            AppError::Conflict(_) => "Duplicate file".to_string(),
            AppError::Internal(message) => message.trim().to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_detected() {
        assert!(AppError::Conflict("a.pdf".into()).is_conflict());
        assert!(
            !AppError::Api {
                status: 500,
                message: "boom".into()
            }
            .is_conflict()
        );
    }

    #[test]
    fn api_user_message_drops_status() {
        let err = AppError::Api {
            status: 503,
            message: " Server down \n".into(),
        };
        assert_eq!(err.user_message(), "Server down");
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn empty_message_stays_empty() {
        let err = AppError::Internal(String::new());
        assert!(err.user_message().is_empty());
    }
}
