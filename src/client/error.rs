use std::fmt;

use crate::utils::error::FieldErrors;

/// Failures the client can report to the user.
#[derive(Debug)]
pub enum ClientError {
    /// 401: missing, invalid or expired token (or wrong credentials on login)
    Unauthenticated(String),
    /// 403: the record belongs to someone else
    Forbidden(String),
    NotFound(String),
    /// 422, with per-field messages
    Validation { message: String, errors: FieldErrors },
    /// Any other non-2xx answer
    Server { status: u16, message: String },
    /// The request never got an HTTP answer, or the answer was unreadable
    Transport(String),
    Storage(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            ClientError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ClientError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ClientError::Validation { message, errors } => {
                write!(f, "Validation failed: {}", message)?;
                for (field, messages) in errors {
                    for m in messages {
                        write!(f, "\n  - {}: {}", field, m)?;
                    }
                }
                Ok(())
            }
            ClientError::Server { status, message } => write!(f, "Server error ({}): {}", status, message),
            ClientError::Transport(msg) => write!(f, "Connection error: {}", msg),
            ClientError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
