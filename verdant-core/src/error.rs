use serde::Serialize;

use crate::config::ConfigError;

/// A field-level validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every way a read, write or upload can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request never produced a response (unreachable host, timeout, reset).
    Transport(String),

    /// Credentials were missing, expired, or rejected on a protected call.
    Auth(String),

    /// The payload was rejected locally. Nothing was sent.
    Validation(Vec<FieldError>),

    /// The server answered with a non-2xx status or a body that does not
    /// match the endpoint's record.
    Server { status: u16, message: String },
}

impl ClientError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// Whether an automatic retry may succeed: transport failures and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Server { status, .. } => *status >= 500,
            ClientError::Auth(_) | ClientError::Validation(_) => false,
        }
    }

    /// Message suitable for a user-facing notification.
    pub fn public_message(&self) -> &'static str {
        match self {
            ClientError::Transport(_) => "Network error, please try again",
            ClientError::Auth(_) => "Please sign in again",
            ClientError::Validation(_) => "Please fix the highlighted fields",
            ClientError::Server { .. } => "Something went wrong",
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(msg) => write!(f, "Transport error: {msg}"),
            ClientError::Auth(msg) => write!(f, "Authentication error: {msg}"),
            ClientError::Validation(errors) => {
                write!(f, "Validation failed:")?;
                for err in errors {
                    write!(f, " {}: {};", err.field, err.message)?;
                }
                Ok(())
            }
            ClientError::Server { status, message } => {
                write!(f, "Server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl From<garde::Report> for ClientError {
    fn from(report: garde::Report) -> Self {
        let errors = report
            .iter()
            .map(|(path, error)| {
                let field = path.to_string();
                FieldError {
                    field: if field.is_empty() { "value".to_string() } else { field },
                    message: error.message().to_string(),
                }
            })
            .collect();
        ClientError::Validation(errors)
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        ClientError::invalid("config", err.to_string())
    }
}
