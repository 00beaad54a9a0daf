use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdminBridgeError>;

#[derive(Debug, Error)]
pub enum AdminBridgeError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("permission denied: {0}")]
    Authorization(String),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    RemoteApi {
        message: String,
        status: Option<u16>,
    },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("timed out: {0}")]
    Timeout(String),
}

impl AdminBridgeError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteApi {
            message: message.into(),
            status: None,
        }
    }

    /// Classify a non-success HTTP response from the workspace API.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = format!("API request failed with status {}: {}", status, body);
        match status.as_u16() {
            401 => Self::Authentication(message),
            403 => Self::Authorization(message),
            404 => Self::ResourceNotFound(message),
            429 => Self::RateLimited(message),
            408 | 504 => Self::Timeout(message),
            code => Self::RemoteApi {
                message,
                status: Some(code),
            },
        }
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(format!("HTTP request timed out: {}", err));
        }
        Self::RemoteApi {
            message: format!("HTTP request failed: {}", err),
            status: err.status().map(|s| s.as_u16()),
        }
    }

    /// Stable label that tool callers can branch on.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Authentication(_) => "authentication",
            Self::Authorization(_) => "authorization",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::Validation(_) => "validation",
            Self::RemoteApi { .. } => "remote_api",
            Self::RateLimited(_) => "rate_limited",
            Self::Timeout(_) => "timeout",
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RemoteApi { status, .. } => *status,
            Self::Authentication(_) => Some(401),
            Self::Authorization(_) => Some(403),
            Self::ResourceNotFound(_) => Some(404),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    /// Prefix a remote failure with the operation that issued it. Other kinds pass through
    /// untouched so callers can still tell a missing resource from a broken integration.
    pub fn context(self, operation: &str) -> Self {
        match self {
            Self::RemoteApi { message, status } => Self::RemoteApi {
                message: format!("Failed to {}: {}", operation, message),
                status,
            },
            other => other,
        }
    }
}

pub fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_nan() || value <= 0.0 {
        return Err(AdminBridgeError::Validation(format!(
            "{} must be positive",
            name
        )));
    }
    Ok(())
}

pub fn ensure_non_empty<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdminBridgeError::Validation(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(trimmed)
}
