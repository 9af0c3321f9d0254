//! Storage client error types

use thiserror::Error;

/// Provider error class reported when the requested device name is taken
pub const DEVICE_IN_USE_CODE: &str = "InvalidParameterValue";

/// Error returned by remote collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The storage service rejected the request
    #[error("{code}: {message}")]
    Api { code: String, message: String },

    /// The described volume does not exist
    #[error("volume not found: {0}")]
    VolumeNotFound(String),

    /// The request never produced a service response
    #[error("transport error: {0}")]
    Transport(String),

    /// Host identity could not be determined
    #[error("host identity unavailable: {0}")]
    Identity(String),
}

impl ClientError {
    /// Create an API error from a provider class and message
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a [`ClientError::Transport`] from anything displayable
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    /// Machine-readable provider class, if the service answered
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the service refused an attach because the device name is taken
    #[must_use]
    pub fn is_device_in_use(&self) -> bool {
        self.code() == Some(DEVICE_IN_USE_CODE)
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
