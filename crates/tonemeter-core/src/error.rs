//! Shared error type across tonemeter crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Input failed validation (e.g. empty text).
    InvalidInput,
    /// Request body could not be decoded.
    InvalidBody,
    /// Configuration rejected at startup.
    InvalidConfig,
    /// Metric registered twice with a different shape.
    RegistrationConflict,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::InvalidInput => "INVALID_INPUT",
            ClientCode::InvalidBody => "INVALID_BODY",
            ClientCode::InvalidConfig => "INVALID_CONFIG",
            ClientCode::RegistrationConflict => "REGISTRATION_CONFLICT",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TonemeterError>;

/// Unified error type used by core and api.
#[derive(Debug, Error)]
pub enum TonemeterError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("invalid body: {0}")]
    InvalidBody(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("metric {name} already registered with a different kind or label schema")]
    RegistrationConflict { name: String },
    #[error("internal: {0}")]
    Internal(String),
}

impl TonemeterError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            TonemeterError::InvalidInput(_) => ClientCode::InvalidInput,
            TonemeterError::InvalidBody(_) => ClientCode::InvalidBody,
            TonemeterError::InvalidConfig(_) => ClientCode::InvalidConfig,
            TonemeterError::RegistrationConflict { .. } => ClientCode::RegistrationConflict,
            TonemeterError::Internal(_) => ClientCode::Internal,
        }
    }
}
