//! Error types for the luafn registry and script runtime.

use std::fmt;
use std::io;

/// The result type used throughout luafn.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for luafn operations.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred.
    Io(io::Error),

    /// A submitted form failed validation.
    ///
    /// Carries a user-facing message and, when known, the name of the
    /// offending field so a caller can highlight the input.
    Validation {
        /// The user-facing message.
        message: String,
        /// The offending field name, when known (e.g. `"scriptBody"`).
        field: Option<String>,
    },

    /// The referenced definition does not exist.
    NotFound(String),

    /// A script failed to compile or raised an error during execution.
    Script(String),

    /// A serialization or deserialization error occurred.
    Serialization(String),

    /// Persisted registry data could not be read back.
    Corruption(String),

    /// An invalid argument was provided.
    InvalidArgument(String),

    /// An internal error occurred.
    Internal(String),
}

impl Error {
    /// Creates a new validation error without a field name.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation { message: message.into(), field: None }
    }

    /// Creates a new validation error scoped to a form field.
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Error::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Creates a new not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a new script error.
    pub fn script(msg: impl Into<String>) -> Self {
        Error::Script(msg.into())
    }

    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Returns the offending field name for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Validation { message, field: Some(field) } => {
                write!(f, "Validation failed for field '{}': {}", field, message)
            }
            Error::Validation { message, field: None } => {
                write!(f, "Validation failed: {}", message)
            }
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::Script(msg) => write!(f, "Script error: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Corruption(msg) => write!(f, "Registry corruption: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
