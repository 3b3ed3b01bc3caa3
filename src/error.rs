//! Unified error types for wipdbg

use serde_json::Value;
use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for wipdbg
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Transport errors (connect, send, receive)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error returned by the backend for a command
    #[error("Protocol error {code}: {message}")]
    Protocol {
        /// Server error code
        code: i64,
        /// Server error message
        message: String,
        /// Optional error payload
        data: Option<Value>,
    },

    /// A required field is absent from a protocol message
    #[error("Missing protocol field: {field}")]
    ProtocolMissingField {
        /// JSON field name
        field: String,
    },

    /// A field is present but has the wrong JSON type
    #[error("Protocol field {field} is not a {expected}")]
    ProtocolTypeMismatch {
        /// JSON field name
        field: String,
        /// Expected kind
        expected: &'static str,
    },

    /// An enumerated string field holds a value this client does not know
    #[error("Unknown value {value:?} for protocol field {field}")]
    ProtocolUnknownEnum {
        /// JSON field name
        field: String,
        /// Value received
        value: String,
    },

    /// The session was closed; no further traffic is possible
    #[error("Session closed")]
    SessionClosed,

    /// Operation is illegal in the current session state
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// The remote object backing a mirror was released
    #[error("Stale handle: {0}")]
    StaleHandle(String),

    /// The script was collected by the backend
    #[error("Stale script: {0}")]
    StaleScript(String),

    /// The backend profile lacks the command
    #[error("Not supported by backend: {0}")]
    NotSupported(String),

    /// Argument names something that does not exist (breakpoint uid, frame index)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An expression evaluated for the debugger threw
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// HTTP errors on the remote-inspection endpoint
    #[error("HTTP error: {0}")]
    Http(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl Error {
    /// Create a new transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Error::Transport(msg.into())
    }

    /// Create a new backend protocol error
    pub fn protocol<S: Into<String>>(code: i64, message: S, data: Option<Value>) -> Self {
        Error::Protocol {
            code,
            message: message.into(),
            data,
        }
    }

    /// Create a new session busy error
    pub fn session_busy<S: Into<String>>(msg: S) -> Self {
        Error::SessionBusy(msg.into())
    }

    /// Create a new stale handle error
    pub fn stale_handle<S: Into<String>>(what: S) -> Self {
        Error::StaleHandle(what.into())
    }

    /// Create a new stale script error
    pub fn stale_script<S: Into<String>>(id: S) -> Self {
        Error::StaleScript(id.into())
    }

    /// Create a new not supported error
    pub fn not_supported<S: Into<String>>(method: S) -> Self {
        Error::NotSupported(method.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a new evaluation error
    pub fn evaluation<S: Into<String>>(msg: S) -> Self {
        Error::Evaluation(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// True for an unrecognised enum value; callers may substitute a fallback
    pub fn is_unknown_enum(&self) -> bool {
        matches!(self, Error::ProtocolUnknownEnum { .. })
    }

    /// True when the error means the session can carry no more traffic
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Error::SessionClosed)
    }
}
