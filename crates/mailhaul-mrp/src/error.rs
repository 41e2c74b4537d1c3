//! Error types for the MRP library.

use thiserror::Error;

use crate::cipher::EncryptionMode;

/// Errors that can occur during MRP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session has been closed; no further reads or writes are possible.
    #[error("Session is closed")]
    Closed,

    /// The pre-shared key is too short for the selected algorithm.
    #[error("Key too short for {mode}: need {expected} bytes, have {actual}")]
    KeyLength {
        /// The mode the key was derived for.
        mode: EncryptionMode,
        /// Required key length in bytes.
        expected: usize,
        /// Available key length in bytes.
        actual: usize,
    },

    /// Encryption or decryption failed (bad padding, corrupted ciphertext).
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// A received unit could not be decoded back into text.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A message record field could not be parsed.
    #[error("Parse error in field {field}: {message}")]
    Parse {
        /// The field prefix that failed to parse.
        field: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
