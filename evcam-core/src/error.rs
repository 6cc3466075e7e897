//! Error type shared by codecs, the session and the bindings.

use thiserror::Error;

/// Errors that can occur while configuring or running a decode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no decoder for encoding {encoding}")]
    UnsupportedEncoding { encoding: String },

    #[error("event packet has no {0} field")]
    MissingField(String),

    #[error("invalid input: {0}")]
    InvalidShape(String),

    #[error("malformed {encoding} payload: {reason}")]
    MalformedPayload { encoding: String, reason: String },
}

impl DecodeError {
    pub(crate) fn malformed(encoding: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            encoding: encoding.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
