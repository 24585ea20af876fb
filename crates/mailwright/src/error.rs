//! Error types for message serialization.

use std::io;
use std::string::FromUtf8Error;

/// Result type alias for message operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message construction and serialization errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The message has no sender address.
    #[error("From is required")]
    FromRequired,

    /// The message has no root content part.
    #[error("Body is missing")]
    NoBody,

    /// The root part cannot take a text or HTML body without an explicit tree.
    #[error("Ambiguous MIME tree for inserting text or HTML body")]
    AmbiguousMimeTree,

    /// I/O error from the output sink or a content source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid header field name.
    #[error("Invalid header name: {0}")]
    InvalidHeader(String),

    /// Header is rendered from a dedicated field and cannot be added directly.
    #[error("Header is managed by the message: {0}")]
    ReservedHeader(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid encoded input.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),
}

impl Error {
    /// Returns true if this error is a serialization precondition failure.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::FromRequired | Self::NoBody)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(Error::FromRequired.is_precondition());
        assert!(Error::NoBody.is_precondition());
        assert!(!Error::AmbiguousMimeTree.is_precondition());
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "sink closed").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "I/O error: sink closed");
    }
}
