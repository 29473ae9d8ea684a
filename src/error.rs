//! Error types for rendering, resizing and the graphics protocol.

use std::fmt::Display;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while talking to the terminal over the graphics protocol.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The terminal answered, but without a success marker.
    #[error("{message:?}: terminal responded with {answer:?}")]
    Answer { message: String, answer: String },

    /// No answer terminator arrived before the deadline.
    #[error("terminal did not answer {message:?} within {timeout:?}")]
    Timeout { message: String, timeout: Duration },

    /// The image id is outside of the configured id space.
    #[error("image id {id} outside of allowed range {min}..={max}")]
    IdOutOfRange { id: u32, min: u32, max: u32 },

    /// A graphics message could not be parsed.
    #[error("malformed graphics message: {0}")]
    Malformed(String),

    /// The payload of a parsed message is not base64.
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Writing to or reading from the terminal failed.
    #[error("terminal i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while loading, decoding or scaling an image.
#[derive(Debug, thiserror::Error)]
pub enum ResizeError {
    /// The bitmap could not be identified or decoded.
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The source file could not be read.
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Minimum bounds exceed maximum bounds.
    #[error("invalid resize bounds: minimum {min_w}x{min_h} exceeds maximum {max_w}x{max_h}")]
    InvalidBounds {
        min_w: u32,
        min_h: u32,
        max_w: u32,
        max_h: u32,
    },

    /// The image has a zero dimension.
    #[error("image has no pixels")]
    Empty,

    /// A remote source could not be downloaded.
    #[error("cannot fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
}

/// Errors that abort a render call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Resize(#[from] ResizeError),

    /// The bitmap could not be encoded for transmission.
    #[error("cannot encode image for transmission: {0}")]
    Encode(#[source] image::ImageError),

    #[error("terminal i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What to do with a recoverable content error: raise it, print it, or drop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub raise: bool,
    pub print: bool,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy {
            raise: false,
            print: true,
        }
    }
}

impl ErrorPolicy {
    /// Return the error when raising, otherwise swallow it (optionally
    /// printing a diagnostic first).
    pub fn recover<E>(&self, err: E) -> std::result::Result<(), E>
    where
        E: Display,
    {
        if self.raise {
            return Err(err);
        }

        if self.print {
            crate::logging::diagnostic(&err);
        } else {
            log::debug!("Ignoring error: {}", err);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_raise_returns_error() {
        let policy = ErrorPolicy {
            raise: true,
            print: true,
        };
        assert!(policy.recover(ResizeError::Empty).is_err());
    }

    #[test]
    fn test_policy_silent_swallows_error() {
        let policy = ErrorPolicy {
            raise: false,
            print: false,
        };
        assert!(policy.recover(ResizeError::Empty).is_ok());
    }

    #[test]
    fn test_answer_error_mentions_request_and_reply() {
        let err = ProtocolError::Answer {
            message: "\x1b_Ga=q,i=1,X=1;\x1b\\".to_string(),
            answer: "\x1b_Gi=1;ENOENT\x1b\\".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("a=q"));
        assert!(text.contains("ENOENT"));
    }
}
