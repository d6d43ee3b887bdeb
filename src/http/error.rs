use std::io;
use std::time::Duration;

/// Errors raised while framing or parsing a single HTTP message
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the connection before the message was complete
    #[error(
        "Connection closed early while reading {stage}: got {received} bytes, expected {expected}"
    )]
    ConnectionClosedEarly {
        stage: FrameStage,
        received: usize,
        expected: Expected,
    },

    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("Message head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("Declared body of {declared} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { declared: usize, limit: usize },

    /// Parser was asked for a message kind other than request or response
    #[error("Invalid HTTP message kind: {0}")]
    InvalidMessageKind(String),

    #[error("Malformed start line: {0:?}")]
    MalformedStartLine(String),

    #[error("Malformed header line: {0:?}")]
    MalformedHeaderLine(String),

    #[error("Invalid Content-Length value: {0:?}")]
    InvalidContentLength(String),
}

/// Which part of a message the framer was reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Head,
    Body,
}

impl std::fmt::Display for FrameStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameStage::Head => write!(f, "message head"),
            FrameStage::Body => write!(f, "message body"),
        }
    }
}

/// How many bytes the framer still expected when the peer went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// Waiting for the blank line that ends the head
    Terminator,
    /// Waiting for this many body bytes in total
    Bytes(usize),
}

impl std::fmt::Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Terminator => write!(f, "header terminator"),
            Expected::Bytes(n) => write!(f, "{n} bytes"),
        }
    }
}

impl HttpError {
    /// True for errors caused by the peer hanging up mid-message
    pub fn is_closed_early(&self) -> bool {
        matches!(self, HttpError::ConnectionClosedEarly { .. })
    }
}
