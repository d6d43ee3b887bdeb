use crate::http::HttpError;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for the fwdproxy library
#[derive(Error, Debug)]
pub enum ProxyError {
    /// TCP-related errors (bind, accept, write)
    #[error("TCP error: {0}")]
    Tcp(#[from] std::io::Error),

    /// Framing or parsing of a message failed
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The config file could not be read or parsed
    #[error("Configuration unavailable at {}: {reason}", .path.display())]
    ConfigUnavailable { path: PathBuf, reason: String },

    /// The client request names no origin
    #[error("Request has no Host header")]
    MissingHost,

    /// The client sent a Host header that names no usable origin
    #[error("Invalid Host header: {0:?}")]
    InvalidHost(String),

    /// The origin could not be reached
    #[error("Failed to connect to origin {origin}: {source}")]
    OriginConnect {
        origin: String,
        source: std::io::Error,
    },

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),
}

/// Result type for the fwdproxy library
pub type Result<T> = std::result::Result<T, ProxyError>;

pub mod common;
pub mod http;
pub mod proxy;
pub mod transform;

// Re-export main types for convenience
pub use common::OriginConnector;
pub use http::{HttpMessage, MessageKind};
pub use proxy::{ProxyConfig, ProxyConfigBuilder, ProxyServer, RelayOutcome, RelayPipeline};
pub use transform::{ConfigFile, DescriptorSource, TransformDescriptor};
