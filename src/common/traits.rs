use crate::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Opens outbound connections to origin servers
///
/// The relay pipeline only sees this trait, so the way origins are reached
/// (plain TCP in production, a fixed local address in tests) can be swapped
/// without touching the pipeline.
#[async_trait]
pub trait OriginConnector: Send + Sync {
    /// Connection type handed back to the pipeline
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Connects to `host` on `port`
    async fn connect(&self, host: &str, port: u16) -> Result<Self::Stream>;
}
