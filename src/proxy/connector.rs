use crate::common::OriginConnector;
use crate::{ProxyError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Reaches origins over plain TCP
#[derive(Debug, Clone)]
pub struct TcpOriginConnector {
    pub connect_timeout: Duration,
}

impl Default for TcpOriginConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl OriginConnector for TcpOriginConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let origin = format!("{host}:{port}");
        let stream = timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ProxyError::Timeout(format!("Connecting to origin {origin}")))?
            .map_err(|source| ProxyError::OriginConnect {
                origin: origin.clone(),
                source,
            })?;

        debug!(%origin, "Connected to origin");
        Ok(stream)
    }
}

/// Splits a `Host` header value into host and port.
///
/// Accepts `name`, `name:port`, `[v6]` and `[v6]:port`; a missing port falls
/// back to `default_port`.
pub fn parse_origin(host: &str, default_port: u16) -> Result<(String, u16)> {
    let host = host.trim();
    let invalid = || ProxyError::InvalidHost(host.to_string());

    if host.is_empty() {
        return Err(ProxyError::MissingHost);
    }

    if let Some(rest) = host.strip_prefix('[') {
        let (addr, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail {
            "" => default_port,
            _ => tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)?,
        };
        return Ok((addr.to_string(), port));
    }

    match host.split_once(':') {
        Some((name, port)) if !name.is_empty() => {
            let port = port.parse().map_err(|_| invalid())?;
            Ok((name.to_string(), port))
        }
        Some(_) => Err(invalid()),
        None => Ok((host.to_string(), default_port)),
    }
}
