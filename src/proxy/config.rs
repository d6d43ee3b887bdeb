use crate::http::FrameConfig;
use crate::transform::ConfigFile;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Runtime configuration for the proxy server
///
/// # Examples
///
/// ```
/// use fwdproxy::proxy::ProxyConfig;
/// use std::time::Duration;
///
/// let config = ProxyConfig {
///     bind_addr: "127.0.0.1:8888".parse().unwrap(),
///     buffer_size: 64,
///     read_timeout: Duration::from_secs(5),
///     ..Default::default()
/// };
/// assert_eq!(config.origin_port, 80);
/// ```
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to accept client connections on
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Chunk size for socket reads
    pub buffer_size: usize,
    /// Read timeout, applied to every socket read
    pub read_timeout: Duration,
    /// Write timeout for connections
    pub write_timeout: Duration,
    /// Timeout for reaching an origin
    pub connect_timeout: Duration,
    /// Port used when the Host header names none
    pub origin_port: u16,
    /// Largest accepted message head
    pub max_head_size: usize,
    /// Largest accepted message body
    pub max_body_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8888)),
            max_connections: 100,
            buffer_size: 8192,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            origin_port: 80,
            max_head_size: 64 * 1024,
            max_body_size: 16 * 1024 * 1024,
        }
    }
}

impl ProxyConfig {
    /// Framing limits derived from this config
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            chunk_size: self.buffer_size,
            read_timeout: self.read_timeout,
            max_head_size: self.max_head_size,
            max_body_size: self.max_body_size,
        }
    }

    /// Applies the listener overrides a config file may carry
    pub fn with_file_overrides(mut self, file: &ConfigFile) -> Self {
        if let Some(listen) = file.listen {
            self.bind_addr = listen;
        }
        if let Some(buffer_size) = file.buffer_size {
            self.buffer_size = buffer_size;
        }
        self
    }
}

/// Builder for proxy configuration
pub struct ProxyConfigBuilder {
    config: ProxyConfig,
}

impl ProxyConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ProxyConfig::default(),
        }
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn origin_port(mut self, port: u16) -> Self {
        self.config.origin_port = port;
        self
    }

    pub fn max_head_size(mut self, size: usize) -> Self {
        self.config.max_head_size = size;
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    pub fn build(self) -> ProxyConfig {
        self.config
    }
}

impl Default for ProxyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
