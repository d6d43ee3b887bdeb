//! Forwarding proxy: accept loop, per-connection relay pipeline and origin connector

pub mod config;
pub mod connector;
pub mod pipeline;
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{ProxyConfig, ProxyConfigBuilder};
pub use connector::{TcpOriginConnector, parse_origin};
pub use pipeline::{RelayOutcome, RelayPipeline, RelayState};
pub use server::ProxyServer;
