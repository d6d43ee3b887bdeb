use super::config::ProxyConfig;
use super::connector::TcpOriginConnector;
use super::pipeline::{RelayOutcome, RelayPipeline};
use crate::common::OriginConnector;
use crate::transform::DescriptorSource;
use crate::{ProxyError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{Instrument, error, info, warn};

/// Forwarding proxy server
///
/// Each accepted connection runs its own [`RelayPipeline`] in a separate
/// task; the accept loop never waits for a pipeline to finish, and a failed
/// pipeline only takes down its own connection.
///
/// # Examples
///
/// ```no_run
/// use fwdproxy::proxy::{ProxyConfig, ProxyServer};
/// use fwdproxy::transform::TransformDescriptor;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let descriptor = TransformDescriptor::new("X-Operator", "ops@example.com")
///         .block("/private");
///
///     let server = ProxyServer::new(ProxyConfig::default(), descriptor);
///     let shutdown_signal = server.shutdown_signal();
///
///     let server_handle = tokio::spawn(async move { server.run().await });
///
///     // Do other work...
///
///     let _ = shutdown_signal.send(());
///     server_handle.await??;
///     Ok(())
/// }
/// ```
pub struct ProxyServer<C: OriginConnector = TcpOriginConnector> {
    config: Arc<ProxyConfig>,
    source: Arc<DescriptorSource>,
    connector: Arc<C>,
    shutdown_signal: Arc<broadcast::Sender<()>>,
}

impl ProxyServer<TcpOriginConnector> {
    /// Creates a server that reaches origins over TCP
    pub fn new(config: ProxyConfig, source: impl Into<DescriptorSource>) -> Self {
        let connector = TcpOriginConnector {
            connect_timeout: config.connect_timeout,
        };
        Self::with_connector(config, source, connector)
    }
}

impl<C> ProxyServer<C>
where
    C: OriginConnector + 'static,
    C::Stream: 'static,
{
    pub fn with_connector(
        config: ProxyConfig,
        source: impl Into<DescriptorSource>,
        connector: C,
    ) -> Self {
        let (shutdown_signal, _) = broadcast::channel(1);
        Self {
            config: Arc::new(config),
            source: Arc::new(source.into()),
            connector: Arc::new(connector),
            shutdown_signal: Arc::new(shutdown_signal),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Binds the configured address and serves until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| ProxyError::Config(format!("Failed to bind TCP listener: {e}")))?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Proxy listening");

        let connection_count = Arc::new(AtomicUsize::new(0));
        let mut shutdown_rx = self.shutdown_signal.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let current_count = connection_count.load(Ordering::SeqCst);
                            if current_count >= self.config.max_connections {
                                warn!(
                                    %addr,
                                    current = current_count,
                                    limit = self.config.max_connections,
                                    "Connection rejected: limit reached"
                                );
                                continue;
                            }

                            let new_count = connection_count.fetch_add(1, Ordering::SeqCst) + 1;
                            info!(%addr, current = new_count, "Accepted connection");

                            let config = self.config.clone();
                            let source = self.source.clone();
                            let connector = self.connector.clone();
                            let connection_count = connection_count.clone();
                            let span = tracing::info_span!("connection", %addr);

                            tokio::spawn(async move {
                                let result =
                                    Self::handle_connection(stream, config, source, connector)
                                        .instrument(span)
                                        .await;
                                if let Err(e) = result {
                                    error!(%addr, error = %e, "Pipeline aborted");
                                }
                                let final_count =
                                    connection_count.fetch_sub(1, Ordering::SeqCst) - 1;
                                info!(%addr, current = final_count, "Connection closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping proxy");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, stopping proxy");
                    break;
                }
            }
        }

        info!("Proxy stopped");
        Ok(())
    }

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }

    async fn handle_connection(
        mut stream: TcpStream,
        config: Arc<ProxyConfig>,
        source: Arc<DescriptorSource>,
        connector: Arc<C>,
    ) -> Result<RelayOutcome> {
        let mut pipeline = RelayPipeline::new(&config, &source, connector.as_ref());
        pipeline.run(&mut stream).await
    }

    /// Address the server would bind in [`run`](Self::run)
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
