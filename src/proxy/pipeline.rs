//! One full proxy cycle for a single client connection
//!
//! ```text
//! AwaitRequest -> RequestReceived -> Blocked ----------------------------> Closed
//!                                 \-> Forwarding -> ResponseReceived -> Relayed -> Closed
//! ```
//!
//! There are no retries. Any error aborts the cycle, and both connections
//! are closed when they are dropped.

use super::config::ProxyConfig;
use super::connector::parse_origin;
use crate::common::OriginConnector;
use crate::http::{MessageKind, receive_message, serialize};
use crate::transform::{
    DescriptorSource, build_blocked_response, is_blocked, prepare_request, redact,
};
use crate::{ProxyError, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Where a pipeline currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    AwaitRequest,
    RequestReceived,
    Blocked,
    Forwarding,
    ResponseReceived,
    Relayed,
    Closed,
}

/// How a completed pipeline ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The client got a 403 and no origin was contacted
    Blocked { resource: String },
    /// The origin response was relayed to the client
    Relayed { origin: String, status: String },
}

pub struct RelayPipeline<'a, C: OriginConnector> {
    config: &'a ProxyConfig,
    source: &'a DescriptorSource,
    connector: &'a C,
    state: RelayState,
}

impl<'a, C: OriginConnector> RelayPipeline<'a, C> {
    pub fn new(config: &'a ProxyConfig, source: &'a DescriptorSource, connector: &'a C) -> Self {
        Self {
            config,
            source,
            connector,
            state: RelayState::AwaitRequest,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Drives the client connection from request to closed socket
    pub async fn run<S>(&mut self, client: &mut S) -> Result<RelayOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let frame_config = self.config.frame_config();

        let request = receive_message(client, MessageKind::Request, &frame_config).await?;
        self.transition(RelayState::RequestReceived);

        let resource = request.resource().unwrap_or_default().to_string();
        info!(
            method = request.start_line().fields()[0].1,
            %resource,
            body_size = request.body().len(),
            "Received request"
        );

        let descriptor = self.source.load().await?;

        if is_blocked(&request, &descriptor) {
            self.transition(RelayState::Blocked);
            let response = build_blocked_response(request.start_line().http_version());
            self.send(client, &serialize(&response)).await?;
            warn!(%resource, "Blocked request");

            self.close(client).await;
            return Ok(RelayOutcome::Blocked { resource });
        }

        let host = request.host().ok_or(ProxyError::MissingHost)?;
        let (origin_host, origin_port) = parse_origin(host, self.config.origin_port)?;
        let origin = format!("{origin_host}:{origin_port}");

        self.transition(RelayState::Forwarding);
        let request = prepare_request(request, &descriptor);
        let mut upstream = self.connector.connect(&origin_host, origin_port).await?;
        self.send(&mut upstream, &serialize(&request)).await?;
        debug!(%origin, "Forwarded request");

        let response = receive_message(&mut upstream, MessageKind::Response, &frame_config).await?;
        self.transition(RelayState::ResponseReceived);

        let response = redact(response, &descriptor);
        let status = response.status_code().unwrap_or_default().to_string();
        self.send(client, &serialize(&response)).await?;
        self.transition(RelayState::Relayed);
        info!(%origin, %status, body_size = response.body().len(), "Relayed response");

        self.close(&mut upstream).await;
        self.close(client).await;
        Ok(RelayOutcome::Relayed { origin, status })
    }

    fn transition(&mut self, next: RelayState) {
        debug!(from = ?self.state, to = ?next, "Pipeline transition");
        self.state = next;
    }

    async fn send<W>(&self, stream: &mut W, data: &[u8]) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        timeout(self.config.write_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| ProxyError::Timeout("Write timeout".to_string()))??;
        Ok(())
    }

    async fn close<W>(&mut self, stream: &mut W)
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if let Ok(Err(e)) = timeout(self.config.write_timeout, stream.shutdown()).await {
            debug!(error = %e, "Shutdown failed");
        }
        self.state = RelayState::Closed;
    }
}
