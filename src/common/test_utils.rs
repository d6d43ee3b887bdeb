//! Helpers for exercising the proxy in tests
//!
//! These are public so integration tests and benchmarks can use them too.

use crate::common::OriginConnector;
use crate::http::{FrameConfig, HttpMessage, MessageKind, receive_message};
use crate::proxy::{ProxyConfig, ProxyServer};
use crate::transform::DescriptorSource;
use crate::{ProxyError, Result};
use async_trait::async_trait;
use bytes::{Buf, Bytes};
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// In-memory reader that hands out pre-cut chunks and counts reads
///
/// Each read returns at most the rest of the current chunk. Once all chunks
/// are consumed every read reports end of stream.
#[derive(Debug, Default)]
pub struct ChunkedReader {
    chunks: VecDeque<Bytes>,
    reads: usize,
}

impl ChunkedReader {
    pub fn new<I, T>(chunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        Self {
            chunks: chunks
                .into_iter()
                .map(Into::into)
                .filter(|chunk: &Bytes| !chunk.is_empty())
                .collect(),
            reads: 0,
        }
    }

    /// Cuts `data` into chunks of `chunk_len` bytes (the last may be shorter)
    pub fn split(data: &[u8], chunk_len: usize) -> Self {
        Self::new(data.chunks(chunk_len.max(1)).map(Bytes::copy_from_slice))
    }

    /// Number of read calls served so far, end-of-stream reads included
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Bytes not yet handed out
    pub fn remaining(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.reads += 1;

        if let Some(front) = this.chunks.front_mut() {
            let n = front.len().min(buf.remaining());
            buf.put_slice(&front[..n]);
            front.advance(n);
            if front.is_empty() {
                this.chunks.pop_front();
            }
        }

        Poll::Ready(Ok(()))
    }
}

/// Connector that sends every origin to one fixed address and counts connects
#[derive(Debug, Clone)]
pub struct FixedOriginConnector {
    pub addr: SocketAddr,
    connects: Arc<AtomicUsize>,
}

impl FixedOriginConnector {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of connection attempts
    pub fn connects(&self) -> Arc<AtomicUsize> {
        self.connects.clone()
    }
}

#[async_trait]
impl OriginConnector for FixedOriginConnector {
    type Stream = TcpStream;

    async fn connect(&self, _host: &str, _port: u16) -> Result<TcpStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        TcpStream::connect(self.addr)
            .await
            .map_err(|source| ProxyError::OriginConnect {
                origin: self.addr.to_string(),
                source,
            })
    }
}

/// Starts a one-shot origin that reads one request and answers with `response`.
///
/// The join handle yields the request the origin received.
pub async fn spawn_origin(
    response: Vec<u8>,
) -> Result<(SocketAddr, JoinHandle<Result<HttpMessage>>)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| ProxyError::Config(format!("Failed to bind origin: {e}")))?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        let request =
            receive_message(&mut stream, MessageKind::Request, &FrameConfig::default()).await?;
        stream.write_all(&response).await?;
        stream.shutdown().await?;
        Ok::<HttpMessage, ProxyError>(request)
    });

    Ok((addr, handle))
}

/// Handle on a proxy started by [`spawn_test_proxy`]
pub struct TestProxy {
    pub addr: SocketAddr,
    pub handle: JoinHandle<Result<()>>,
    pub shutdown: broadcast::Sender<()>,
}

/// Starts a proxy on an ephemeral loopback port
pub async fn spawn_test_proxy<C>(
    config: ProxyConfig,
    source: impl Into<DescriptorSource>,
    connector: C,
) -> Result<TestProxy>
where
    C: OriginConnector + 'static,
    C::Stream: 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| ProxyError::Config(format!("Failed to bind listener: {e}")))?;
    let addr = listener.local_addr()?;

    let server = ProxyServer::with_connector(config, source, connector);
    let shutdown = server.shutdown_signal();
    let handle = tokio::spawn(async move { server.serve(listener).await });

    Ok(TestProxy {
        addr,
        handle,
        shutdown,
    })
}

/// Writes `request` to `addr` and reads until the other side closes
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request).await?;
    stream.flush().await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(response)
}
