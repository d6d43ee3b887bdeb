//! Message framing over a raw byte stream
//!
//! The framer pulls fixed-size chunks from a reader until it has the whole
//! head (up to the blank line), then keeps reading until the body reaches the
//! declared `Content-Length`. Bytes that arrive in the same chunk as the end
//! of the head are the start of the body and are carried over, since they
//! cannot be read from the connection a second time.

use super::error::{Expected, FrameStage, HttpError};
use super::message::{HttpMessage, MessageKind};
use super::parser::parse_head;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::{debug, trace};

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Limits and sizes used while framing one message
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest number of bytes requested from the reader at once
    pub chunk_size: usize,
    /// Upper bound on each individual read
    pub read_timeout: Duration,
    /// Largest accepted head, terminator excluded
    pub max_head_size: usize,
    /// Largest accepted `Content-Length`
    pub max_body_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            read_timeout: Duration::from_secs(30),
            max_head_size: 64 * 1024,
            max_body_size: 16 * 1024 * 1024,
        }
    }
}

/// Raw head text plus whatever body bytes were read along with it
#[derive(Debug)]
pub struct FramedHead {
    pub head: String,
    pub body_prefix: BytesMut,
}

/// Reads at most `max_bytes` from `reader`.
///
/// Returns an empty buffer once the peer has closed its side.
pub async fn read_chunk<R>(
    reader: &mut R,
    max_bytes: usize,
    read_timeout: Duration,
) -> Result<Bytes, HttpError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = BytesMut::zeroed(max_bytes.max(1));
    let n = timeout(read_timeout, reader.read(&mut buffer))
        .await
        .map_err(|_| HttpError::ReadTimeout(read_timeout))??;
    buffer.truncate(n);
    trace!(size = n, "Read chunk");
    Ok(buffer.freeze())
}

/// Accumulates chunks until the head terminator shows up.
pub async fn frame_head<R>(reader: &mut R, config: &FrameConfig) -> Result<FramedHead, HttpError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = BytesMut::with_capacity(config.chunk_size);

    loop {
        let chunk = read_chunk(reader, config.chunk_size, config.read_timeout).await?;
        if chunk.is_empty() {
            return Err(HttpError::ConnectionClosedEarly {
                stage: FrameStage::Head,
                received: buffer.len(),
                expected: Expected::Terminator,
            });
        }

        // The terminator may straddle the previous chunk boundary
        let search_from = buffer.len().saturating_sub(HEAD_TERMINATOR.len() - 1);
        buffer.extend_from_slice(&chunk);

        if let Some(pos) = find(&buffer[search_from..], HEAD_TERMINATOR) {
            let head_len = search_from + pos;
            if head_len > config.max_head_size {
                return Err(HttpError::HeadTooLarge {
                    limit: config.max_head_size,
                });
            }

            let head = buffer.split_to(head_len);
            let _ = buffer.split_to(HEAD_TERMINATOR.len());
            debug!(head_size = head_len, carried = buffer.len(), "Framed message head");

            return Ok(FramedHead {
                head: decode_head(&head),
                body_prefix: buffer,
            });
        }

        if buffer.len() > config.max_head_size + HEAD_TERMINATOR.len() {
            return Err(HttpError::HeadTooLarge {
                limit: config.max_head_size,
            });
        }
    }
}

/// Completes a body of exactly `content_length` bytes starting from `body_prefix`.
///
/// Never asks the reader for more than the bytes still missing.
pub async fn frame_body<R>(
    reader: &mut R,
    mut body_prefix: BytesMut,
    content_length: usize,
    config: &FrameConfig,
) -> Result<Bytes, HttpError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if content_length > config.max_body_size {
        return Err(HttpError::BodyTooLarge {
            declared: content_length,
            limit: config.max_body_size,
        });
    }

    if body_prefix.len() >= content_length {
        if body_prefix.len() > content_length {
            debug!(
                discarded = body_prefix.len() - content_length,
                "Dropping bytes past Content-Length"
            );
            body_prefix.truncate(content_length);
        }
        return Ok(body_prefix.freeze());
    }

    let mut body = body_prefix;
    body.reserve(content_length - body.len());

    while body.len() < content_length {
        let wanted = (content_length - body.len()).min(config.chunk_size);
        let chunk = read_chunk(reader, wanted, config.read_timeout).await?;
        if chunk.is_empty() {
            return Err(HttpError::ConnectionClosedEarly {
                stage: FrameStage::Body,
                received: body.len(),
                expected: Expected::Bytes(content_length),
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body.freeze())
}

/// Frames and parses one complete message of the given kind.
///
/// Without `Content-Length` the body is empty and nothing past the head is read.
pub async fn receive_message<R>(
    reader: &mut R,
    kind: MessageKind,
    config: &FrameConfig,
) -> Result<HttpMessage, HttpError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let FramedHead { head, body_prefix } = frame_head(reader, config).await?;
    let message = parse_head(&head, kind)?;

    match message.content_length()? {
        Some(content_length) => {
            let body = frame_body(reader, body_prefix, content_length, config).await?;
            Ok(message.with_body(body))
        }
        None => {
            if !body_prefix.is_empty() {
                debug!(
                    discarded = body_prefix.len(),
                    "Dropping bytes after head of message without Content-Length"
                );
            }
            Ok(message)
        }
    }
}

/// Maps every head byte to the char with the same code point (ISO-8859-1).
///
/// Never fails and never changes the byte count, so non-ASCII header bytes
/// survive a parse and serialize cycle untouched.
fn decode_head(raw: &[u8]) -> String {
    raw.iter().copied().map(char::from).collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
