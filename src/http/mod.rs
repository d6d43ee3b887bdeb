//! HTTP message framing, parsing and serialization
//!
//! This module turns a raw byte stream into [`HttpMessage`] values and back
//! into wire bytes, honoring `Content-Length` across arbitrary read boundaries.

pub mod error;
pub mod framer;
pub mod message;
pub mod parser;
pub mod serializer;


pub use error::{Expected, FrameStage, HttpError};
pub use framer::{FrameConfig, FramedHead, frame_body, frame_head, read_chunk, receive_message};
pub use message::{Headers, HttpMessage, MessageKind, StartLine};
pub use parser::{parse_head, parse_head_as};
pub use serializer::serialize;
