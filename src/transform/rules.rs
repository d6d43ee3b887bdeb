use super::descriptor::TransformDescriptor;
use crate::http::message::{CONTENT_LENGTH, CONTENT_TYPE};
use crate::http::{HttpMessage, MessageKind};
use bytes::Bytes;
use tracing::{debug, warn};

pub const BLOCKED_STATUS_CODE: &str = "403";
pub const BLOCKED_STATUS_TEXT: &str = "Blocked address";
pub const BLOCKED_BODY: &str = "<h1>Error 403, Blocked address</h1>";

/// Sets `name` to `value`, overwriting any existing entry
pub fn inject_header(message: HttpMessage, name: &str, value: &str) -> HttpMessage {
    message.with_header(name, value)
}

/// True when a request targets a blocked resource. Responses are never blocked.
pub fn is_blocked(message: &HttpMessage, descriptor: &TransformDescriptor) -> bool {
    message
        .resource()
        .is_some_and(|resource| descriptor.blocked_resources.contains(resource))
}

/// Replaces every forbidden word in the body, in configured order.
///
/// Matching is literal and byte-wise, with no notion of word boundaries. When
/// the message declares `Content-Length`, it is rewritten once all
/// replacements are done.
pub fn redact(message: HttpMessage, descriptor: &TransformDescriptor) -> HttpMessage {
    if descriptor.forbidden_word_replacements.is_empty() {
        return message;
    }

    let mut body = message.body().to_vec();
    let mut replaced = 0;
    for (word, replacement) in &descriptor.forbidden_word_replacements {
        if word.is_empty() {
            warn!("Skipping empty forbidden word");
            continue;
        }
        let (next, count) = replace_all(&body, word.as_bytes(), replacement.as_bytes());
        body = next;
        replaced += count;
    }

    if replaced == 0 {
        return message;
    }
    debug!(replaced, size = body.len(), "Redacted body");

    let has_length = message.headers().contains(CONTENT_LENGTH);
    let message = message.with_body(Bytes::from(body));
    if has_length {
        let length = message.body().len().to_string();
        message.with_header(CONTENT_LENGTH, &length)
    } else {
        message
    }
}

/// The response sent in place of forwarding a blocked request
pub fn build_blocked_response(http_version: &str) -> HttpMessage {
    HttpMessage::response(http_version, BLOCKED_STATUS_CODE, BLOCKED_STATUS_TEXT)
        .with_header(CONTENT_TYPE, "text/html")
        .with_header(CONTENT_LENGTH, &BLOCKED_BODY.len().to_string())
        .with_body(BLOCKED_BODY)
}

/// Applies the outbound request rules: just the identity header
pub fn prepare_request(message: HttpMessage, descriptor: &TransformDescriptor) -> HttpMessage {
    debug_assert_eq!(message.kind(), MessageKind::Request);
    inject_header(
        message,
        &descriptor.injected_header_name,
        &descriptor.injected_header_value,
    )
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(haystack.len());
    let mut count = 0;
    let mut i = 0;

    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
            count += 1;
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }

    (out, count)
}
