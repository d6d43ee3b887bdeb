use super::message::HttpMessage;
use bytes::{BufMut, Bytes, BytesMut};

/// Writes a message back out in wire format.
///
/// Start-line fields are joined by single spaces, headers follow in stored
/// order, then a blank line and the body bytes untouched. Head chars up to
/// U+00FF are written as one byte each, matching how the framer decodes them;
/// anything above that is written as UTF-8.
pub fn serialize(message: &HttpMessage) -> Bytes {
    let mut out = BytesMut::with_capacity(head_len_hint(message) + message.body().len());

    let fields = message.start_line().fields();
    for (i, (_, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.put_u8(b' ');
        }
        put_head_text(&mut out, value);
    }
    out.put_slice(b"\r\n");

    for (name, value) in message.headers().iter() {
        put_head_text(&mut out, name);
        out.put_slice(b": ");
        put_head_text(&mut out, value);
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");
    out.put_slice(message.body());

    out.freeze()
}

fn put_head_text(out: &mut BytesMut, text: &str) {
    if text.is_ascii() {
        out.put_slice(text.as_bytes());
        return;
    }
    for c in text.chars() {
        match u8::try_from(c) {
            Ok(byte) => out.put_u8(byte),
            Err(_) => out.put_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
        }
    }
}

fn head_len_hint(message: &HttpMessage) -> usize {
    let start: usize = message.start_line().fields().iter().map(|(_, v)| v.len() + 1).sum();
    let headers: usize = message
        .headers()
        .iter()
        .map(|(n, v)| n.len() + v.len() + 4)
        .sum();
    start + headers + 4
}
