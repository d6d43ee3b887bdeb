use super::error::HttpError;
use super::message::{HttpMessage, MessageKind, StartLine};

const HEADER_SEPARATOR: &str = ": ";

/// Parses a framed message head (everything before the blank line) into a
/// message with an empty body.
///
/// The start line must have three space-separated fields; the last field takes
/// the rest of the line, so reason phrases with spaces are kept intact. Every
/// other line must be `name: value`, or `name:` for an empty value. Anything
/// else is rejected.
pub fn parse_head(raw_head: &str, kind: MessageKind) -> Result<HttpMessage, HttpError> {
    let mut lines = raw_head.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

    let first = lines.next().unwrap_or_default();
    let start_line = parse_start_line(first, kind)?;
    let mut message = HttpMessage::new(start_line);

    for line in lines {
        let (name, value) = line
            .split_once(HEADER_SEPARATOR)
            .or_else(|| line.strip_suffix(':').map(|name| (name, "")))
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| HttpError::MalformedHeaderLine(line.to_string()))?;
        message.headers_mut().insert(name, value);
    }

    Ok(message)
}

/// Like [`parse_head`], with the kind given by name (`"request"` or `"response"`).
///
/// The kind is validated before anything else is looked at.
pub fn parse_head_as(raw_head: &str, kind: &str) -> Result<HttpMessage, HttpError> {
    let kind: MessageKind = kind.parse()?;
    parse_head(raw_head, kind)
}

fn parse_start_line(line: &str, kind: MessageKind) -> Result<StartLine, HttpError> {
    let mut parts = line.splitn(3, ' ');
    let (first, second, third) = match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c)) if !a.is_empty() && !b.is_empty() => (a, b, c),
        _ => return Err(HttpError::MalformedStartLine(line.to_string())),
    };

    let start_line = match kind {
        MessageKind::Request => StartLine::Request {
            method: first.to_string(),
            resource: second.to_string(),
            http_version: third.to_string(),
        },
        MessageKind::Response => StartLine::Response {
            http_version: first.to_string(),
            status_code: second.to_string(),
            status_text: third.to_string(),
        },
    };
    Ok(start_line)
}
