//! In-memory representation of a single HTTP request or response
//!
//! A message is owned by exactly one pipeline invocation. Transformations
//! consume a message and hand back the rewritten one, so no message is ever
//! aliased between connections.

use super::error::HttpError;
use bytes::Bytes;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const HOST: &str = "Host";

/// Whether a message is a request or a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

impl FromStr for MessageKind {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("request") {
            Ok(MessageKind::Request)
        } else if s.eq_ignore_ascii_case("response") {
            Ok(MessageKind::Response)
        } else {
            Err(HttpError::InvalidMessageKind(s.to_string()))
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Request => write!(f, "request"),
            MessageKind::Response => write!(f, "response"),
        }
    }
}

/// The three positional fields of the first line of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: String,
        resource: String,
        http_version: String,
    },
    Response {
        http_version: String,
        status_code: String,
        status_text: String,
    },
}

impl StartLine {
    pub fn kind(&self) -> MessageKind {
        match self {
            StartLine::Request { .. } => MessageKind::Request,
            StartLine::Response { .. } => MessageKind::Response,
        }
    }

    /// Named fields in wire order
    pub fn fields(&self) -> [(&'static str, &str); 3] {
        match self {
            StartLine::Request {
                method,
                resource,
                http_version,
            } => [
                ("method", method),
                ("resource", resource),
                ("http_version", http_version),
            ],
            StartLine::Response {
                http_version,
                status_code,
                status_text,
            } => [
                ("http_version", http_version),
                ("status_code", status_code),
                ("status_text", status_text),
            ],
        }
    }

    pub fn http_version(&self) -> &str {
        match self {
            StartLine::Request { http_version, .. } | StartLine::Response { http_version, .. } => {
                http_version
            }
        }
    }
}

/// Ordered header map
///
/// Names keep the spelling they were first inserted with and are written back
/// out unchanged. Lookups ignore ASCII case, and inserting a name that is
/// already present replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: IndexMap<String, (String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, returning the previous value if there was one
    pub fn insert(&mut self, name: &str, value: &str) -> Option<String> {
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value.to_string())),
            None => {
                self.entries
                    .insert(key, (name.to_string(), value.to_string()));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// One HTTP request or response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage {
    start_line: StartLine,
    headers: Headers,
    body: Bytes,
}

impl HttpMessage {
    /// Creates a message with no headers and an empty body
    pub fn new(start_line: StartLine) -> Self {
        Self {
            start_line,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// # Examples
    ///
    /// ```
    /// use fwdproxy::http::{HttpMessage, MessageKind};
    ///
    /// let request = HttpMessage::request("GET", "/index.html", "HTTP/1.1")
    ///     .with_header("Host", "example.com");
    /// assert_eq!(request.kind(), MessageKind::Request);
    /// assert_eq!(request.resource(), Some("/index.html"));
    /// ```
    pub fn request(method: &str, resource: &str, http_version: &str) -> Self {
        Self::new(StartLine::Request {
            method: method.to_string(),
            resource: resource.to_string(),
            http_version: http_version.to_string(),
        })
    }

    pub fn response(http_version: &str, status_code: &str, status_text: &str) -> Self {
        Self::new(StartLine::Response {
            http_version: http_version.to_string(),
            status_code: status_code.to_string(),
            status_text: status_text.to_string(),
        })
    }

    pub fn kind(&self) -> MessageKind {
        self.start_line.kind()
    }

    pub fn start_line(&self) -> &StartLine {
        &self.start_line
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body without touching `Content-Length`
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Request target, `None` for responses
    pub fn resource(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { resource, .. } => Some(resource),
            StartLine::Response { .. } => None,
        }
    }

    /// Status code, `None` for requests
    pub fn status_code(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Response { status_code, .. } => Some(status_code),
            StartLine::Request { .. } => None,
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.headers.get(HOST)
    }

    /// Declared body length, if the message carries `Content-Length`
    pub fn content_length(&self) -> Result<Option<usize>, HttpError> {
        self.headers
            .get(CONTENT_LENGTH)
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| HttpError::InvalidContentLength(value.to_string()))
            })
            .transpose()
    }
}
