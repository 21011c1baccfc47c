//! Outbound response state.
//!
//! The dispatch core accumulates status, headers and a lazily produced body
//! on the controller instance; [`ResponseContext`] is the assembled result
//! handed back to the transport, which owns the actual socket write.

use std::io::Read;
use std::sync::Arc;

use crate::request::HeaderVec;

/// Headers that may legitimately appear more than once in a response.
/// Everything else is last-write-wins.
const APPEND_HEADERS: [&str; 1] = ["set-cookie"];

/// A lazily evaluated response body.
///
/// Bodies are produced as strings by template engines, as raw bytes by
/// object transforms, or deferred behind a callable when the content is
/// expensive and may never be written (HEAD requests, connection drops).
pub enum Body {
    /// No body at all.
    Empty,
    /// A fully rendered string body.
    Literal(String),
    /// Raw bytes, e.g. from an object transform.
    Bytes(Vec<u8>),
    /// Streamed content, drained at write-out.
    Stream(Box<dyn std::io::Read + Send>),
    /// Deferred production; invoked once at write-out.
    Deferred(Box<dyn FnOnce() -> Vec<u8> + Send>),
}

impl Body {
    /// Realize the body into bytes. Deferred bodies run their callable here.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Body::Empty => Vec::new(),
            Body::Literal(s) => s.into_bytes(),
            Body::Bytes(b) => b,
            Body::Stream(mut reader) => {
                let mut buf = Vec::new();
                if let Err(err) = reader.read_to_end(&mut buf) {
                    tracing::warn!(error = %err, "response stream truncated");
                }
                buf
            }
            Body::Deferred(f) => f(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Literal(s) => s.is_empty(),
            Body::Bytes(b) => b.is_empty(),
            Body::Stream(_) => false,
            Body::Deferred(_) => false,
        }
    }

    /// Realized string content for assertions and logging. Deferred bodies
    /// are not evaluated.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Body::Empty => Some(""),
            Body::Literal(s) => Some(s),
            Body::Bytes(b) => std::str::from_utf8(b).ok(),
            Body::Stream(_) => None,
            Body::Deferred(_) => None,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => write!(f, "Body::Empty"),
            Body::Literal(s) => write!(f, "Body::Literal({} bytes)", s.len()),
            Body::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Body::Stream(_) => write!(f, "Body::Stream"),
            Body::Deferred(_) => write!(f, "Body::Deferred"),
        }
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Literal(s)
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Literal(s.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Body::Bytes(b)
    }
}

/// The response as handed to the transport: status, ordered headers, body.
#[derive(Debug, Default)]
pub struct ResponseContext {
    /// HTTP status code (200 unless set otherwise).
    pub status: u16,
    /// Response headers in emission order.
    pub headers: HeaderVec,
    /// Response body.
    pub body: Body,
}

impl ResponseContext {
    /// A fresh 200 response with the default Content-Type.
    #[must_use]
    pub fn new() -> Self {
        let mut headers = HeaderVec::new();
        headers.push((
            Arc::from("Content-Type"),
            "text/html; charset=utf-8".to_string(),
        ));
        ResponseContext {
            status: 200,
            headers,
            body: Body::Empty,
        }
    }

    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value (last write wins).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        set_header(&mut self.headers, name, value.into());
    }

    /// Append a header without replacing existing occurrences (Set-Cookie).
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((Arc::from(name), value.into()));
    }
}

/// Replace-or-insert on an ordered header multimap, except for headers that
/// are list-valued by nature (Set-Cookie), which always append.
pub(crate) fn set_header(headers: &mut HeaderVec, name: &str, value: String) {
    if APPEND_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
        headers.push((Arc::from(name), value));
        return;
    }
    if let Some(slot) = headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        slot.1 = value;
    } else {
        headers.push((Arc::from(name), value));
    }
}

/// Standard reason phrase for the statuses this crate emits.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        301 => "Moved Permanently",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        406 => "Not Acceptable",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_header_last_write_wins() {
        let mut res = ResponseContext::new();
        res.set_header("Content-Type", "application/xml");
        res.set_header("content-type", "application/json");
        assert_eq!(res.get_header("Content-Type"), Some("application/json"));
        assert_eq!(
            res.headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                .count(),
            1
        );
    }

    #[test]
    fn test_set_cookie_appends() {
        let mut res = ResponseContext::new();
        res.set_header("Set-Cookie", "a=1");
        res.set_header("Set-Cookie", "b=2");
        assert_eq!(
            res.headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie"))
                .count(),
            2
        );
    }

    #[test]
    fn test_deferred_body_runs_at_write_out() {
        let body = Body::Deferred(Box::new(|| b"late".to_vec()));
        assert_eq!(body.into_bytes(), b"late");
    }

    #[test]
    fn test_stream_body_is_drained_at_write_out() {
        let body = Body::Stream(Box::new(std::io::Cursor::new(b"chunked".to_vec())));
        assert_eq!(body.into_bytes(), b"chunked");
    }

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(406), "Not Acceptable");
        assert_eq!(status_reason(500), "Internal Server Error");
    }
}
