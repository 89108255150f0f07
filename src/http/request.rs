//! A fully parsed HTTP/1.1 request, built from [`super::parser::ParseResult`]
//! offsets plus the [`Bytes`] buffer they index into, and body framing
//! (`Content-Length` / chunked) resolved on top per spec §4.1/§4.3.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use super::parser::{ParseError, ParseOutcome, ParseResult, parse_head};
use super::{Headers, Method};
use crate::util::parse_content_length;

/// Errors encountered while turning a buffer into a [`Request`], covering
/// both the parser's own errors and the body-framing rules layered on top.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// More bytes are needed before the request head is complete.
    #[error("request head is incomplete — more data needed")]
    Incomplete,

    /// The request head itself is malformed.
    #[error("malformed request: {0}")]
    Malformed(#[from] ParseError),

    /// `Content-Length` is present but not a valid non-negative decimal integer.
    #[error("invalid Content-Length header")]
    InvalidContentLength,

    /// Both `Content-Length` and `Transfer-Encoding: chunked` were present —
    /// rejected per RFC 7230 §3.3.3 rule 3 rather than guessing which wins.
    #[error("Content-Length and Transfer-Encoding: chunked both present")]
    ConflictingBodyFraming,
}

/// How the body of this request is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body (no `Content-Length`, no chunked transfer coding).
    None,
    /// `Content-Length: N` — exactly `N` bytes follow the head.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
}

/// A fully parsed HTTP/1.1 request.
///
/// Headers and path/query are zero-copy views into the buffer the request
/// was parsed from; the body is a [`Bytes`] slice assembled by the
/// connection state machine once body framing (`Content-Length` or chunked)
/// has been fully read off the wire.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use hearth_http::http::request::Request;
///
/// let buf = Bytes::from_static(b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n");
/// let (request, _body_start) = Request::parse_head(buf.clone()).unwrap();
///
/// assert_eq!(request.method(), hearth_http::http::Method::Get);
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name"), Some("world".to_string()));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    buf: Bytes,
    method: Method,
    path_start: usize,
    path_end: usize,
    query_start: usize,
    query_end: usize,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Parses just the request head (request line + headers) from `buf`,
    /// returning the `Request` (with an empty body, to be filled in by
    /// [`Request::with_body`] once the connection layer has read the body
    /// off the wire) and the offset at which the body begins.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — the head is not yet fully buffered.
    /// - [`RequestError::Malformed`] — the head is not valid HTTP/1.1.
    pub fn parse_head(buf: Bytes) -> Result<(Self, usize), RequestError> {
        Self::parse_head_bounded(buf, super::parser::DEFAULT_MAX_HEADER_SIZE, super::parser::MAX_HEADERS)
    }

    /// As [`Request::parse_head`], with explicit header-size and header-count
    /// bounds (used by the connection state machine to honor
    /// [`crate::server::ServerConfig`]).
    pub fn parse_head_bounded(
        buf: Bytes,
        max_header_size: usize,
        max_headers: usize,
    ) -> Result<(Self, usize), RequestError> {
        match parse_head(&buf, max_header_size, max_headers)? {
            ParseOutcome::Incomplete => Err(RequestError::Incomplete),
            ParseOutcome::Complete(result) => {
                let body_start = result.body_start;
                let req = Self::from_parse_result(buf, &result)?;
                Ok((req, body_start))
            }
        }
    }

    /// Builds a `Request` from already-parsed offsets, for callers (the
    /// connection state machine) that `split_to`'d the head bytes off a
    /// growing read buffer themselves rather than going through
    /// [`Request::parse_head`].
    pub(crate) fn from_parse_result_bytes(buf: Bytes, result: &ParseResult) -> Result<Self, RequestError> {
        Self::from_parse_result(buf, result)
    }

    fn from_parse_result(buf: Bytes, result: &ParseResult) -> Result<Self, RequestError> {
        let mut headers = Headers::with_capacity(result.headers_count);
        for h in result.headers() {
            headers.insert_bytes(
                buf.slice(h.name_start..h.name_end),
                buf.slice(h.value_start..h.value_end),
            );
        }

        let req = Self {
            buf,
            method: result.method,
            path_start: result.path_start,
            path_end: result.path_end,
            query_start: result.query_start,
            query_end: result.query_end,
            headers,
            body: Bytes::new(),
        };

        // Validate body framing eagerly: conflicting framing is a malformed
        // request regardless of whether a body ever arrives.
        req.body_framing()?;
        Ok(req)
    }

    /// Returns the request's body-framing mode, validating `Content-Length`
    /// and the chunked/length conflict rule along the way.
    pub fn body_framing(&self) -> Result<BodyFraming, RequestError> {
        let has_chunked = self
            .headers
            .get("transfer-encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
        let content_length = self.headers.get("content-length");

        match (content_length, has_chunked) {
            (Some(_), true) => Err(RequestError::ConflictingBodyFraming),
            (Some(v), false) => {
                let n = parse_content_length(v).ok_or(RequestError::InvalidContentLength)?;
                Ok(BodyFraming::Length(n))
            }
            (None, true) => Ok(BodyFraming::Chunked),
            (None, false) => Ok(BodyFraming::None),
        }
    }

    /// Attaches the fully-read body bytes. Called by the connection state
    /// machine once `Content-Length` bytes (or the decoded chunked stream)
    /// have been assembled.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        std::str::from_utf8(&self.buf[self.path_start..self.path_end]).unwrap_or("")
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        if self.query_start == 0 && self.query_end == 0 {
            None
        } else {
            std::str::from_utf8(&self.buf[self.query_start..self.query_end]).ok()
        }
    }

    /// Returns a parsed query parameter value by key (`+` decoded as space;
    /// percent-decoding is left to the handler layer, matching the router's
    /// own "percent-encoded bytes are matched as-is" contract).
    pub fn query_param(&self, key: &str) -> Option<String> {
        parse_query_string(self.query_string()?).get(key).cloned()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should be kept alive after this
    /// request. HTTP/1.1 defaults to keep-alive; HTTP/1.0 is not modeled
    /// here (the parser only accepts 1.0/1.1 tokens but does not retain
    /// which one matched past validation — callers needing 1.0 semantics
    /// should inspect the raw buffer's version token directly).
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => !conn.eq_ignore_ascii_case("close"),
            None => true,
        }
    }
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
/// Keys and values have `+` decoded as a space; full percent-decoding is
/// intentionally left to the handler layer.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.replace('+', " ");
            let value = parts.next().unwrap_or("").replace('+', " ");
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &'static [u8]) -> (Request, usize) {
        Request::parse_head(Bytes::from_static(raw)).unwrap()
    }

    #[test]
    fn parse_simple_get() {
        let (req, body_start) = parse(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(body_start, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".len());
    }

    #[test]
    fn parse_query_string() {
        let (req, _) = parse(b"GET /search?q=rust&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_string(), Some("q=rust&page=2"));
        assert_eq!(req.query_param("q"), Some("rust".to_string()));
        assert_eq!(req.query_param("page"), Some("2".to_string()));
    }

    #[test]
    fn incomplete_request() {
        let err = Request::parse_head(Bytes::from_static(b"GET / HTTP/1.1\r\nHost:")).unwrap_err();
        assert_eq!(err, RequestError::Incomplete);
    }

    #[test]
    fn keep_alive_http11_default() {
        let (req, _) = parse(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        assert!(req.is_keep_alive());
    }

    #[test]
    fn connection_close() {
        let (req, _) = parse(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn content_length_framing() {
        let (req, body_start) =
            parse(b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello");
        assert_eq!(req.body_framing().unwrap(), BodyFraming::Length(5));
        let buf = Bytes::from_static(
            b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello",
        );
        assert_eq!(&buf[body_start..], b"hello");
    }

    #[test]
    fn chunked_framing() {
        let (req, _) =
            parse(b"POST / HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert_eq!(req.body_framing().unwrap(), BodyFraming::Chunked);
    }

    #[test]
    fn conflicting_framing_rejected() {
        let err = Request::parse_head(Bytes::from_static(
            b"POST / HTTP/1.1\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\nhello",
        ))
        .unwrap_err();
        assert_eq!(err, RequestError::ConflictingBodyFraming);
    }

    #[test]
    fn invalid_content_length_rejected() {
        let err = Request::parse_head(Bytes::from_static(
            b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n",
        ))
        .unwrap_err();
        assert_eq!(err, RequestError::InvalidContentLength);
    }

    #[test]
    fn with_body_attaches_bytes() {
        let (req, _) = parse(b"GET / HTTP/1.1\r\n\r\n");
        let req = req.with_body(Bytes::from_static(b"payload"));
        assert_eq!(req.body().as_ref(), b"payload");
    }
}
