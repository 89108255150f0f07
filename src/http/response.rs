//! HTTP/1.1 response builder and wire serializer.
//!
//! Serialization is split in two: [`Response::into_head_and_body`] produces
//! the status line + headers (always buffered — it's small), and the body
//! is either appended directly (finite [`Body::Bytes`]) or streamed chunk by
//! chunk by the connection state machine (lazy [`Body::Stream`]).

use bytes::{BufMut, Bytes, BytesMut};

use super::{Body, Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use hearth_http::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// assert_eq!(response.status(), StatusCode::Ok);
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an absent body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::Absent,
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are
    /// additive (e.g. repeated `Set-Cookie`).
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place, for callers that already own a `Response`
    /// and want to decorate it without consuming it.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets a finite body from anything convertible into [`Body`] (`&str`,
    /// `String`, `Vec<u8>`, `Bytes`).
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a lazy, chunked body from a byte-chunk stream.
    #[must_use]
    pub fn stream(mut self, stream: super::BodyStream) -> Self {
        self.body = Body::Stream(stream);
        self
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn body_ref(&self) -> &Body {
        &self.body
    }

    /// Splits the response into its wire-ready head (status line + headers +
    /// terminating CRLF, with framing headers filled in) and the body it
    /// carries. The connection writer writes the head, then the body
    /// according to its framing.
    ///
    /// `suppress_body` implements the `HEAD` wire contract: headers are
    /// computed exactly as for the equivalent `GET`, but no body bytes are
    /// ever written, regardless of what the handler produced.
    pub fn into_head_and_body(mut self, suppress_body: bool) -> (BytesMut, Body) {
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        self.headers.insert("Connection", connection);

        match &self.body {
            Body::Absent => {
                if !self.headers.contains("content-length") {
                    self.headers.insert("Content-Length", "0");
                }
            }
            Body::Bytes(b) => {
                if !self.headers.contains("content-type") {
                    self.headers
                        .insert("Content-Type", "text/plain; charset=utf-8");
                }
                if !self.headers.contains("content-length") {
                    self.headers.insert("Content-Length", b.len().to_string());
                }
            }
            Body::Stream(_) => {
                if !self.headers.contains("content-type") {
                    self.headers
                        .insert("Content-Type", "application/octet-stream");
                }
                if !self.headers.contains("transfer-encoding") {
                    self.headers.insert("Transfer-Encoding", "chunked");
                }
            }
        }

        let estimated = 64 + self.headers.len() * 48;
        let mut head = BytesMut::with_capacity(estimated);
        head.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );
        for (name, value) in self.headers.iter() {
            head.put(format!("{name}: {value}\r\n").as_bytes());
        }
        head.put(&b"\r\n"[..]);

        let body = if suppress_body { Body::Absent } else { self.body };
        (head, body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

/// Frames one chunk of a chunked-transfer body: `hex-size CRLF bytes CRLF`.
pub fn frame_chunk(chunk: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(chunk.len() + 16);
    out.put(format!("{:x}\r\n", chunk.len()).as_bytes());
    out.put(chunk);
    out.put(&b"\r\n"[..]);
    out
}

/// The terminating `0 CRLF CRLF` chunk that ends a chunked-transfer body.
pub fn final_chunk() -> Bytes {
    Bytes::from_static(b"0\r\n\r\n")
}
