//! The polymorphic response/request body type.
//!
//! A tagged variant rather than an inheritance hierarchy, per the "no cyclic
//! ownership / no virtual dispatch where an enum will do" design note: the
//! serializer matches on [`Body`] directly instead of calling through a
//! trait object for the common cases.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;

/// A boxed, type-erased producer of body chunks for streaming responses.
/// Each item is one chunk to frame and write; an `Err` aborts the stream and
/// the connection (a half-written chunked body cannot be un-sent).
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// A request or response body.
///
/// - `Absent` — no body at all (e.g. a 204, or a GET request).
/// - `Bytes` — a finite, already-buffered body; the serializer computes
///   `Content-Length` from its length.
/// - `Stream` — a lazy chunk producer; the serializer frames it as
///   `Transfer-Encoding: chunked`.
pub enum Body {
    Absent,
    Bytes(Bytes),
    Stream(BodyStream),
}

impl Body {
    /// Returns the body's length if it is known ahead of serialization
    /// (i.e. not a stream).
    pub fn known_len(&self) -> Option<usize> {
        match self {
            Body::Absent => Some(0),
            Body::Bytes(b) => Some(b.len()),
            Body::Stream(_) => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Absent => f.write_str("Body::Absent"),
            Body::Bytes(b) => f.debug_tuple("Body::Bytes").field(&b.len()).finish(),
            Body::Stream(_) => f.write_str("Body::Stream(..)"),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Absent
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        if b.is_empty() {
            Body::Absent
        } else {
            Body::Bytes(b)
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Body::from(Bytes::from(v))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::from(Bytes::from(s))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::from(Bytes::from_static(s.as_bytes()))
    }
}
