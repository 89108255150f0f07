//! The error taxonomy connecting internal failures to their HTTP surface.
//!
//! Each [`Fault`] variant corresponds to one row of the core's error table:
//! a place parsing, framing, routing, or dispatch can fail, together with
//! the status code and close-vs-keep-alive decision the connection state
//! machine applies when it surfaces the fault to the wire.

use thiserror::Error;

use crate::http::StatusCode;
use crate::http::parser::ParseError;
use crate::http::request::RequestError;
use crate::router::RouterError;

/// A fault raised anywhere in the request-handling core.
#[derive(Debug, Error)]
pub enum Fault {
    /// The request head is not valid HTTP/1.1. Surfaces as `400`, closes
    /// the connection.
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] ParseError),

    /// `Content-Length`/chunked framing is invalid or self-contradictory.
    /// Surfaces as `400`, closes the connection.
    #[error("malformed request framing: {0}")]
    MalformedFraming(RequestError),

    /// The read buffer exceeded `max_header_size_bytes` before the header
    /// terminator was found. Surfaces as `431`, closes the connection.
    #[error("request header fields too large")]
    HeadersTooLarge,

    /// The request deadline elapsed. Surfaces as `408` if no response had
    /// started, otherwise the socket is aborted mid-response.
    #[error("request timed out")]
    RequestTimeout,

    /// An upstream body-limit policy rejected the payload. Surfaces as `413`.
    #[error("payload too large")]
    PayloadTooLarge,

    /// No route matched `(method, path)`. Surfaces as `404`, connection
    /// stays alive.
    #[error("route not found")]
    RouteNotFound,

    /// The path matched under a different method. Surfaces as `405` with
    /// an `Allow` header listing the methods that do match.
    #[error("method not allowed")]
    MethodNotAllowed { allowed: Vec<crate::http::Method> },

    /// The handler panicked or returned an error. Surfaces as `500`; the
    /// connection is closed out of caution if the exception happened
    /// mid-body.
    #[error("handler exception: {0}")]
    HandlerException(String),

    /// A route pattern was rejected, or conflicted with an existing one, at
    /// manifest build time. Fatal at server start.
    #[error("route manifest error: {0}")]
    InvalidPattern(#[from] RouterError),

    /// The socket was reset by the peer. Dropped silently, no response
    /// is attempted.
    #[error("connection reset")]
    ConnectionReset,
}

impl Fault {
    /// The status code this fault is surfaced as, when a response can
    /// still be written (`connection_reset` and mid-body timeouts bypass
    /// this — the socket is simply closed).
    pub fn status_code(&self) -> StatusCode {
        match self {
            Fault::MalformedRequest(_) | Fault::MalformedFraming(_) => StatusCode::BadRequest,
            Fault::HeadersTooLarge => StatusCode::RequestHeaderFieldsTooLarge,
            Fault::RequestTimeout => StatusCode::RequestTimeout,
            Fault::PayloadTooLarge => StatusCode::PayloadTooLarge,
            Fault::RouteNotFound => StatusCode::NotFound,
            Fault::MethodNotAllowed { .. } => StatusCode::MethodNotAllowed,
            Fault::HandlerException(_) => StatusCode::InternalServerError,
            Fault::InvalidPattern(_) => StatusCode::InternalServerError,
            Fault::ConnectionReset => StatusCode::InternalServerError,
        }
    }

    /// Whether the connection must be closed after this fault is surfaced.
    /// Route misses and method-mismatches are the only faults that keep
    /// the connection alive.
    pub fn closes_connection(&self) -> bool {
        !matches!(self, Fault::RouteNotFound | Fault::MethodNotAllowed { .. })
    }
}

impl From<RequestError> for Fault {
    fn from(err: RequestError) -> Self {
        Fault::MalformedFraming(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_not_found_keeps_connection_alive() {
        assert!(!Fault::RouteNotFound.closes_connection());
        assert_eq!(Fault::RouteNotFound.status_code(), StatusCode::NotFound);
    }

    #[test]
    fn malformed_request_closes() {
        let fault = Fault::MalformedRequest(ParseError::InvalidMethod);
        assert!(fault.closes_connection());
        assert_eq!(fault.status_code(), StatusCode::BadRequest);
    }

    #[test]
    fn headers_too_large_maps_to_431() {
        assert_eq!(
            Fault::HeadersTooLarge.status_code(),
            StatusCode::RequestHeaderFieldsTooLarge
        );
    }

    #[test]
    fn method_not_allowed_carries_allowed_list() {
        let fault = Fault::MethodNotAllowed {
            allowed: vec![crate::http::Method::Get, crate::http::Method::Post],
        };
        assert_eq!(fault.status_code(), StatusCode::MethodNotAllowed);
        assert!(!fault.closes_connection());
    }
}
