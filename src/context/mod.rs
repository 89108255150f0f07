//! Per-request context — the handler-facing view of an in-flight request:
//! matched path parameters, type-safe extensions, and convenience accessors
//! over the underlying [`Request`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::Request;

/// Type-erased request extensions map — used to inject per-request state
/// into handlers without requiring handlers to know about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create a new empty extensions map
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a value into the extensions map
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a value from the extensions map
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Get a mutable reference to a value from the extensions map
    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Remove a value from the extensions map
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Path parameters extracted from the matched route.
#[derive(Default, Debug, Clone)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a value into the parameters map
    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a value from the parameters map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|value| value.as_str())
    }

    /// Get a mutable reference to a value from the parameters map
    pub fn get_mut(&mut self, key: &str) -> Option<&mut str> {
        self.map.get_mut(key).map(|value| value.as_mut())
    }

    /// Remove a value from the parameters map
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// Remote/local address hints for the connection a request arrived on.
#[derive(Debug, Clone, Copy)]
pub struct SocketInfo {
    pub local_addr: SocketAddr,
    pub remote_addr: SocketAddr,
}

/// Per-request context handed to every handler: the parsed request, its
/// matched path parameters, and a type-erased extensions map for
/// request-scoped state injected by middleware built on top of the handler
/// contract.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use hearth_http::context::{Context, Parameters};
/// use hearth_http::http::Request;
///
/// let (req, _) = Request::parse_head(Bytes::from_static(
///     b"GET /users/42 HTTP/1.1\r\nHost: x\r\n\r\n",
/// ))
/// .unwrap();
///
/// let mut params = Parameters::new();
/// params.insert("id".to_string(), "42".to_string());
///
/// let ctx = Context::new(req).with_params(params);
/// assert_eq!(ctx.params().get("id"), Some("42"));
/// ```
pub struct Context {
    request: Request,
    params: Parameters,
    extensions: Extensions,
    socket_info: Option<SocketInfo>,
}

impl Context {
    /// Create a new context from a request, with no captured parameters and
    /// no socket info (tests and direct handler calls that don't go through
    /// the connection state machine commonly start here).
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: Parameters::new(),
            extensions: Extensions::new(),
            socket_info: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Parameters) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_socket_info(mut self, socket_info: SocketInfo) -> Self {
        self.socket_info = Some(socket_info);
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// The raw, unparsed query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.request.query_string()
    }

    /// The request body, buffered in RAM up to whatever limit an upstream
    /// body-size policy enforces.
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Remote/local address hints for the connection this request arrived
    /// on; `None` for contexts built outside the connection state machine.
    pub fn socket_info(&self) -> Option<SocketInfo> {
        self.socket_info
    }

    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn make_request() -> Request {
        let (req, _) = Request::parse_head(Bytes::from_static(
            b"GET /users/42?active=true HTTP/1.1\r\nHost: x\r\n\r\n",
        ))
        .unwrap();
        req
    }

    #[test]
    fn params_roundtrip() {
        let mut params = Parameters::new();
        params.insert("id".to_string(), "42".to_string());
        let ctx = Context::new(make_request()).with_params(params);
        assert_eq!(ctx.params().get("id"), Some("42"));
        assert_eq!(ctx.params().get("missing"), None);
    }

    #[test]
    fn query_passthrough() {
        let ctx = Context::new(make_request());
        assert_eq!(ctx.query(), Some("active=true"));
    }

    #[test]
    fn extensions_type_erased_storage() {
        #[derive(PartialEq, Debug)]
        struct UserId(u64);

        let mut ctx = Context::new(make_request());
        ctx.extensions_mut().insert(UserId(7));
        assert_eq!(ctx.extensions().get::<UserId>(), Some(&UserId(7)));
    }

    #[test]
    fn socket_info_defaults_to_none() {
        let ctx = Context::new(make_request());
        assert!(ctx.socket_info().is_none());
    }

    #[test]
    fn json_body_deserializes() {
        let (req, _) = Request::parse_head(Bytes::from_static(
            b"POST /x HTTP/1.1\r\nHost: x\r\nContent-Length: 9\r\n\r\n{\"n\": 42}",
        ))
        .unwrap();
        let req = req.with_body(Bytes::from_static(b"{\"n\": 42}"));
        let ctx = Context::new(req);
        let value: serde_json::Value = ctx.json().unwrap();
        assert_eq!(value["n"], 42);
    }
}
