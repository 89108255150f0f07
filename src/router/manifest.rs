//! Declarative route manifest builder — the ergonomic surface applications
//! write against; compiles down to an immutable [`Router`].
//!
//! Handler ids are assigned sequentially in source order. The pseudo-method
//! `ALL` expands into the seven canonical methods (everything but `CONNECT`
//! and `TRACE`) sharing one `handler_id`. Nested [`RouteManifestBuilder::group`]
//! calls concatenate prefixes at construction time, so by the time an entry
//! reaches [`RouteManifestBuilder::build`] its pattern is already fully
//! qualified.

use std::sync::Arc;

use super::{Handler, IntoHandler, Router, RouterError, pattern};
use crate::http::Method;

/// Computes the manifest-level `has_params`/`has_wildcard` flags for a
/// fully-qualified pattern (spec §4.5: "contains `:`"/"contains `*`" after
/// segmenting). An uncompilable pattern reports `(false, false)` here —
/// [`RouteManifestBuilder::build`] is where `invalid_pattern` is actually
/// raised.
fn pattern_flags(pattern: &str) -> (bool, bool) {
    match self::pattern::compile(pattern) {
        Ok(segments) => (
            self::pattern::has_params(&segments),
            self::pattern::has_wildcard(&segments),
        ),
        Err(_) => (false, false),
    }
}

struct ManifestEntry {
    method: Method,
    pattern: String,
    handler_id: u32,
    has_params: bool,
    has_wildcard: bool,
}

/// One route registration as recorded by the manifest builder, exposed for
/// introspection (route listings, debug endpoints) independent of the
/// compiled [`Router`] it's handed off to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub method: Method,
    pub pattern: String,
    pub handler_id: u32,
    pub has_params: bool,
    pub has_wildcard: bool,
}

impl From<&ManifestEntry> for RouteEntry {
    fn from(entry: &ManifestEntry) -> Self {
        Self {
            method: entry.method,
            pattern: entry.pattern.clone(),
            handler_id: entry.handler_id,
            has_params: entry.has_params,
            has_wildcard: entry.has_wildcard,
        }
    }
}

/// Builds a [`Router`] from a declarative sequence of route registrations.
///
/// # Examples
///
/// ```rust,no_run
/// use hearth_http::router::RouteManifestBuilder;
/// use hearth_http::http::{Response, StatusCode};
///
/// let mut manifest = RouteManifestBuilder::new();
/// manifest.get("/ping", |_ctx| async { Response::new(StatusCode::Ok) });
/// manifest.group("/api", |api| {
///     api.get("/users/:id", |_ctx| async { Response::new(StatusCode::Ok) });
/// });
/// let router = manifest.build().unwrap();
/// ```
pub struct RouteManifestBuilder {
    prefix: String,
    entries: Vec<ManifestEntry>,
    handlers: Vec<Handler>,
}

impl Default for RouteManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteManifestBuilder {
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            entries: Vec::new(),
            handlers: Vec::new(),
        }
    }

    fn qualify(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            return path.to_string();
        }
        if path == "/" {
            return self.prefix.clone();
        }
        format!("{}{}", self.prefix, path)
    }

    fn register_one(&mut self, method: Method, path: &str, handler: Handler) -> u32 {
        let handler_id = self.handlers.len() as u32;
        self.handlers.push(handler);
        let pattern = self.qualify(path);
        let (has_params, has_wildcard) = pattern_flags(&pattern);
        self.entries.push(ManifestEntry {
            method,
            pattern,
            handler_id,
            has_params,
            has_wildcard,
        });
        handler_id
    }

    fn erase(handler: impl IntoHandler) -> Handler {
        Arc::new(move |ctx| handler.call(ctx))
    }

    /// Registers a handler for a single method.
    pub fn route(&mut self, method: Method, path: &str, handler: impl IntoHandler) -> &mut Self {
        let handler = Self::erase(handler);
        self.register_one(method, path, handler);
        self
    }

    /// Registers one handler under every canonical method (`GET`, `POST`,
    /// `PUT`, `DELETE`, `PATCH`, `HEAD`, `OPTIONS`) — the `ALL` pseudo-method.
    pub fn all(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        let handler = Self::erase(handler);
        let handler_id = self.handlers.len() as u32;
        self.handlers.push(handler);
        let pattern = self.qualify(path);
        let (has_params, has_wildcard) = pattern_flags(&pattern);
        for method in Method::CANONICAL_SEVEN {
            self.entries.push(ManifestEntry {
                method,
                pattern: pattern.clone(),
                handler_id,
                has_params,
                has_wildcard,
            });
        }
        self
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Get, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Post, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Put, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Delete, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Patch, path, handler)
    }

    pub fn head(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Head, path, handler)
    }

    pub fn options(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Options, path, handler)
    }

    /// Nests a group of routes under `prefix`, string-concatenated with any
    /// enclosing group's prefix.
    pub fn group(&mut self, prefix: &str, build: impl FnOnce(&mut RouteManifestBuilder)) -> &mut Self {
        let mut nested = RouteManifestBuilder {
            prefix: format!("{}{}", self.prefix, prefix),
            entries: Vec::new(),
            handlers: Vec::new(),
        };
        build(&mut nested);

        let id_offset = self.handlers.len() as u32;
        self.handlers.extend(nested.handlers);
        self.entries
            .extend(nested.entries.into_iter().map(|mut e| {
                e.handler_id += id_offset;
                e
            }));
        self
    }

    /// Returns the number of distinct handlers registered so far (routes
    /// sharing a handler via `ALL` count once).
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Returns the number of method+pattern registrations, post `ALL`-expansion.
    pub fn route_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns a snapshot of every registration recorded so far, in manifest
    /// (source) order — for route-listing/debug endpoints built on top of
    /// the core, independent of the compiled [`Router`].
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.entries.iter().map(RouteEntry::from).collect()
    }

    /// Compiles the manifest into an immutable [`Router`]. Fails with
    /// [`RouterError::InvalidPattern`] or [`RouterError::DuplicateRoute`] —
    /// both are treated as fatal server-start errors by [`crate::server::Server`].
    pub fn build(self) -> Result<Router, RouterError> {
        let mut router = Router::empty(self.handlers);
        for entry in self.entries {
            router.insert(entry.method, &entry.pattern, entry.handler_id)?;
        }
        Ok(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::http::StatusCode;

    #[tokio::test]
    async fn simple_get_routes() {
        let mut manifest = RouteManifestBuilder::new();
        manifest.get("/ping", |_ctx| async { Response::new(StatusCode::Ok) });
        let router = manifest.build().unwrap();
        let m = router.find(Method::Get, "/ping");
        assert!(m.found);
        let handler = router.handler(m.handler_id).unwrap().clone();
        let response = (*handler)(make_ctx(Method::Get, "/ping")).await;
        assert_eq!(response.status(), StatusCode::Ok);
    }

    #[test]
    fn all_expands_to_canonical_seven() {
        let mut manifest = RouteManifestBuilder::new();
        manifest.all("/anything", |_ctx| async { Response::new(StatusCode::Ok) });
        assert_eq!(manifest.route_count(), 7);
        assert_eq!(manifest.handler_count(), 1);
        let router = manifest.build().unwrap();
        assert!(router.find(Method::Get, "/anything").found);
        assert!(router.find(Method::Post, "/anything").found);
        assert!(!router.find(Method::Connect, "/anything").found);
        assert!(!router.find(Method::Trace, "/anything").found);
    }

    #[test]
    fn nested_groups_concatenate_prefixes() {
        let mut manifest = RouteManifestBuilder::new();
        manifest.group("/api", |api| {
            api.group("/v1", |v1| {
                v1.get("/users/:id", |_ctx| async { Response::new(StatusCode::Ok) });
            });
        });
        let router = manifest.build().unwrap();
        let m = router.find(Method::Get, "/api/v1/users/42");
        assert!(m.found);
        assert_eq!(m.params, vec![("id".to_string(), "42".to_string())]);
    }

    #[test]
    fn duplicate_route_fails_build() {
        let mut manifest = RouteManifestBuilder::new();
        manifest.get("/users", |_ctx| async { Response::new(StatusCode::Ok) });
        manifest.get("/users", |_ctx| async { Response::new(StatusCode::Created) });
        assert!(manifest.build().is_err());
    }

    #[test]
    fn routes_report_params_and_wildcard_flags() {
        let mut manifest = RouteManifestBuilder::new();
        manifest.get("/users/:id", |_ctx| async { Response::new(StatusCode::Ok) });
        manifest.get("/files/*rest", |_ctx| async { Response::new(StatusCode::Ok) });
        manifest.get("/ping", |_ctx| async { Response::new(StatusCode::Ok) });
        let routes = manifest.routes();
        assert_eq!(routes.len(), 3);
        assert!(routes[0].has_params && !routes[0].has_wildcard);
        assert!(!routes[1].has_params && routes[1].has_wildcard);
        assert!(!routes[2].has_params && !routes[2].has_wildcard);
    }

    fn make_ctx(method: Method, path: &str) -> Context {
        use bytes::Bytes;
        use crate::http::Request;
        let raw = format!("{} {} HTTP/1.1\r\nHost: localhost\r\n\r\n", method, path);
        let (req, _) = Request::parse_head(Bytes::from(raw)).unwrap();
        Context::new(req)
    }
}
