//! Request routing — a radix trie mapping HTTP method + URL pattern to a
//! dense `handler_id`, with deterministic static > param > wildcard priority.
//!
//! Three pattern styles are supported:
//!
//! | Pattern              | Example match              | Captured params              |
//! |----------------------|----------------------------|------------------------------|
//! | `/users`             | `/users`                   | *(none)*                     |
//! | `/users/:id`         | `/users/42`                | `id → "42"`                  |
//! | `/files/*rest`       | `/files/docs/readme.txt`   | `rest → "docs/readme.txt"`   |
//!
//! The trie is built once (via [`manifest::RouteManifestBuilder`]) and is
//! read-only for the lifetime of the server — no locking is needed to query it.

pub mod manifest;
pub mod pattern;

pub use manifest::RouteManifestBuilder;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::context::{Context, Parameters};
use crate::http::Method;
use crate::http::Response;
use pattern::{PatternError, Segment};

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared across
/// threads without copying the underlying closure. In practice you never construct this
/// type directly — use [`manifest::RouteManifestBuilder`]'s method-specific helpers instead.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below, so builder methods can accept `impl IntoHandler` without repeating the
/// two-type-parameter where-bound at every call site.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

/// Errors raised while building a router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },
    #[error("duplicate route: {method} {pattern:?} conflicts with an existing registration")]
    DuplicateRoute { method: Method, pattern: String },
}

/// The outcome of [`Router::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub found: bool,
    pub handler_id: u32,
    /// Captured parameters in declaration order (static > param > wildcard
    /// already resolved — this is the path actually taken through the trie).
    pub params: Vec<(String, String)>,
}

impl RouteMatch {
    fn miss() -> Self {
        Self {
            found: false,
            handler_id: 0,
            params: Vec::new(),
        }
    }

    /// Collapses the ordered capture list into a [`Parameters`] map for
    /// handing to a [`Context`].
    pub fn into_parameters(self) -> Parameters {
        let mut params = Parameters::new();
        for (name, value) in self.params {
            params.insert(name, value);
        }
        params
    }
}

/// Per-node trie structure. Note that `param_child`/`wildcard_child` carry no
/// parameter name: a single node position is shared by every route that
/// passes through it (e.g. `/users/:id/posts` and `/users/:name/comments`
/// share one `param_child` under `/users`), so the *name* a capture is bound
/// under cannot live on the node — it depends on which terminal route is
/// ultimately matched. Names are instead recorded per `handler_id` in
/// [`Router::param_names`] at insert time and resolved against the
/// positional capture list built during [`TrieNode::find`].
#[derive(Debug, Default)]
struct TrieNode {
    static_children: HashMap<u8, Vec<(String, Box<TrieNode>)>>,
    param_child: Option<Box<TrieNode>>,
    wildcard_child: Option<Box<TrieNode>>,
    terminal: Option<u32>,
}

impl TrieNode {
    fn insert(
        &mut self,
        segments: &[Segment],
        method: Method,
        pattern: &str,
        handler_id: u32,
    ) -> Result<(), RouterError> {
        let Some((head, rest)) = segments.split_first() else {
            if self.terminal.is_some() {
                return Err(RouterError::DuplicateRoute {
                    method,
                    pattern: pattern.to_string(),
                });
            }
            self.terminal = Some(handler_id);
            return Ok(());
        };

        match head {
            Segment::Static(literal) => {
                let key = literal.as_bytes().first().copied().unwrap_or(0);
                let bucket = self.static_children.entry(key).or_default();
                if let Some((_, child)) = bucket.iter_mut().find(|(lit, _)| lit == literal) {
                    child.insert(rest, method, pattern, handler_id)
                } else {
                    let mut child = TrieNode::default();
                    child.insert(rest, method, pattern, handler_id)?;
                    bucket.push((literal.clone(), Box::new(child)));
                    Ok(())
                }
            }
            Segment::Param(_) => {
                let child = self.param_child.get_or_insert_with(Default::default);
                child.insert(rest, method, pattern, handler_id)
            }
            Segment::Wildcard(_) => match &mut self.wildcard_child {
                Some(child) => {
                    if child.terminal.is_some() {
                        return Err(RouterError::DuplicateRoute {
                            method,
                            pattern: pattern.to_string(),
                        });
                    }
                    child.terminal = Some(handler_id);
                    Ok(())
                }
                None => {
                    let mut child = TrieNode::default();
                    child.terminal = Some(handler_id);
                    self.wildcard_child = Some(Box::new(child));
                    Ok(())
                }
            },
        }
    }

    /// Descends the trie, preferring static > param > wildcard at every node,
    /// bounded to one ordered pass per level (the three classes are disjoint).
    /// `captured` accumulates the raw, positional capture values (no names
    /// attached yet — the caller resolves names once the matched
    /// `handler_id`'s declared parameter names are known).
    fn find(&self, segments: &[&str], captured: &mut Vec<String>) -> Option<u32> {
        let Some((head, rest)) = segments.split_first() else {
            return self.terminal;
        };

        if let Some(bucket) = self
            .static_children
            .get(&head.as_bytes().first().copied().unwrap_or(0))
        {
            for (literal, child) in bucket {
                if literal == head {
                    if let Some(id) = child.find(rest, captured) {
                        return Some(id);
                    }
                }
            }
        }

        if let Some(child) = &self.param_child {
            captured.push((*head).to_string());
            if let Some(id) = child.find(rest, captured) {
                return Some(id);
            }
            captured.pop();
        }

        if let Some(child) = &self.wildcard_child {
            let remainder = segments.join("/");
            captured.push(remainder);
            if let Some(id) = child.terminal {
                return Some(id);
            }
            captured.pop();
        }

        None
    }
}

fn path_segments(path: &str) -> Vec<&str> {
    if path == "/" {
        return Vec::new();
    }
    path.strip_prefix('/').unwrap_or(path).split('/').collect()
}

/// An immutable, compiled radix-trie router: one trie per HTTP method,
/// constructed once (via [`manifest::RouteManifestBuilder`]) and shared
/// without locking for the lifetime of the server.
pub struct Router {
    tries: [TrieNode; 9],
    handlers: Vec<Handler>,
    /// Declared parameter/wildcard names for each `handler_id`, in segment
    /// declaration order — the "side-table" spec §3 describes, mapping a
    /// route's positional captures to the names its handler expects. Indexed
    /// by `handler_id`; a route with no `:name`/`*name` segments has an empty
    /// entry here.
    param_names: Vec<Vec<String>>,
}

impl Router {
    fn empty(handlers: Vec<Handler>) -> Self {
        let param_names = vec![Vec::new(); handlers.len()];
        Self {
            tries: Default::default(),
            handlers,
            param_names,
        }
    }

    fn insert(&mut self, method: Method, pattern: &str, handler_id: u32) -> Result<(), RouterError> {
        let segments =
            pattern::compile(pattern).map_err(|source| RouterError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        let names: Vec<String> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) | Segment::Wildcard(name) => Some(name.clone()),
                Segment::Static(_) => None,
            })
            .collect();
        self.tries[method.code() as usize].insert(&segments, method, pattern, handler_id)?;
        self.param_names[handler_id as usize] = names;
        Ok(())
    }

    /// Matches `method` and `path` against the compiled trie. Captures are
    /// collected positionally during the descent, then zipped against the
    /// matched `handler_id`'s declared parameter names — so two routes
    /// sharing trie structure up to a `:param`/`*wildcard` position (e.g.
    /// `/users/:id/posts` and `/users/:name/comments`) each bind their
    /// capture under their own declared name rather than whichever name was
    /// inserted first.
    pub fn find(&self, method: Method, path: &str) -> RouteMatch {
        let segments = path_segments(path);
        let mut captured = Vec::new();
        match self.tries[method.code() as usize].find(&segments, &mut captured) {
            Some(handler_id) => {
                let names = self.param_names.get(handler_id as usize);
                let params = match names {
                    Some(names) => names
                        .iter()
                        .cloned()
                        .zip(captured)
                        .collect::<Vec<(String, String)>>(),
                    None => Vec::new(),
                };
                RouteMatch {
                    found: true,
                    handler_id,
                    params,
                }
            }
            None => RouteMatch::miss(),
        }
    }

    /// Returns every method under which `path` matches some registered
    /// route, ignoring the requested method — used to build the `Allow`
    /// header of a `405 Method Not Allowed` response.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let segments = path_segments(path);
        Method::ALL
            .into_iter()
            .filter(|m| {
                let mut captured = Vec::new();
                self.tries[m.code() as usize].find(&segments, &mut captured).is_some()
            })
            .collect()
    }

    /// Looks up the handler for a `handler_id` produced by [`Router::find`].
    pub fn handler(&self, handler_id: u32) -> Option<&Handler> {
        self.handlers.get(handler_id as usize)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
