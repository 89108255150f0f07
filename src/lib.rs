//! # hearth-http
//!
//! An embeddable HTTP/1.1 request-handling core: a zero-copy parser, a
//! radix-trie router, and a keep-alive-aware connection state machine.
//! Everything above the wire — middleware, TLS termination, configuration
//! loading — is left to the embedding runtime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearth_http::{RouteManifestBuilder, Response, StatusCode, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut manifest = RouteManifestBuilder::new();
//!     manifest.get("/", |_ctx| async { Response::new(StatusCode::Ok).body("Hello, World!") });
//!
//!     let server = Server::bind(ServerConfig::default(), manifest.build()?).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod error;
pub mod http;
pub mod router;
pub mod server;
pub mod util;

pub use context::Context;
pub use error::Fault;
pub use http::{Body, Headers, Method, Request, Response, StatusCode};
pub use router::{RouteManifestBuilder, Router, RouterError};
pub use server::{Server, ServerConfig, ServerError, ServerHandle};
