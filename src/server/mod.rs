//! Async TCP server wiring: accepts connections, hands each one to the
//! connection state machine in [`connection`], and exposes a [`ServerHandle`]
//! for graceful shutdown.

pub mod config;
pub mod connection;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

pub use config::{ServerConfig, TlsConfig};

use crate::context::SocketInfo;
use crate::router::Router;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// State shared between [`Server::run`] and every [`ServerHandle`] cloned
/// from it — the connection registry and the accept/drain signaling.
struct Shared {
    draining: Arc<AtomicBool>,
    stopped: AtomicBool,
    connection_count: AtomicU64,
    next_connection_id: AtomicU64,
    stop_accept: Notify,
    drained: Notify,
    connections: Mutex<HashMap<u64, AbortHandle>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            draining: Arc::new(AtomicBool::new(false)),
            stopped: AtomicBool::new(false),
            connection_count: AtomicU64::new(0),
            next_connection_id: AtomicU64::new(0),
            stop_accept: Notify::new(),
            drained: Notify::new(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn reserve_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, id: u64, abort: AbortHandle) {
        self.connections.lock().unwrap().insert(id, abort);
        self.connection_count.fetch_add(1, Ordering::Relaxed);
    }

    fn unregister(&self, id: u64) {
        self.connections.lock().unwrap().remove(&id);
        let remaining = self.connection_count.fetch_sub(1, Ordering::Relaxed) - 1;
        if remaining == 0 && self.draining.load(Ordering::Relaxed) {
            // `notify_one`, not `notify_waiters`: `shutdown` may not have
            // started waiting yet (it does other work first), and
            // `notify_waiters` only wakes tasks already polling — it would
            // silently drop this signal. `notify_one` stores a permit for
            // whichever `notified().await` comes next.
            self.drained.notify_one();
        }
    }

    fn abort_all(&self) {
        for (_, handle) in self.connections.lock().unwrap().drain() {
            handle.abort();
        }
    }
}

/// The HTTP/1.1 request-handling core's server loop.
///
/// Binds a TCP listener and dispatches every accepted connection through the
/// compiled [`Router`] according to [`ServerConfig`]'s tunables. TLS
/// termination, if any, is assumed to have already happened upstream of the
/// accepted socket — `config.tls` is carried but never acted on here.
///
/// # Examples
///
/// ```rust,no_run
/// use hearth_http::{RouteManifestBuilder, Response, StatusCode, Server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut manifest = RouteManifestBuilder::new();
///     manifest.get("/", |_ctx| async { Response::new(StatusCode::Ok).body("Hello, World!") });
///
///     let server = Server::bind(ServerConfig::default(), manifest.build()?).await?;
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Arc<Router>,
    config: Arc<ServerConfig>,
    shared: Arc<Shared>,
}

impl Server {
    /// Binds to `config.bind_address()` and compiles the router into a
    /// runnable server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(config: ServerConfig, router: Router) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            router: Arc::new(router),
            config: Arc::new(config),
            shared: Arc::new(Shared::new()),
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a [`ServerHandle`] for graceful shutdown. Must be obtained
    /// before [`Server::run`] is called, since `run` consumes the server.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs the accept loop until [`ServerHandle::stop`] or
    /// [`ServerHandle::shutdown`] is called on a handle obtained from this
    /// server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the listener itself fails outside of a
    /// per-connection accept error (which is logged and retried).
    pub async fn run(self) -> Result<(), ServerError> {
        info!(address = %self.local_addr, "hearth-http listening");

        loop {
            tokio::select! {
                biased;
                _ = self.shared.stop_accept.notified() => {
                    debug!("accept loop stopping");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };

                    if self.shared.stopped.load(Ordering::Relaxed) {
                        break;
                    }

                    debug!(peer = %peer_addr, "connection accepted");
                    let socket_info = SocketInfo {
                        local_addr: self.local_addr,
                        remote_addr: peer_addr,
                    };
                    let router = Arc::clone(&self.router);
                    let config = Arc::clone(&self.config);
                    let draining = Arc::clone(&self.shared.draining);
                    let shared = Arc::clone(&self.shared);
                    let id = shared.reserve_id();

                    let join_handle = tokio::spawn(async move {
                        if let Err(e) = connection::handle(stream, socket_info, router, config, draining).await {
                            warn!(peer = %peer_addr, error = %e, "connection closed with error");
                        }
                        shared.unregister(id);
                    });
                    self.shared.register(id, join_handle.abort_handle());
                }
            }
        }

        Ok(())
    }
}

/// A cloneable handle to a running [`Server`], for stopping or gracefully
/// draining it from outside the task running [`Server::run`].
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
}

impl ServerHandle {
    /// Stops accepting new connections and immediately aborts every
    /// in-flight connection task.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Relaxed);
        // `notify_one`, not `notify_waiters`: the accept loop's task may not
        // have been scheduled yet (e.g. called right after `tokio::spawn`),
        // in which case nothing is waiting and `notify_waiters` would be a
        // no-op. `notify_one` stores a permit the accept loop's next
        // `notified().await` consumes immediately.
        self.shared.stop_accept.notify_one();
        self.shared.abort_all();
    }

    /// Stops accepting new connections, marks every in-flight connection to
    /// close after its current response, and waits for the connection
    /// registry to drain or `timeout` to elapse — whichever comes first.
    /// Any connections still open once the deadline passes are aborted.
    pub async fn shutdown(&self, timeout: Duration) {
        self.shared.draining.store(true, Ordering::Relaxed);
        // `notify_one`, not `notify_waiters`: the accept loop's task may not
        // have been scheduled yet (e.g. called right after `tokio::spawn`),
        // in which case nothing is waiting and `notify_waiters` would be a
        // no-op. `notify_one` stores a permit the accept loop's next
        // `notified().await` consumes immediately.
        self.shared.stop_accept.notify_one();

        if self.shared.connection_count.load(Ordering::Relaxed) == 0 {
            self.shared.stopped.store(true, Ordering::Relaxed);
            return;
        }

        let drained = self.shared.drained.notified();
        if tokio::time::timeout(timeout, drained).await.is_err() {
            warn!("graceful shutdown deadline elapsed — aborting remaining connections");
        }

        self.shared.stopped.store(true, Ordering::Relaxed);
        self.shared.abort_all();
    }

    /// The number of connections currently registered (accepted and not yet
    /// closed).
    pub fn connections(&self) -> u64 {
        self.shared.connection_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Response, StatusCode};
    use crate::router::manifest::RouteManifestBuilder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn test_server() -> (Server, ServerHandle) {
        let mut manifest = RouteManifestBuilder::new();
        manifest.get("/ping", |_ctx| async { Response::new(StatusCode::Ok).body("pong") });
        let router = manifest.build().unwrap();
        let config = ServerConfig {
            port: 0,
            hostname: "127.0.0.1".to_string(),
            ..ServerConfig::default()
        };
        let server = Server::bind(config, router).await.unwrap();
        let handle = server.handle();
        (server, handle)
    }

    #[tokio::test]
    async fn serves_requests_over_a_real_socket() {
        let (server, _handle) = test_server().await;
        let addr = server.local_addr();
        tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert!(String::from_utf8_lossy(&out).starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn connections_reports_live_count() {
        let (server, handle) = test_server().await;
        let addr = server.local_addr();
        tokio::spawn(server.run());

        assert_eq!(handle.connections(), 0);
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();

        // give the accept loop a beat to register the connection
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.connections(), 1);
        drop(stream);
    }

    #[tokio::test]
    async fn shutdown_with_no_connections_returns_immediately() {
        let (server, handle) = test_server().await;
        tokio::spawn(server.run());
        tokio::time::timeout(Duration::from_millis(100), handle.shutdown(Duration::from_secs(5)))
            .await
            .expect("shutdown with no open connections should not block");
    }

    #[tokio::test]
    async fn stop_rejects_further_accepts() {
        let (server, handle) = test_server().await;
        let addr = server.local_addr();
        let run_task = tokio::spawn(server.run());
        handle.stop();
        let _ = run_task.await;
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
