//! Server configuration and tunables.

/// TLS materials for the transport layer. The core never terminates TLS
/// itself — decrypted bytes are assumed to already be flowing through the
/// accepted socket — so this struct only carries the paths a thin runtime
/// glue layer would hand to whatever TLS acceptor wraps the listener.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
    pub ca_path: Option<String>,
    pub passphrase: Option<String>,
}

/// Server tunables. Every field has the default the core specifies; callers
/// typically start from [`ServerConfig::default`] and override a handful of
/// fields.
///
/// # Examples
///
/// ```rust
/// use hearth_http::server::ServerConfig;
///
/// let config = ServerConfig {
///     port: 8080,
///     ..ServerConfig::default()
/// };
/// assert_eq!(config.hostname, "0.0.0.0");
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    pub tls: Option<TlsConfig>,
    pub keep_alive_timeout_ms: u64,
    pub max_requests_per_connection: u32,
    pub request_timeout_ms: u64,
    pub max_header_size_bytes: usize,
    pub max_headers_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: "0.0.0.0".to_string(),
            tls: None,
            keep_alive_timeout_ms: 5_000,
            max_requests_per_connection: 100,
            request_timeout_ms: 30_000,
            max_header_size_bytes: 8 * 1024,
            max_headers_count: 64,
        }
    }
}

impl ServerConfig {
    /// The address this configuration binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}
