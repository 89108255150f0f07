//! The per-connection state machine: `Reading → Parsing → Dispatch → Writing
//! → (Idle | Closing)`, driving one keep-alive-aware HTTP/1.1 connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::context::{Context, SocketInfo};
use crate::error::Fault;
use crate::http::body::Body;
use crate::http::parser::MAX_HEADERS;
use crate::http::request::{BodyFraming, Request, RequestError};
use crate::http::response::{final_chunk, frame_chunk};
use crate::http::{Method, Response, StatusCode};
use crate::router::Router;
use crate::util::parse_chunk_size;

use super::config::ServerConfig;

const INITIAL_BUF_SIZE: usize = 4096;

/// The connection's current phase. Tracked explicitly (rather than implied
/// purely by control flow) so the read loop's tracing spans and the
/// request/idle timers always agree on what the connection is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reading,
    Parsing,
    Dispatch,
    Writing,
    Idle,
    Closing,
}

/// Drives one TCP connection's full lifetime: repeatedly reads requests,
/// dispatches them through `router`, and writes responses, until the peer
/// closes the socket, keep-alive is declined, or the server is draining.
///
/// Generic over the stream type so the state machine can be exercised in
/// tests against an in-memory duplex pipe instead of a real `TcpStream`.
pub async fn handle<S>(
    mut stream: S,
    socket_info: SocketInfo,
    router: Arc<Router>,
    config: Arc<ServerConfig>,
    draining: Arc<AtomicBool>,
) -> Result<(), std::io::Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);
    let mut requests_served: u32 = 0;
    let request_timeout = Duration::from_millis(config.request_timeout_ms);
    let idle_timeout = Duration::from_millis(config.keep_alive_timeout_ms);

    loop {
        let mut phase = Phase::Reading;
        // Only an already-served connection waiting in Idle honors the
        // keep-alive idle timer; the first request on a fresh connection
        // waits indefinitely for its first byte.
        let idle_deadline = (requests_served > 0).then_some(idle_timeout);

        let head = match read_request_head(&mut stream, &mut buf, &config, idle_deadline).await? {
            Some(head) => head,
            None => {
                tracing::debug!(peer = %socket_info.remote_addr, "connection closed by peer");
                return Ok(());
            }
        };

        let request = match head {
            Ok(request) => request,
            Err(fault) => {
                phase = Phase::Closing;
                tracing::warn!(peer = %socket_info.remote_addr, ?phase, error = %fault, "rejecting request");
                write_fault(&mut stream, &fault).await?;
                return Ok(());
            }
        };

        phase = Phase::Parsing;
        let framing = request.body_framing().map_err(Fault::from);
        let outcome = match framing {
            Ok(framing) => read_body(&mut stream, &mut buf, request, framing, request_timeout).await,
            Err(fault) => Err(fault),
        };

        let request = match outcome {
            Ok(request) => request,
            Err(fault) => {
                phase = Phase::Closing;
                write_fault(&mut stream, &fault).await?;
                return Ok(());
            }
        };

        phase = Phase::Dispatch;
        let method = request.method();
        let path = request.path().to_string();
        let is_head = method == Method::Head;
        let mut keep_alive = request.is_keep_alive();

        let route_match = router.find(method, &path);
        let response = if route_match.found {
            match router.handler(route_match.handler_id).cloned() {
                Some(handler) => {
                    let params = route_match.into_parameters();
                    let ctx = Context::new(request)
                        .with_params(params)
                        .with_socket_info(socket_info.clone());
                    match tokio::time::timeout(request_timeout, (*handler)(ctx)).await {
                        Ok(response) => response,
                        Err(_) => {
                            phase = Phase::Closing;
                            write_fault(&mut stream, &Fault::RequestTimeout).await?;
                            return Ok(());
                        }
                    }
                }
                None => Response::new(StatusCode::InternalServerError).body("handler missing"),
            }
        } else {
            let allowed = router.allowed_methods(&path);
            if allowed.is_empty() {
                Response::new(StatusCode::NotFound).body("Not Found")
            } else {
                let allow_header = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                Response::new(StatusCode::MethodNotAllowed)
                    .header("Allow", allow_header)
                    .body("Method Not Allowed")
            }
        };

        requests_served += 1;
        if requests_served >= config.max_requests_per_connection {
            keep_alive = false;
        }
        if draining.load(Ordering::Relaxed) {
            keep_alive = false;
        }

        phase = Phase::Writing;
        write_response(&mut stream, response.keep_alive(keep_alive), is_head).await?;

        if !keep_alive {
            phase = Phase::Closing;
            tracing::debug!(peer = %socket_info.remote_addr, ?phase, "closing after response");
            return Ok(());
        }

        phase = Phase::Idle;
        tracing::trace!(peer = %socket_info.remote_addr, ?phase, requests_served, "awaiting next request");
    }
}

/// Reads from the stream until a complete request head is buffered, the
/// peer closes the connection, or the optional idle deadline elapses.
/// Returns `Ok(None)` on a clean peer close with no partial request pending.
///
/// On success, `buf` has already had the head bytes `split_to`'d off its
/// front — whatever remains in `buf` (possibly nothing) is body bytes read
/// ahead of schedule, starting at index 0, ready for [`read_body`].
async fn read_request_head<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    config: &ServerConfig,
    idle_deadline: Option<Duration>,
) -> Result<Option<Result<Request, Fault>>, std::io::Error>
where
    S: AsyncRead + Unpin,
{
    loop {
        match crate::http::parser::parse_head(
            &buf[..],
            config.max_header_size_bytes,
            config.max_headers_count.min(MAX_HEADERS),
        ) {
            Ok(crate::http::parser::ParseOutcome::Complete(result)) => {
                let body_start = result.body_start;
                let head_bytes = buf.split_to(body_start).freeze();
                return match Request::from_parse_result_bytes(head_bytes, &result) {
                    Ok(request) => Ok(Some(Ok(request))),
                    Err(e) => Ok(Some(Err(Fault::from(e)))),
                };
            }
            Ok(crate::http::parser::ParseOutcome::Incomplete) => {
                if buf.len() > config.max_header_size_bytes {
                    return Ok(Some(Err(Fault::HeadersTooLarge)));
                }
            }
            Err(e) => return Ok(Some(Err(Fault::from(e)))),
        }

        let n = match idle_deadline {
            Some(deadline) => match tokio::time::timeout(deadline, stream.read_buf(buf)).await {
                Ok(result) => result?,
                Err(_) => return Ok(None),
            },
            None => stream.read_buf(buf).await?,
        };

        if n == 0 {
            return Ok(None);
        }
    }
}

/// Reads whatever additional bytes are needed to complete the request body
/// per its framing, returning the request with the body attached. `buf` is
/// assumed to already start exactly at the first body byte (the head has
/// been `split_to`'d off by [`read_request_head`]).
async fn read_body<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    request: Request,
    framing: BodyFraming,
    deadline: Duration,
) -> Result<Request, Fault>
where
    S: AsyncRead + Unpin,
{
    let body = tokio::time::timeout(deadline, async {
        loop {
            match try_complete_body(buf, framing) {
                BodyProgress::Complete { consumed, chunked_body } => {
                    let body = match chunked_body {
                        Some(b) => {
                            buf.advance(consumed);
                            b
                        }
                        None => buf.split_to(consumed).freeze(),
                    };
                    return Ok(body);
                }
                BodyProgress::Incomplete => {
                    let n = stream.read_buf(buf).await.map_err(|_| Fault::ConnectionReset)?;
                    if n == 0 {
                        return Err(Fault::ConnectionReset);
                    }
                }
                BodyProgress::Malformed => {
                    return Err(Fault::MalformedFraming(RequestError::InvalidContentLength));
                }
            }
        }
    })
    .await
    .map_err(|_| Fault::RequestTimeout)??;

    Ok(request.with_body(body))
}

enum BodyProgress {
    Complete {
        consumed: usize,
        /// `Some` for chunked bodies (reassembled out-of-line since chunk
        /// payloads are not contiguous in the wire buffer); `None` for
        /// `Content-Length`/absent bodies, whose content is a zero-copy
        /// slice of `buf[..consumed]` the caller derives itself.
        chunked_body: Option<Bytes>,
    },
    Incomplete,
    Malformed,
}

fn try_complete_body(buf: &[u8], framing: BodyFraming) -> BodyProgress {
    match framing {
        BodyFraming::None => BodyProgress::Complete {
            consumed: 0,
            chunked_body: None,
        },
        BodyFraming::Length(n) => {
            let need = n as usize;
            if buf.len() < need {
                BodyProgress::Incomplete
            } else {
                BodyProgress::Complete {
                    consumed: need,
                    chunked_body: None,
                }
            }
        }
        BodyFraming::Chunked => decode_chunked(buf),
    }
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\r\n")
}

fn decode_chunked(buf: &[u8]) -> BodyProgress {
    let mut out = BytesMut::new();
    let mut pos = 0usize;

    loop {
        let Some(rel) = find_crlf(&buf[pos..]) else {
            return BodyProgress::Incomplete;
        };
        let line_end = pos + rel;
        let Ok(size_line) = std::str::from_utf8(&buf[pos..line_end]) else {
            return BodyProgress::Malformed;
        };
        let Some(size) = parse_chunk_size(size_line) else {
            return BodyProgress::Malformed;
        };

        let chunk_start = line_end + 2;
        if size == 0 {
            let term_end = chunk_start + 2;
            if buf.len() < term_end {
                return BodyProgress::Incomplete;
            }
            if &buf[chunk_start..term_end] != b"\r\n" {
                return BodyProgress::Malformed;
            }
            return BodyProgress::Complete {
                consumed: term_end,
                chunked_body: Some(out.freeze()),
            };
        }

        let chunk_end = chunk_start + size as usize;
        let needed = chunk_end + 2;
        if buf.len() < needed {
            return BodyProgress::Incomplete;
        }
        if &buf[chunk_end..needed] != b"\r\n" {
            return BodyProgress::Malformed;
        }
        out.extend_from_slice(&buf[chunk_start..chunk_end]);
        pos = needed;
    }
}

async fn write_response<S>(stream: &mut S, response: Response, suppress_body: bool) -> Result<(), std::io::Error>
where
    S: AsyncWrite + Unpin,
{
    let (head, body) = response.into_head_and_body(suppress_body);
    stream.write_all(&head).await?;
    match body {
        Body::Absent => {}
        Body::Bytes(b) => stream.write_all(&b).await?,
        Body::Stream(mut s) => {
            use futures_core::Stream as _;
            use std::pin::Pin;
            loop {
                let next = std::future::poll_fn(|cx| Pin::new(&mut s).poll_next(cx)).await;
                match next {
                    Some(Ok(chunk)) => stream.write_all(&frame_chunk(&chunk)).await?,
                    Some(Err(_)) => break,
                    None => {
                        stream.write_all(&final_chunk()).await?;
                        break;
                    }
                }
            }
        }
    }
    stream.flush().await
}

async fn write_fault<S>(stream: &mut S, fault: &Fault) -> Result<(), std::io::Error>
where
    S: AsyncWrite + Unpin,
{
    let mut response = Response::new(fault.status_code()).body(fault.to_string());
    if let Fault::MethodNotAllowed { allowed } = fault {
        let allow_header = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
        response = response.header("Allow", allow_header);
    }
    write_response(stream, response.keep_alive(false), false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn local_socket_info() -> SocketInfo {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        SocketInfo {
            local_addr: addr,
            remote_addr: addr,
        }
    }

    fn test_router() -> Arc<Router> {
        use crate::router::manifest::RouteManifestBuilder;
        let mut manifest = RouteManifestBuilder::new();
        manifest.get("/ping", |_ctx| async { Response::new(StatusCode::Ok).body("pong") });
        manifest.post("/echo", |ctx: Context| async move {
            Response::new(StatusCode::Ok).body(ctx.request().body().clone())
        });
        Arc::new(manifest.build().unwrap())
    }

    #[tokio::test]
    async fn serves_one_request_then_closes_on_connection_close_header() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let router = test_router();
        let config = Arc::new(ServerConfig::default());
        let draining = Arc::new(AtomicBool::new(false));

        let handle_task = tokio::spawn(handle(server_side, local_socket_info(), router, config, draining));

        client
            .write_all(b"GET /ping HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        let response = String::from_utf8_lossy(&out);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.ends_with("pong"));

        handle_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn not_found_path_returns_404() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let router = test_router();
        let config = Arc::new(ServerConfig::default());
        let draining = Arc::new(AtomicBool::new(false));

        tokio::spawn(handle(server_side, local_socket_info(), router, config, draining));

        client
            .write_all(b"GET /missing HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(String::from_utf8_lossy(&out).starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn method_mismatch_returns_405_with_allow_header() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let router = test_router();
        let config = Arc::new(ServerConfig::default());
        let draining = Arc::new(AtomicBool::new(false));

        tokio::spawn(handle(server_side, local_socket_info(), router, config, draining));

        client
            .write_all(b"DELETE /ping HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        let response = String::from_utf8_lossy(&out);
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(response.contains("Allow: GET\r\n"));
    }

    #[tokio::test]
    async fn two_requests_on_one_connection_both_served() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let router = test_router();
        let config = Arc::new(ServerConfig::default());
        let draining = Arc::new(AtomicBool::new(false));

        tokio::spawn(handle(server_side, local_socket_info(), router, config, draining));

        client
            .write_all(b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\nGET /ping HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out).matches("HTTP/1.1 200 OK").count(), 2);
    }

    #[tokio::test]
    async fn content_length_body_delivered_to_handler() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let router = test_router();
        let config = Arc::new(ServerConfig::default());
        let draining = Arc::new(AtomicBool::new(false));

        tokio::spawn(handle(server_side, local_socket_info(), router, config, draining));

        client
            .write_all(b"POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 3\r\nConnection: close\r\n\r\nabc")
            .await
            .unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        let response = String::from_utf8_lossy(&out);
        assert!(response.ends_with("abc"));
    }

    #[tokio::test]
    async fn chunked_body_decoded() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let router = test_router();
        let config = Arc::new(ServerConfig::default());
        let draining = Arc::new(AtomicBool::new(false));

        tokio::spawn(handle(server_side, local_socket_info(), router, config, draining));

        client
            .write_all(
                b"POST /echo HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
            )
            .await
            .unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        let response = String::from_utf8_lossy(&out);
        assert!(response.ends_with("Wikipedia"));
    }
}
