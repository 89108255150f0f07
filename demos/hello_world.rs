//! A minimal server built on the core: one static route, one param route,
//! one wildcard route, and a streaming response.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_core::Stream;
use hearth_http::{Context, RouteManifestBuilder, Response, Server, ServerConfig, StatusCode};

/// A chunk-by-chunk body producer over a fixed list of strings — stand-in
/// for whatever a real streaming handler (a file read, a generated report)
/// would poll incrementally.
struct Greeting {
    chunks: std::vec::IntoIter<&'static str>,
}

impl Stream for Greeting {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunks.next().map(|chunk| Ok(Bytes::from_static(chunk.as_bytes()))))
    }
}

fn body_stream() -> Greeting {
    Greeting {
        chunks: vec!["Hello", ", ", "streamed ", "world!"].into_iter(),
    }
}

async fn greet(ctx: Context) -> Response {
    let name = ctx.params().get("name").unwrap_or("stranger").to_string();
    Response::new(StatusCode::Ok).body(format!("Hello, {name}!"))
}

async fn catch_all(ctx: Context) -> Response {
    Response::new(StatusCode::Ok).body(format!("you asked for: {}", ctx.request().path()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut manifest = RouteManifestBuilder::new();
    manifest.get("/", |_ctx| async { Response::new(StatusCode::Ok).body("Hello, World!") });
    manifest.get("/hello/:name", greet);
    manifest.get("/stream", |_ctx| async {
        Response::new(StatusCode::Ok).stream(Box::pin(body_stream()))
    });
    manifest.group("/files", |files| {
        files.get("/*path", catch_all);
    });

    let router = manifest.build()?;
    let config = ServerConfig {
        port: 8080,
        ..ServerConfig::default()
    };

    let server = Server::bind(config, router).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        handle.shutdown(Duration::from_secs(10)).await;
    });

    server.run().await?;
    Ok(())
}
