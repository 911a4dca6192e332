//! Shared utilities for integration testing.

use std::net::SocketAddr;

use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use caching_proxy::config::ProxyConfig;
use caching_proxy::http::HttpServer;

/// Start an axum router as a mock upstream on an ephemeral port.
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Default proxy config pointing at `target`.
pub fn proxy_config(target: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.target_url = format!("http://{}", target);
    config
}

/// Start the proxy on an ephemeral port and return its address.
pub async fn spawn_proxy(config: ProxyConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });
    addr
}

/// Start a raw-socket upstream that answers every request with a chunked
/// response carrying trailers, the shape axum handlers cannot produce.
#[allow(dead_code)]
pub async fn spawn_trailer_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                if read_request_head(&mut socket).await.is_none() {
                    return;
                }
                let response = "HTTP/1.1 200 OK\r\n\
                    Trailer: AtEnd1, AtEnd2\r\n\
                    Content-Type: text/plain\r\n\
                    Connection: close\r\n\
                    Transfer-Encoding: chunked\r\n\
                    \r\n\
                    5\r\nhello\r\n\
                    0\r\n\
                    AtEnd1: value 1\r\n\
                    AtEnd2: value 2\r\n\
                    \r\n";
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Issue a GET over a raw socket and return the full response bytes as text,
/// trailers included (HTTP clients rarely expose them).
#[allow(dead_code)]
pub async fn raw_get(addr: SocketAddr, path: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: proxy.test\r\nConnection: close\r\n\r\n",
        path
    );
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut out = Vec::new();
    socket.read_to_end(&mut out).await.unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

async fn read_request_head(socket: &mut TcpStream) -> Option<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        head.extend_from_slice(&buf[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            return Some(());
        }
    }
}
