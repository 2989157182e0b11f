//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forward_proxy::cache::NEVER_CACHED;
use forward_proxy::config::ProxyConfig;
use forward_proxy::lifecycle::Shutdown;
use forward_proxy::net::listener::Listener;
use forward_proxy::security::PolicyStore;
use forward_proxy::ProxyServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const ORIGIN_BODY: &str = "<html>cached page</html>";

/// A mock origin server that records every request it receives.
pub struct MockOrigin {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl MockOrigin {
    /// Replies 200 to unconditional requests and 304 to everything else.
    pub async fn conditional() -> Self {
        Self::start(|request| {
            if request.contains(&format!("If-Modified-Since: {}", NEVER_CACHED)) {
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    ORIGIN_BODY.len(),
                    ORIGIN_BODY
                )
            } else {
                "HTTP/1.1 304 Not Modified\r\nConnection: close\r\n\r\n".to_string()
            }
        })
        .await
    }

    /// Start a mock origin on an ephemeral port, answering with `respond`.
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let respond = Arc::new(respond);

        let recorded = Arc::clone(&requests);
        let counter = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let recorded = Arc::clone(&recorded);
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let request = read_request(&mut socket).await;
                    let reply = respond(&request);
                    recorded.lock().unwrap().push(request);
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            addr,
            requests,
            connections,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Read one request header block (through the blank line).
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// A running proxy bound to an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestProxy {
    pub async fn start(config: ProxyConfig, policy: PolicyStore) -> Self {
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listener = Listener::from_tcp(tcp, None).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();

        let server = ProxyServer::new(&config, policy);
        let handle = tokio::spawn(server.run(listener, receiver));

        Self {
            addr,
            shutdown,
            handle,
        }
    }

    /// Send `request` and read the reply until the proxy closes the connection.
    pub async fn exchange(&self, request: &str) -> Vec<u8> {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        if !request.is_empty() {
            stream.write_all(request.as_bytes()).await.unwrap();
        }
        let mut reply = Vec::new();
        with_timeout(stream.read_to_end(&mut reply)).await.unwrap();
        reply
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        with_timeout(self.handle).await.unwrap().unwrap();
    }
}

/// A GET through the proxy for `path` on the origin at `port`.
pub fn proxy_request(host: &str, port: u16, path: &str) -> String {
    format!(
        "GET http://{host}:{port}{path} HTTP/1.1\r\nHost: {host}:{port}\r\nUser-Agent: test\r\n\r\n"
    )
}

/// Fail the test instead of hanging.
pub async fn with_timeout<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("operation timed out")
}
