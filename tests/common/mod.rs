//! Test utilities for Socksrelay
//!
//! Shared helpers for integration tests: a server on an ephemeral port and
//! echo destinations for TCP and UDP.

#![allow(dead_code)]

use socksrelay::socks::{Credential, HandshakeConfig, SessionContext};
use socksrelay::Socks5Server;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast;

/// Running server and the handle that stops it
pub struct TestServer {
    pub addr: SocketAddr,
    pub ctx: SessionContext,
    shutdown_tx: broadcast::Sender<bool>,
}

impl TestServer {
    /// Stop accepting connections
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Test configuration builder
pub struct TestConfigBuilder {
    config: HandshakeConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        TestConfigBuilder {
            config: HandshakeConfig {
                udp_bind_ip: Some("127.0.0.1".parse().unwrap()),
                handshake_timeout: Duration::from_secs(2),
                connect_timeout: Duration::from_secs(2),
                relay_linger: Duration::from_millis(500),
                ..Default::default()
            },
        }
    }
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Require username/password authentication for `username`
    pub fn user(mut self, username: &str, password: &str) -> Self {
        self.config.methods = vec![0x02];
        self.config.credentials.push(Credential::new(username, password));
        self
    }

    /// Set allow UDP
    pub fn allow_udp(mut self, allow: bool) -> Self {
        self.config.allow_udp = allow;
        self
    }

    /// Set the NAT idle timeout
    pub fn udp_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.udp_idle_timeout = timeout;
        self
    }

    /// Build the handshake configuration
    pub fn build(self) -> HandshakeConfig {
        self.config
    }

    /// Start a server with this configuration
    pub async fn start(self) -> TestServer {
        start_server(self.build()).await
    }
}

/// Start a server on an ephemeral loopback port
pub async fn start_server(config: HandshakeConfig) -> TestServer {
    start_with_context(SessionContext::new(config)).await
}

/// Start a server sharing an existing session context
pub async fn start_with_context(ctx: SessionContext) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = Socks5Server::from_parts(listener, ctx.clone());
    let addr = server.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(server.run(shutdown_rx));

    TestServer {
        addr,
        ctx,
        shutdown_tx,
    }
}

/// TCP server that echoes every connection back to itself
pub async fn spawn_tcp_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    addr
}

/// UDP server that echoes every datagram to its sender
pub async fn spawn_udp_echo() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        while let Ok((n, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..n], from).await;
        }
    });

    addr
}

/// Poll `check` until it holds or `limit` passes
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
