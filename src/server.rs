//! SOCKS5 server
//!
//! Accepts TCP connections and runs one handshake task per connection.

use crate::config::ServerConfig;
use crate::socks::consts::ACCEPT_ERROR_BACKOFF_MS;
use crate::socks::{serve_connection, ConnectionInfo, SessionContext};
use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, Instrument};

/// SOCKS5 server bound to a listening socket
pub struct Socks5Server {
    listener: TcpListener,
    ctx: SessionContext,
}

impl Socks5Server {
    /// Bind the configured listen address
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let handshake = config.to_handshake_config()?;
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

        Ok(Self::from_parts(listener, SessionContext::new(handshake)))
    }

    /// Serve an already bound listener with an existing context
    pub fn from_parts(listener: TcpListener, ctx: SessionContext) -> Self {
        Socks5Server { listener, ctx }
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .with_context(|| "Failed to get listener address")
    }

    /// Shared session context
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Accept connections until shutdown
    ///
    /// Per-connection errors are logged and never stop the listener.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!("SOCKS5 server listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            accept_failed(&e).await;
                            continue;
                        }
                    };

                    let local = match stream.local_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get local address for {}: {}", peer, e);
                            continue;
                        }
                    };
                    self.ctx.config.socket_opts.hint(&stream);

                    let ctx = self.ctx.clone();
                    let info = ConnectionInfo { peer, local };
                    tokio::spawn(
                        async move {
                            debug!("Connection accepted");
                            match serve_connection(stream, info, &ctx).await {
                                Ok(()) => debug!("Connection closed"),
                                Err(e) => debug!("Connection ended: {}", e),
                            }
                        }
                        .instrument(info_span!("conn", %peer)),
                    );
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Log a failed accept and pause so persistent errors (EMFILE) do not spin
async fn accept_failed(e: &io::Error) {
    error!("Failed to accept connection: {}", e);
    tokio::time::sleep(Duration::from_millis(ACCEPT_ERROR_BACKOFF_MS)).await;
}
