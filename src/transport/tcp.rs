//! TCP dialer
//!
//! Plain TCP connections with a bounded connect time.

use super::SocketOpts;
use crate::error::Socks5Error;
use crate::socks::consts::DEFAULT_CONNECT_TIMEOUT_SECS;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Dials TCP destinations with a timeout and applies socket options
#[derive(Debug, Clone)]
pub struct TcpDialer {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
    /// Connection timeout
    connect_timeout: Duration,
}

impl TcpDialer {
    /// Create a new dialer with default options
    pub fn with_defaults() -> Self {
        TcpDialer {
            socket_opts: SocketOpts::default(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connection timeout in effect
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Connect to `addr`
    ///
    /// Fails with [`Socks5Error::Timeout`] if the connection is not
    /// established within the connect timeout, or [`Socks5Error::Dial`]
    /// carrying the transport error.
    pub async fn dial(&self, addr: SocketAddr) -> Result<TcpStream, Socks5Error> {
        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(Socks5Error::Dial {
                    target: addr.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(Socks5Error::Timeout(format!(
                    "connection to {} not established within {:?}",
                    addr, self.connect_timeout
                )))
            }
        };

        self.socket_opts.hint(&stream);
        debug!("TCP connection established to {}", addr);

        Ok(stream)
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplyCode;
    use tokio::net::TcpListener;

    #[test]
    fn test_tcp_dialer_with_defaults() {
        let dialer = TcpDialer::with_defaults();
        assert!(dialer.socket_opts.nodelay);
        assert_eq!(dialer.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_tcp_dialer_builders() {
        let opts = SocketOpts {
            nodelay: false,
            keepalive_secs: Some(60),
            keepalive_interval: Some(20),
        };
        let dialer = TcpDialer::with_defaults()
            .with_socket_opts(opts.clone())
            .with_connect_timeout(Duration::from_secs(30));
        assert_eq!(dialer.socket_opts, opts);
        assert_eq!(dialer.connect_timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_tcp_dialer_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = TcpDialer::with_defaults().dial(addr).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn test_tcp_dialer_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = TcpDialer::with_defaults()
            .with_connect_timeout(Duration::from_secs(2))
            .dial(addr)
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::Dial { .. }));
        assert_eq!(ReplyCode::from(&err), ReplyCode::ConnectionRefused);
    }
}
