//! Client handshake
//!
//! Negotiates with a proxy, authenticates if asked to, and issues one relay
//! request per connection.

use super::datagram::Socks5Datagram;
use crate::error::{ReplyCode, Socks5Error};
use crate::socks::consts::*;
use crate::socks::packet::{
    AuthRequest, AuthResponse, Codec, NegotiateRequest, NegotiateResponse, RelayRequest,
    RelayResponse,
};
use crate::socks::{SocksCommand, TargetAddr};
use crate::transport::TcpDialer;
use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;

/// Methods offered to every proxy, no-auth first
const OFFERED_METHODS: [u8; 2] = [SOCKS5_AUTH_METHOD_NONE, SOCKS5_AUTH_METHOD_PASSWORD];

/// SOCKS5 client for one proxy
#[derive(Debug, Clone)]
pub struct Socks5Client {
    proxy: SocketAddr,
    credentials: Option<(String, String)>,
    timeout: Duration,
    codec: Codec,
}

impl Socks5Client {
    /// Create a client for the proxy at `proxy`
    pub fn new(proxy: SocketAddr) -> Self {
        Socks5Client {
            proxy,
            credentials: None,
            timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            codec: Codec::default(),
        }
    }

    /// Credentials to send if the proxy picks username/password
    ///
    /// Without them an empty username and password are sent.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Bound on dialing the proxy and on each handshake reply
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Proxy address
    pub fn proxy_addr(&self) -> SocketAddr {
        self.proxy
    }

    /// Open a TCP connection to `target` through the proxy
    pub async fn connect(&self, target: &TargetAddr) -> Result<TcpStream, Socks5Error> {
        let mut stream = self.dial_proxy().await?;
        let bound = self
            .handshake(&mut stream, SocksCommand::Connect, target)
            .await?;
        debug!("Proxy {} connected to {} from {}", self.proxy, target, bound);
        Ok(stream)
    }

    /// Open a UDP association through the proxy
    ///
    /// `expected` is the address the client expects to send from; use
    /// `TargetAddr::default()` if unknown. The returned datagram socket keeps
    /// the control connection open for as long as it lives.
    pub async fn udp_associate(&self, expected: &TargetAddr) -> Result<Socks5Datagram, Socks5Error> {
        let mut control = self.dial_proxy().await?;
        let local_ip = control.local_addr()?.ip();
        let socket = UdpSocket::bind(SocketAddr::new(local_ip, 0)).await?;

        let bound = self
            .handshake(&mut control, SocksCommand::UdpAssociate, expected)
            .await?;
        let relay = match bound {
            TargetAddr::Ip(addr) if addr.ip().is_unspecified() => {
                SocketAddr::new(self.proxy.ip(), addr.port())
            }
            TargetAddr::Ip(addr) => addr,
            TargetAddr::Domain(host, port) => {
                return Err(Socks5Error::InvalidAddress(format!(
                    "relay address {}:{} is not an IP address",
                    host, port
                )))
            }
        };

        socket.connect(relay).await?;
        debug!("UDP association through {} relays via {}", self.proxy, relay);
        Ok(Socks5Datagram::new(control, socket, relay, self.codec.clone()))
    }

    async fn dial_proxy(&self) -> Result<TcpStream, Socks5Error> {
        TcpDialer::with_defaults()
            .with_connect_timeout(self.timeout)
            .dial(self.proxy)
            .await
    }

    /// Run the client handshake and return the bound address from the reply
    pub(crate) async fn handshake<S>(
        &self,
        stream: &mut S,
        command: SocksCommand,
        target: &TargetAddr,
    ) -> Result<TargetAddr, Socks5Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let codec = &self.codec;
        let offered = OFFERED_METHODS;

        let mut negotiate = codec.message::<NegotiateRequest>();
        negotiate.methods.extend_from_slice(&offered);
        codec.write(stream, &*negotiate).await?;
        negotiate.release();

        let chosen = codec
            .read::<NegotiateResponse, _>(stream, self.timeout)
            .await?;
        check_version(SOCKS5_VERSION, chosen.version)?;
        let method = chosen.method;
        chosen.release();

        if !offered.contains(&method) {
            return Err(Socks5Error::UnsupportedMethod(method));
        }
        if method == SOCKS5_AUTH_METHOD_PASSWORD {
            self.authenticate(stream).await?;
        }

        let mut request = codec.message::<RelayRequest>();
        request.command = command.to_byte();
        request.addr = target.clone();
        codec.write(stream, &*request).await?;
        request.release();

        let mut response = codec
            .read::<RelayResponse, _>(stream, self.timeout)
            .await?;
        check_version(SOCKS5_VERSION, response.version)?;
        if response.reply != ReplyCode::Succeeded {
            return Err(Socks5Error::RequestFailed(response.reply));
        }
        Ok(std::mem::take(&mut response.addr))
    }

    async fn authenticate<S>(&self, stream: &mut S) -> Result<(), Socks5Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let codec = &self.codec;
        let mut req = codec.message::<AuthRequest>();
        if let Some((username, password)) = &self.credentials {
            req.username.extend_from_slice(username.as_bytes());
            req.password.extend_from_slice(password.as_bytes());
        }
        codec.write(stream, &*req).await?;
        req.release();

        let resp = codec.read::<AuthResponse, _>(stream, self.timeout).await?;
        check_version(SOCKS5_AUTH_VERSION, resp.version)?;
        if resp.is_success() {
            Ok(())
        } else {
            Err(Socks5Error::AuthFailure)
        }
    }
}

fn check_version(expected: u8, actual: u8) -> Result<(), Socks5Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Socks5Error::VersionMismatch { expected, actual })
    }
}

impl From<SocketAddrV4> for Socks5Client {
    fn from(addr: SocketAddrV4) -> Self {
        Socks5Client::new(addr.into())
    }
}

impl From<SocketAddrV6> for Socks5Client {
    fn from(addr: SocketAddrV6) -> Self {
        Socks5Client::new(addr.into())
    }
}
