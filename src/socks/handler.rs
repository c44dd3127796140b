//! Main SOCKS5 handler
//!
//! Drives one accepted connection through negotiation, optional
//! username/password authentication, and the relay request, then hands the
//! stream to the CONNECT or UDP ASSOCIATE relay.
//!
//! # Protocol Flow
//!
//! ```text
//! Init -> Negotiating -> [Authenticating] -> AwaitingRequest -> Relaying -> Closed
//! ```
//!
//! Messages within a handshake are strictly sequential. Any handshake error
//! ends the connection; no stage is retried.

use super::auth::{select_method, AuthMethod, Credentials};
use super::consts::*;
use super::packet::{
    AuthRequest, AuthResponse, Codec, NegotiateRequest, NegotiateResponse, RelayRequest,
};
use super::reply::send_reply;
use super::resolver::{Resolver, SystemResolver};
use super::tcp_relay::handle_connect;
use super::types::{SocksCommand, TargetAddr};
use super::udp::{handle_udp_associate, NatTable};
use crate::error::{ReplyCode, Socks5Error};
use crate::transport::{SocketOpts, TcpDialer};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Where a connection is in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing read yet
    Init,
    /// Reading the method negotiation
    Negotiating,
    /// Running username/password sub-negotiation
    Authenticating,
    /// Waiting for the relay request
    AwaitingRequest,
    /// Handed off to a relay
    Relaying,
    /// Finished
    Closed,
}

/// Settings the handshake and relays run with
///
/// Built by the caller (usually from [`crate::config::ServerConfig`]) and
/// shared read-only by every connection.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Accepted methods, most preferred first
    pub methods: Vec<u8>,
    /// Credentials for username/password authentication
    pub credentials: Credentials,
    /// Whether UDP ASSOCIATE is served
    pub allow_udp: bool,
    /// Local IP for association listeners; the control connection's local IP if unset
    pub udp_bind_ip: Option<IpAddr>,
    /// Maximum wait for one complete control message
    pub handshake_timeout: Duration,
    /// Bound on dialing a CONNECT destination
    pub connect_timeout: Duration,
    /// NAT entry idle deadline
    pub udp_idle_timeout: Duration,
    /// Time a splice keeps draining after one side reaches EOF
    pub relay_linger: Duration,
    /// Options applied to dialed streams
    pub socket_opts: SocketOpts,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        HandshakeConfig {
            methods: vec![SOCKS5_AUTH_METHOD_NONE],
            credentials: Credentials::new(),
            allow_udp: true,
            udp_bind_ip: None,
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            udp_idle_timeout: Duration::from_secs(DEFAULT_UDP_IDLE_TIMEOUT_SECS),
            relay_linger: Duration::from_secs(DEFAULT_RELAY_LINGER_SECS),
            socket_opts: SocketOpts::default(),
        }
    }
}

/// Everything a connection needs that outlives it
///
/// Cloning is cheap; all sessions share the same pools and NAT table.
#[derive(Clone)]
pub struct SessionContext {
    /// Handshake and relay settings
    pub config: Arc<HandshakeConfig>,
    /// Message codec and its pools
    pub codec: Codec,
    /// NAT table shared by all UDP associations
    pub nat: NatTable,
    /// Domain name resolver
    pub resolver: Arc<dyn Resolver>,
    /// Dialer for CONNECT destinations
    pub dialer: TcpDialer,
}

impl SessionContext {
    /// Create a context with fresh pools, an empty NAT table, and the system resolver
    pub fn new(config: HandshakeConfig) -> Self {
        let codec = Codec::default();
        let nat = NatTable::new(config.udp_idle_timeout, codec.clone());
        let dialer = TcpDialer::with_defaults()
            .with_socket_opts(config.socket_opts.clone())
            .with_connect_timeout(config.connect_timeout);
        SessionContext {
            config: Arc::new(config),
            codec,
            nat,
            resolver: Arc::new(SystemResolver),
            dialer,
        }
    }

    /// Use a different resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .finish()
    }
}

/// Addresses of an accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Client address
    pub peer: SocketAddr,
    /// Local address the client connected to
    pub local: SocketAddr,
}

/// A validated relay request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Requested command
    pub command: SocksCommand,
    /// Destination address
    pub addr: TargetAddr,
}

/// Server-side handshake over one stream
pub struct Handshake<'a, S> {
    stream: S,
    ctx: &'a SessionContext,
    state: HandshakeState,
}

impl<'a, S> Handshake<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Start a handshake on `stream`
    pub fn new(stream: S, ctx: &'a SessionContext) -> Self {
        Handshake {
            stream,
            ctx,
            state: HandshakeState::Init,
        }
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Give the stream back
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn wait(&self) -> Duration {
        self.ctx.config.handshake_timeout
    }

    /// Read the method negotiation and answer it
    pub async fn negotiate(&mut self) -> Result<AuthMethod, Socks5Error> {
        self.state = HandshakeState::Negotiating;
        let wait = self.wait();
        let codec = &self.ctx.codec;

        let req = codec
            .read::<NegotiateRequest, _>(&mut self.stream, wait)
            .await?;
        if req.version != SOCKS5_VERSION {
            return Err(Socks5Error::VersionMismatch {
                expected: SOCKS5_VERSION,
                actual: req.version,
            });
        }

        let chosen = select_method(&req.methods, &self.ctx.config.methods);
        req.release();

        let mut resp = codec.message::<NegotiateResponse>();
        match AuthMethod::from_byte(chosen) {
            Some(method) => {
                resp.method = chosen;
                codec.write(&mut self.stream, &*resp).await?;
                debug!("Negotiated authentication method: {}", method);
                Ok(method)
            }
            None => {
                resp.method = SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE;
                codec.write(&mut self.stream, &*resp).await?;
                warn!("No acceptable authentication method ({:#04x})", chosen);
                Err(Socks5Error::UnsupportedMethod(chosen))
            }
        }
    }

    /// Run username/password sub-negotiation
    pub async fn authenticate(&mut self) -> Result<(), Socks5Error> {
        self.state = HandshakeState::Authenticating;
        let wait = self.wait();
        let codec = &self.ctx.codec;

        let req = codec
            .read::<AuthRequest, _>(&mut self.stream, wait)
            .await?;
        if req.version != SOCKS5_AUTH_VERSION {
            return Err(Socks5Error::VersionMismatch {
                expected: SOCKS5_AUTH_VERSION,
                actual: req.version,
            });
        }

        let accepted = self
            .ctx
            .config
            .credentials
            .verify(&req.username, &req.password);

        let mut resp = codec.message::<AuthResponse>();
        resp.status = if accepted {
            SOCKS5_AUTH_SUCCESS
        } else {
            SOCKS5_AUTH_FAILURE
        };
        codec.write(&mut self.stream, &*resp).await?;

        if accepted {
            info!("User {} authenticated", req.username_lossy());
            Ok(())
        } else {
            warn!("Authentication failed for user {}", req.username_lossy());
            Err(Socks5Error::AuthFailure)
        }
    }

    /// Read the relay request
    ///
    /// Unknown commands and address types are answered with the matching
    /// failure reply before the error is returned.
    pub async fn read_request(&mut self) -> Result<Request, Socks5Error> {
        self.state = HandshakeState::AwaitingRequest;
        let wait = self.wait();
        let codec = &self.ctx.codec;

        let mut req = match codec
            .read::<RelayRequest, _>(&mut self.stream, wait)
            .await
        {
            Ok(req) => req,
            Err(Socks5Error::UnsupportedAddressType(atyp)) => {
                warn!("Unsupported address type: {:#04x}", atyp);
                send_reply(codec, &mut self.stream, ReplyCode::AddressTypeNotSupported, None)
                    .await?;
                return Err(Socks5Error::UnsupportedAddressType(atyp));
            }
            Err(e) => return Err(e),
        };

        if req.version != SOCKS5_VERSION {
            return Err(Socks5Error::VersionMismatch {
                expected: SOCKS5_VERSION,
                actual: req.version,
            });
        }

        let Some(command) = SocksCommand::from_byte(req.command) else {
            warn!("Unknown command: {:#04x}", req.command);
            send_reply(codec, &mut self.stream, ReplyCode::CommandNotSupported, None).await?;
            return Err(Socks5Error::UnsupportedCommand(req.command));
        };

        Ok(Request {
            command,
            addr: std::mem::take(&mut req.addr),
        })
    }

    /// Negotiate, authenticate if required, and read the request
    pub async fn run(&mut self) -> Result<Request, Socks5Error> {
        let method = self.negotiate().await?;
        if method == AuthMethod::Password {
            self.authenticate().await?;
        }
        self.read_request().await
    }

    /// Execute `request`, consuming the handshake
    pub async fn dispatch(mut self, request: Request, info: ConnectionInfo) -> Result<(), Socks5Error> {
        self.state = HandshakeState::Relaying;
        let ctx = self.ctx;

        info!("SOCKS5 {} request to {}", request.command, request.addr);

        match request.command {
            SocksCommand::Connect => {
                handle_connect(self.stream, &request.addr, ctx).await?;
            }
            SocksCommand::UdpAssociate if ctx.config.allow_udp => {
                handle_udp_associate(self.stream, request.addr, &info, ctx).await?;
            }
            SocksCommand::UdpAssociate | SocksCommand::Bind => {
                warn!("{} command not supported", request.command);
                send_reply(&ctx.codec, &mut self.stream, ReplyCode::CommandNotSupported, None)
                    .await?;
                return Err(Socks5Error::UnsupportedCommand(request.command.to_byte()));
            }
        }

        Ok(())
    }
}

/// Handle SOCKS5 protocol on an accepted stream
///
/// Runs the full handshake and the requested relay. Returns when the relay
/// ends or the first error occurs.
pub async fn serve_connection<S>(
    stream: S,
    info: ConnectionInfo,
    ctx: &SessionContext,
) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut handshake = Handshake::new(stream, ctx);
    let request = handshake.run().await?;
    handshake.dispatch(request, info).await
}
