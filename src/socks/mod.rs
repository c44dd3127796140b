//! SOCKS5 protocol engine
//!
//! Wire codec, the per-connection handshake state machine, and the relays
//! behind CONNECT and UDP ASSOCIATE. Everything here operates on any
//! `AsyncRead + AsyncWrite` stream; the listener lives in [`crate::server`].

mod auth;
pub mod consts;
mod handler;
pub mod packet;
mod reply;
mod resolver;
mod tcp_relay;
mod types;
mod udp;

pub use auth::{select_method, AuthMethod, Credential, Credentials};
pub use handler::{
    serve_connection, ConnectionInfo, Handshake, HandshakeConfig, HandshakeState, Request,
    SessionContext,
};
pub use reply::{send_failure, send_reply};
pub use resolver::{Resolver, SystemResolver};
pub use tcp_relay::{handle_connect, relay_tcp};
pub use types::{SocksCommand, TargetAddr};
pub use udp::{handle_udp_associate, AssociationId, NatTable};
