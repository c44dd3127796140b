//! SOCKS5 client
//!
//! Client side of the handshake, used to reach a destination through a
//! SOCKS5 proxy over TCP or UDP.

mod client;
mod datagram;

pub use client::Socks5Client;
pub use datagram::Socks5Datagram;
