//! # Socksrelay - SOCKS5 proxy server and client
//!
//! Socksrelay implements the SOCKS5 protocol (RFC 1928) with username/password
//! authentication (RFC 1929). It serves CONNECT and UDP ASSOCIATE, and ships
//! a matching client.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksrelay::config::load_config;
//! use socksrelay::server::Socks5Server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     Socks5Server::bind(&config.server).await?.run(shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! accept -> negotiate -> [authenticate] -> request -> CONNECT splice
//!                                                  -> UDP ASSOCIATE bridge + NAT table
//! ```
//!
//! Control messages and datagrams are decoded into pooled buffers and pooled
//! message values, so the steady-state relay path does not allocate.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod error;
pub mod pool;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use client::{Socks5Client, Socks5Datagram};
pub use config::{load_config, Config};
pub use error::{ReplyCode, Socks5Error, SocksRelayError};
pub use server::Socks5Server;

/// Version of the Socksrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "socksrelay");
    }
}
