//! Domain name resolution
//!
//! The protocol engine only needs one address per domain name. The trait
//! lets tests and embedders substitute their own lookup.

use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;

/// Resolves a domain name to a single socket address
#[async_trait]
pub trait Resolver: Send + Sync + Debug {
    /// Look up `host` and return the first address found, with `port` applied
    async fn resolve(&self, host: &str, port: u16) -> io::Result<SocketAddr>;
}

/// Resolver backed by the operating system (`getaddrinfo` via tokio)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<SocketAddr> {
        tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("No addresses found for domain: {}", host),
                )
            })
    }
}
