//! SOCKS5 type definitions
//!
//! Defines the command enumeration and the address value shared by the
//! codec, the relay layer, and the client.

use super::consts::*;
use super::packet::FrameLen;
use super::resolver::Resolver;
use crate::error::Socks5Error;
use bytes::BufMut;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::str::FromStr;

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for incoming connection (not implemented)
    Bind,
    /// UDP ASSOCIATE - establish UDP relay
    UdpAssociate,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// Target address for SOCKS5 requests
///
/// Represents the destination address in a SOCKS5 request, or the bound
/// address in a reply. Can be an IP address (v4 or v6) or a domain name.
///
/// Wire form: `[ATYP][ADDR][PORT-hi][PORT-lo]`, where ADDR is 4 bytes,
/// 16 bytes, or `[LEN][name]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetAddr {
    /// IP address with port
    Ip(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl TargetAddr {
    /// Create a new TargetAddr from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V4(ip), port))
    }

    /// Create a new TargetAddr from an IPv6 address and port
    pub fn ipv6(ip: Ipv6Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V6(ip), port))
    }

    /// Create a new TargetAddr from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        TargetAddr::Domain(domain.into(), port)
    }

    /// Parse `host:port`, `a.b.c.d:port`, or `[v6]:port`
    pub fn parse(s: &str) -> Result<Self, Socks5Error> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(TargetAddr::Ip(addr));
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Socks5Error::InvalidAddress(format!("missing port in {:?}", s)))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Socks5Error::InvalidAddress(format!("invalid port in {:?}", s)))?;

        if host.is_empty() || host.len() > MAX_DOMAIN_LEN {
            return Err(Socks5Error::InvalidAddress(format!(
                "host length must be 1..={}: {:?}",
                MAX_DOMAIN_LEN, s
            )));
        }
        if host.contains(':') || host.starts_with('[') {
            return Err(Socks5Error::InvalidAddress(format!(
                "IPv6 addresses must be bracketed: {:?}",
                s
            )));
        }

        Ok(TargetAddr::Domain(host.to_string(), port))
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Get the address type byte for SOCKS5 protocol
    pub fn addr_type(&self) -> u8 {
        match self {
            TargetAddr::Ip(SocketAddr::V4(_)) => SOCKS5_ADDR_TYPE_IPV4,
            TargetAddr::Ip(SocketAddr::V6(_)) => SOCKS5_ADDR_TYPE_IPV6,
            TargetAddr::Domain(_, _) => SOCKS5_ADDR_TYPE_DOMAIN,
        }
    }

    /// Number of bytes [`TargetAddr::write_to`] produces
    pub fn encoded_len(&self) -> usize {
        match self {
            TargetAddr::Ip(SocketAddr::V4(_)) => 1 + 4 + 2,
            TargetAddr::Ip(SocketAddr::V6(_)) => 1 + 16 + 2,
            TargetAddr::Domain(domain, _) => 1 + 1 + domain.len() + 2,
        }
    }

    /// Serialize the address into `dst`
    pub fn write_to<B: BufMut>(&self, dst: &mut B) -> Result<(), Socks5Error> {
        match self {
            TargetAddr::Ip(SocketAddr::V4(addr)) => {
                dst.put_u8(SOCKS5_ADDR_TYPE_IPV4);
                dst.put_slice(&addr.ip().octets());
                dst.put_u16(addr.port());
            }
            TargetAddr::Ip(SocketAddr::V6(addr)) => {
                dst.put_u8(SOCKS5_ADDR_TYPE_IPV6);
                dst.put_slice(&addr.ip().octets());
                dst.put_u16(addr.port());
            }
            TargetAddr::Domain(domain, port) => {
                if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
                    return Err(Socks5Error::InvalidAddress(format!(
                        "domain length {} out of range",
                        domain.len()
                    )));
                }
                dst.put_u8(SOCKS5_ADDR_TYPE_DOMAIN);
                dst.put_u8(domain.len() as u8);
                dst.put_slice(domain.as_bytes());
                dst.put_u16(*port);
            }
        }
        Ok(())
    }

    /// Decode an address from the front of `src`
    ///
    /// Returns the address and the number of bytes consumed. Never reads
    /// past the end of `src`.
    pub fn read_from(src: &[u8]) -> Result<(Self, usize), Socks5Error> {
        let len = match Self::frame_len(src)? {
            FrameLen::Exact(len) => len,
            FrameLen::AtLeast(_) => return Err(Socks5Error::decode("truncated address")),
        };
        if src.len() < len {
            return Err(Socks5Error::decode(format!(
                "truncated address: need {} bytes, have {}",
                len,
                src.len()
            )));
        }

        let port = u16::from_be_bytes([src[len - 2], src[len - 1]]);
        let addr = match src[0] {
            SOCKS5_ADDR_TYPE_IPV4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&src[1..5]);
                TargetAddr::Ip(SocketAddr::V4(SocketAddrV4::new(octets.into(), port)))
            }
            SOCKS5_ADDR_TYPE_IPV6 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&src[1..17]);
                TargetAddr::Ip(SocketAddr::V6(SocketAddrV6::new(octets.into(), port, 0, 0)))
            }
            _ => {
                let name = std::str::from_utf8(&src[2..len - 2])
                    .map_err(|_| Socks5Error::decode("domain name is not valid UTF-8"))?;
                TargetAddr::Domain(name.to_string(), port)
            }
        };

        Ok((addr, len))
    }

    /// Length of the address starting at `prefix[0]`, as far as the prefix tells
    pub(crate) fn frame_len(prefix: &[u8]) -> Result<FrameLen, Socks5Error> {
        let Some(&atyp) = prefix.first() else {
            return Ok(FrameLen::AtLeast(1));
        };
        match atyp {
            SOCKS5_ADDR_TYPE_IPV4 => Ok(FrameLen::Exact(1 + 4 + 2)),
            SOCKS5_ADDR_TYPE_IPV6 => Ok(FrameLen::Exact(1 + 16 + 2)),
            SOCKS5_ADDR_TYPE_DOMAIN => match prefix.get(1) {
                None => Ok(FrameLen::AtLeast(2)),
                Some(0) => Err(Socks5Error::decode("empty domain name")),
                Some(&n) => Ok(FrameLen::Exact(1 + 1 + n as usize + 2)),
            },
            other => Err(Socks5Error::UnsupportedAddressType(other)),
        }
    }

    /// Resolve the address to a SocketAddr
    ///
    /// For IP addresses, this returns immediately.
    /// For domain names, this asks `resolver`.
    pub async fn resolve(&self, resolver: &dyn Resolver) -> io::Result<SocketAddr> {
        match self {
            TargetAddr::Ip(addr) => Ok(*addr),
            TargetAddr::Domain(domain, port) => resolver.resolve(domain, *port).await,
        }
    }
}

impl FromStr for TargetAddr {
    type Err = Socks5Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetAddr::parse(s)
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for TargetAddr {
    fn from(addr: SocketAddr) -> Self {
        TargetAddr::Ip(addr)
    }
}

impl Default for TargetAddr {
    fn default() -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
    }
}
