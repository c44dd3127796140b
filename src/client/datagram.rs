//! Client end of a UDP association

use crate::error::Socks5Error;
use crate::pool::BufferClass;
use crate::socks::packet::{Codec, UdpEnvelope};
use crate::socks::TargetAddr;
use std::net::SocketAddr;
use tokio::net::{TcpStream, UdpSocket};
use tracing::trace;

/// UDP socket whose datagrams travel through a SOCKS5 relay
///
/// Holds the association's control connection; dropping the datagram
/// closes it, which ends the association on the proxy.
#[derive(Debug)]
pub struct Socks5Datagram {
    _control: TcpStream,
    socket: UdpSocket,
    relay: SocketAddr,
    codec: Codec,
}

impl Socks5Datagram {
    pub(crate) fn new(control: TcpStream, socket: UdpSocket, relay: SocketAddr, codec: Codec) -> Self {
        Socks5Datagram {
            _control: control,
            socket,
            relay,
            codec,
        }
    }

    /// Relay address reported by the proxy
    pub fn relay_addr(&self) -> SocketAddr {
        self.relay
    }

    /// Local address datagrams are sent from
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send `payload` to `target` through the relay
    pub async fn send_to(&self, payload: &[u8], target: &TargetAddr) -> Result<usize, Socks5Error> {
        let mut buf = self.codec.buffer(BufferClass::Datagram);
        UdpEnvelope::encode_datagram(target, payload, &mut buf)?;
        self.socket.send(&buf).await?;
        trace!("Sent {} bytes to {} via {}", payload.len(), target, self.relay);
        Ok(payload.len())
    }

    /// Receive one datagram, returning its length and origin
    ///
    /// Payloads longer than `buf` are truncated.
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, TargetAddr), Socks5Error> {
        let mut scratch = self.codec.buffer(BufferClass::Datagram);
        let len = self.socket.recv(scratch.scratch()).await?;

        let mut envelope = self.codec.decode_datagram(&scratch[..len])?;
        let n = envelope.payload.len().min(buf.len());
        buf[..n].copy_from_slice(&envelope.payload[..n]);
        Ok((n, std::mem::take(&mut envelope.addr)))
    }
}
