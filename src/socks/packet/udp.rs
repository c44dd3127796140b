//! UDP relay envelope
//!
//! `[RSV 00 00][FRAG][ATYP][ADDR][PORT][DATA...]`

use super::frame::Message;
use crate::error::Socks5Error;
use crate::pool::Recycle;
use crate::socks::consts::UDP_BUFFER_SIZE;
use crate::socks::types::TargetAddr;
use bytes::{BufMut, BytesMut};

/// Envelopes whose payload grew beyond this are not kept for reuse
const MAX_RECYCLED_PAYLOAD: usize = UDP_BUFFER_SIZE * 4;

/// A UDP datagram wrapped with its real destination (or origin)
///
/// Owns a copy of the payload: the buffer it was decoded from goes back to
/// its pool as soon as decoding returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UdpEnvelope {
    /// Fragment number, 0 for a standalone datagram
    pub frag: u8,
    /// Destination (client to server) or origin (server to client)
    pub addr: TargetAddr,
    /// Datagram payload
    pub payload: Vec<u8>,
}

impl UdpEnvelope {
    /// Length of the header in front of the payload
    pub fn header_len(&self) -> usize {
        3 + self.addr.encoded_len()
    }

    /// Write an envelope for `payload` without building an `UdpEnvelope`
    pub fn encode_datagram(
        addr: &TargetAddr,
        payload: &[u8],
        dst: &mut BytesMut,
    ) -> Result<(), Socks5Error> {
        dst.reserve(3 + addr.encoded_len() + payload.len());
        dst.put_u16(0);
        dst.put_u8(0);
        addr.write_to(dst)
            .map_err(|e| Socks5Error::Encode(e.to_string()))?;
        dst.put_slice(payload);
        Ok(())
    }
}

impl Recycle for UdpEnvelope {
    fn recycle(&mut self) -> bool {
        self.frag = 0;
        self.addr = TargetAddr::default();
        self.payload.clear();
        self.payload.capacity() <= MAX_RECYCLED_PAYLOAD
    }
}

impl Message for UdpEnvelope {
    fn encoded_len(&self) -> usize {
        self.header_len() + self.payload.len()
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<(), Socks5Error> {
        dst.put_u16(0);
        dst.put_u8(self.frag);
        self.addr
            .write_to(dst)
            .map_err(|e| Socks5Error::Encode(e.to_string()))?;
        dst.put_slice(&self.payload);
        Ok(())
    }

    fn decode_into(&mut self, src: &[u8]) -> Result<(), Socks5Error> {
        if src.len() < 4 {
            return Err(Socks5Error::decode(format!(
                "UDP envelope too short: {} bytes",
                src.len()
            )));
        }
        if src[0] != 0 || src[1] != 0 {
            return Err(Socks5Error::decode("non-zero reserved bytes in UDP envelope"));
        }
        let (addr, used) = TargetAddr::read_from(&src[3..])?;

        self.frag = src[2];
        self.addr = addr;
        self.payload.clear();
        self.payload.extend_from_slice(&src[3 + used..]);
        Ok(())
    }
}
