//! Relay request and reply
//!
//! `[VER][CMD|REP][RSV][ATYP][ADDR][PORT]`

use super::frame::{check_complete, Frame, FrameLen, Message};
use crate::error::{ReplyCode, Socks5Error};
use crate::pool::Recycle;
use crate::socks::consts::{SOCKS5_CMD_TCP_CONNECT, SOCKS5_RESERVED, SOCKS5_VERSION};
use crate::socks::types::TargetAddr;
use bytes::{BufMut, BytesMut};

/// Length of the address-prefixed frame `[VER][X][RSV]` + address
fn header_frame_len(prefix: &[u8]) -> Result<FrameLen, Socks5Error> {
    if prefix.len() < 4 {
        return Ok(FrameLen::AtLeast(4));
    }
    Ok(match TargetAddr::frame_len(&prefix[3..])? {
        FrameLen::Exact(n) => FrameLen::Exact(3 + n),
        FrameLen::AtLeast(n) => FrameLen::AtLeast(3 + n),
    })
}

/// CONNECT / BIND / UDP ASSOCIATE request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    /// Protocol version
    pub version: u8,
    /// Raw command byte, so unknown commands can still be answered
    pub command: u8,
    /// Destination (or, for UDP ASSOCIATE, the client's expected source)
    pub addr: TargetAddr,
}

impl Default for RelayRequest {
    fn default() -> Self {
        RelayRequest {
            version: SOCKS5_VERSION,
            command: SOCKS5_CMD_TCP_CONNECT,
            addr: TargetAddr::default(),
        }
    }
}

impl Recycle for RelayRequest {
    fn recycle(&mut self) -> bool {
        *self = Self::default();
        true
    }
}

impl Message for RelayRequest {
    fn encoded_len(&self) -> usize {
        3 + self.addr.encoded_len()
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<(), Socks5Error> {
        dst.put_u8(self.version);
        dst.put_u8(self.command);
        dst.put_u8(SOCKS5_RESERVED);
        self.addr
            .write_to(dst)
            .map_err(|e| Socks5Error::Encode(e.to_string()))
    }

    fn decode_into(&mut self, src: &[u8]) -> Result<(), Socks5Error> {
        check_complete::<Self>(src)?;
        let (addr, _) = TargetAddr::read_from(&src[3..])?;
        self.version = src[0];
        self.command = src[1];
        self.addr = addr;
        Ok(())
    }
}

impl Frame for RelayRequest {
    fn frame_len(prefix: &[u8]) -> Result<FrameLen, Socks5Error> {
        header_frame_len(prefix)
    }
}

/// Reply to a relay request, carrying the bound address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    /// Protocol version
    pub version: u8,
    /// Outcome of the request
    pub reply: ReplyCode,
    /// Address the server bound for this request
    pub addr: TargetAddr,
}

impl RelayResponse {
    /// Reply with `reply` and the given bound address
    pub fn new(reply: ReplyCode, addr: TargetAddr) -> Self {
        RelayResponse {
            version: SOCKS5_VERSION,
            reply,
            addr,
        }
    }
}

impl Default for RelayResponse {
    fn default() -> Self {
        RelayResponse::new(ReplyCode::GeneralFailure, TargetAddr::default())
    }
}

impl Recycle for RelayResponse {
    fn recycle(&mut self) -> bool {
        *self = Self::default();
        true
    }
}

impl Message for RelayResponse {
    fn encoded_len(&self) -> usize {
        3 + self.addr.encoded_len()
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<(), Socks5Error> {
        dst.put_u8(self.version);
        dst.put_u8(self.reply.into());
        dst.put_u8(SOCKS5_RESERVED);
        self.addr
            .write_to(dst)
            .map_err(|e| Socks5Error::Encode(e.to_string()))
    }

    fn decode_into(&mut self, src: &[u8]) -> Result<(), Socks5Error> {
        check_complete::<Self>(src)?;
        let reply = ReplyCode::try_from(src[1])?;
        let (addr, _) = TargetAddr::read_from(&src[3..])?;
        self.version = src[0];
        self.reply = reply;
        self.addr = addr;
        Ok(())
    }
}

impl Frame for RelayResponse {
    fn frame_len(prefix: &[u8]) -> Result<FrameLen, Socks5Error> {
        header_frame_len(prefix)
    }
}
