//! Method negotiation messages
//!
//! `[VER][NMETHODS][METHODS...]` and `[VER][METHOD]`.

use super::frame::{check_complete, Frame, FrameLen, Message};
use crate::error::Socks5Error;
use crate::pool::Recycle;
use crate::socks::consts::SOCKS5_VERSION;
use bytes::{BufMut, BytesMut};

/// Client greeting listing the methods it supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiateRequest {
    /// Protocol version
    pub version: u8,
    /// Offered authentication methods, in client order
    pub methods: Vec<u8>,
}

impl Default for NegotiateRequest {
    fn default() -> Self {
        NegotiateRequest {
            version: SOCKS5_VERSION,
            methods: Vec::new(),
        }
    }
}

impl Recycle for NegotiateRequest {
    fn recycle(&mut self) -> bool {
        self.version = SOCKS5_VERSION;
        self.methods.clear();
        true
    }
}

impl Message for NegotiateRequest {
    fn encoded_len(&self) -> usize {
        2 + self.methods.len()
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<(), Socks5Error> {
        if self.methods.len() > u8::MAX as usize {
            return Err(Socks5Error::Encode(format!(
                "{} methods offered, at most 255 allowed",
                self.methods.len()
            )));
        }
        dst.put_u8(self.version);
        dst.put_u8(self.methods.len() as u8);
        dst.put_slice(&self.methods);
        Ok(())
    }

    fn decode_into(&mut self, src: &[u8]) -> Result<(), Socks5Error> {
        check_complete::<Self>(src)?;
        self.version = src[0];
        self.methods.clear();
        self.methods.extend_from_slice(&src[2..]);
        Ok(())
    }
}

impl Frame for NegotiateRequest {
    fn frame_len(prefix: &[u8]) -> Result<FrameLen, Socks5Error> {
        match prefix.get(1) {
            None => Ok(FrameLen::AtLeast(2)),
            Some(&n) => Ok(FrameLen::Exact(2 + n as usize)),
        }
    }
}

/// Server choice of authentication method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiateResponse {
    /// Protocol version
    pub version: u8,
    /// Chosen method, or 0xFF when none is acceptable
    pub method: u8,
}

impl Default for NegotiateResponse {
    fn default() -> Self {
        NegotiateResponse {
            version: SOCKS5_VERSION,
            method: 0,
        }
    }
}

impl Recycle for NegotiateResponse {
    fn recycle(&mut self) -> bool {
        *self = Self::default();
        true
    }
}

impl Message for NegotiateResponse {
    fn encoded_len(&self) -> usize {
        2
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<(), Socks5Error> {
        dst.put_u8(self.version);
        dst.put_u8(self.method);
        Ok(())
    }

    fn decode_into(&mut self, src: &[u8]) -> Result<(), Socks5Error> {
        check_complete::<Self>(src)?;
        self.version = src[0];
        self.method = src[1];
        Ok(())
    }
}

impl Frame for NegotiateResponse {
    fn frame_len(_prefix: &[u8]) -> Result<FrameLen, Socks5Error> {
        Ok(FrameLen::Exact(2))
    }
}
