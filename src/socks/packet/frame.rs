//! Message and framing traits
//!
//! A control message is read off a stream in steps: the decoder reports how
//! many bytes it needs given what has arrived so far, the reader fetches
//! exactly that many, and the loop ends once the length is known and filled.

use crate::error::Socks5Error;
use crate::pool::Recycle;
use bytes::BytesMut;

/// How long a frame is, as far as its prefix tells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLen {
    /// The whole frame is exactly this many bytes
    Exact(usize),
    /// At least this many bytes are needed before the length is known
    AtLeast(usize),
}

/// A SOCKS5 message that can be encoded and decoded
pub trait Message: Recycle + Default + Send + 'static {
    /// Number of bytes [`Message::encode`] appends
    fn encoded_len(&self) -> usize;

    /// Append the wire form to `dst`
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Socks5Error>;

    /// Overwrite `self` from a complete wire form
    fn decode_into(&mut self, src: &[u8]) -> Result<(), Socks5Error>;

    /// Decode a fresh value
    fn decode(src: &[u8]) -> Result<Self, Socks5Error> {
        let mut msg = Self::default();
        msg.decode_into(src)?;
        Ok(msg)
    }
}

/// A message carried on a stream, whose length is derived from its own header
pub trait Frame: Message {
    /// Length of the frame that starts with `prefix`
    ///
    /// Must return `Exact(prefix.len())` once `prefix` is a complete frame,
    /// and never a length at or below `prefix.len()` otherwise.
    fn frame_len(prefix: &[u8]) -> Result<FrameLen, Socks5Error>;
}

/// Check that `src` holds exactly one complete `F`
pub(crate) fn check_complete<F: Frame>(src: &[u8]) -> Result<(), Socks5Error> {
    match F::frame_len(src)? {
        FrameLen::Exact(len) if len == src.len() => Ok(()),
        FrameLen::Exact(len) if len > src.len() => Err(Socks5Error::decode(format!(
            "truncated frame: need {} bytes, have {}",
            len,
            src.len()
        ))),
        FrameLen::Exact(len) => Err(Socks5Error::decode(format!(
            "{} trailing bytes after frame",
            src.len() - len
        ))),
        FrameLen::AtLeast(len) => Err(Socks5Error::decode(format!(
            "truncated frame: need at least {} bytes, have {}",
            len,
            src.len()
        ))),
    }
}

/// Reserve room for `msg` and encode it, checking the size it reported
pub(crate) fn encode_sized<M: Message>(msg: &M, dst: &mut BytesMut) -> Result<(), Socks5Error> {
    let start = dst.len();
    dst.reserve(msg.encoded_len());
    msg.encode(dst)?;
    debug_assert_eq!(dst.len() - start, msg.encoded_len());
    Ok(())
}
