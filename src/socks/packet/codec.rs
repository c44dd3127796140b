//! Pool-backed reader and writer for SOCKS5 messages

use super::auth::{AuthRequest, AuthResponse};
use super::frame::{encode_sized, Frame, FrameLen, Message};
use super::negotiate::{NegotiateRequest, NegotiateResponse};
use super::request::{RelayRequest, RelayResponse};
use super::udp::UdpEnvelope;
use crate::error::Socks5Error;
use crate::pool::{BufferClass, BufferPool, ObjectPool, Pooled, PooledBuffer, DEFAULT_MAX_IDLE};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// A message type with its own pool inside a [`Codec`]
pub trait PooledMessage: Message + Sized {
    /// The pool holding values of this type
    fn pool(codec: &Codec) -> &ObjectPool<Self>;
}

/// Encoder/decoder for SOCKS5 messages, drawing scratch memory from pools
///
/// Cloning is cheap; clones share the same pools.
#[derive(Clone, Debug)]
pub struct Codec {
    buffers: BufferPool,
    negotiate_requests: ObjectPool<NegotiateRequest>,
    negotiate_responses: ObjectPool<NegotiateResponse>,
    auth_requests: ObjectPool<AuthRequest>,
    auth_responses: ObjectPool<AuthResponse>,
    relay_requests: ObjectPool<RelayRequest>,
    relay_responses: ObjectPool<RelayResponse>,
    udp_envelopes: ObjectPool<UdpEnvelope>,
}

impl Codec {
    /// Create a codec whose pools keep at most `max_idle` idle values each
    pub fn new(max_idle: usize) -> Self {
        Codec {
            buffers: BufferPool::new(max_idle),
            negotiate_requests: ObjectPool::new(max_idle, NegotiateRequest::default),
            negotiate_responses: ObjectPool::new(max_idle, NegotiateResponse::default),
            auth_requests: ObjectPool::new(max_idle, AuthRequest::default),
            auth_responses: ObjectPool::new(max_idle, AuthResponse::default),
            relay_requests: ObjectPool::new(max_idle, RelayRequest::default),
            relay_responses: ObjectPool::new(max_idle, RelayResponse::default),
            udp_envelopes: ObjectPool::new(max_idle, UdpEnvelope::default),
        }
    }

    /// The scratch buffer pool
    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    /// Borrow a scratch buffer
    pub fn buffer(&self, class: BufferClass) -> PooledBuffer {
        self.buffers.acquire(class)
    }

    /// Borrow a default-valued message, e.g. to fill in and write
    pub fn message<M: PooledMessage>(&self) -> Pooled<M> {
        M::pool(self).get()
    }

    /// Read exactly one `M` from `reader`
    ///
    /// Reads the header first, then exactly the remaining declared length,
    /// never past the end of the frame. Fails with [`Socks5Error::Timeout`]
    /// if the whole frame does not arrive within `max_wait`.
    pub async fn read<M, R>(&self, reader: &mut R, max_wait: Duration) -> Result<Pooled<M>, Socks5Error>
    where
        M: Frame + PooledMessage,
        R: AsyncRead + Unpin + ?Sized,
    {
        match tokio::time::timeout(max_wait, self.read_frame::<M, R>(reader)).await {
            Ok(result) => result,
            Err(_) => Err(Socks5Error::Timeout(format!(
                "no complete {} within {:?}",
                short_type_name::<M>(),
                max_wait
            ))),
        }
    }

    async fn read_frame<M, R>(&self, reader: &mut R) -> Result<Pooled<M>, Socks5Error>
    where
        M: Frame + PooledMessage,
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buf = self.buffer(BufferClass::Control);
        let scratch = buf.scratch();
        let mut filled = 0;

        loop {
            match M::frame_len(&scratch[..filled])? {
                FrameLen::Exact(len) if len == filled => break,
                FrameLen::Exact(len) | FrameLen::AtLeast(len) if len > filled => {
                    if len > scratch.len() {
                        return Err(Socks5Error::decode(format!(
                            "{} frame of {} bytes exceeds {} byte limit",
                            short_type_name::<M>(),
                            len,
                            scratch.len()
                        )));
                    }
                    reader.read_exact(&mut scratch[filled..len]).await?;
                    filled = len;
                }
                _ => {
                    return Err(Socks5Error::decode(format!(
                        "inconsistent frame length for {}",
                        short_type_name::<M>()
                    )))
                }
            }
        }

        trace!("Read {} ({} bytes)", short_type_name::<M>(), filled);
        let mut msg = self.message::<M>();
        msg.decode_into(&scratch[..filled])?;
        Ok(msg)
    }

    /// Encode `msg` and write it to `writer` in one piece
    pub async fn write<M, W>(&self, writer: &mut W, msg: &M) -> Result<(), Socks5Error>
    where
        M: Message,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = self.buffer(BufferClass::Control);
        encode_sized(msg, &mut buf)?;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        trace!("Wrote {} ({} bytes)", short_type_name::<M>(), buf.len());
        Ok(())
    }

    /// Decode one UDP envelope from a received datagram
    pub fn decode_datagram(&self, datagram: &[u8]) -> Result<Pooled<UdpEnvelope>, Socks5Error> {
        let mut env = self.message::<UdpEnvelope>();
        env.decode_into(datagram)?;
        Ok(env)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

impl PooledMessage for NegotiateRequest {
    fn pool(codec: &Codec) -> &ObjectPool<Self> {
        &codec.negotiate_requests
    }
}

impl PooledMessage for NegotiateResponse {
    fn pool(codec: &Codec) -> &ObjectPool<Self> {
        &codec.negotiate_responses
    }
}

impl PooledMessage for AuthRequest {
    fn pool(codec: &Codec) -> &ObjectPool<Self> {
        &codec.auth_requests
    }
}

impl PooledMessage for AuthResponse {
    fn pool(codec: &Codec) -> &ObjectPool<Self> {
        &codec.auth_responses
    }
}

impl PooledMessage for RelayRequest {
    fn pool(codec: &Codec) -> &ObjectPool<Self> {
        &codec.relay_requests
    }
}

impl PooledMessage for RelayResponse {
    fn pool(codec: &Codec) -> &ObjectPool<Self> {
        &codec.relay_responses
    }
}

impl PooledMessage for UdpEnvelope {
    fn pool(codec: &Codec) -> &ObjectPool<Self> {
        &codec.udp_envelopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplyCode;
    use crate::socks::types::TargetAddr;
    use std::net::Ipv4Addr;
    use tokio_test::io::Builder;

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_read_fragmented_request() {
        // Domain request split across many small reads
        let mut stream = Builder::new()
            .read(&[0x05])
            .read(&[0x01, 0x00])
            .read(&[0x03, 0x0B])
            .read(b"example")
            .read(b".com")
            .read(&[0x01, 0xBB])
            .build();

        let codec = Codec::default();
        let req = codec.read::<RelayRequest, _>(&mut stream, WAIT).await.unwrap();
        assert_eq!(req.command, 0x01);
        assert_eq!(req.addr, TargetAddr::domain("example.com", 443));
    }

    #[tokio::test]
    async fn test_read_does_not_consume_next_frame() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client
            .write_all(&[0x05, 0x01, 0x02, 0x01, 0x00, 0x00])
            .await
            .unwrap();

        let codec = Codec::default();
        let req = codec
            .read::<NegotiateRequest, _>(&mut server, WAIT)
            .await
            .unwrap();
        assert_eq!(req.methods, vec![0x02]);

        let mut rest = [0u8; 3];
        server.read_exact(&mut rest).await.unwrap();
        assert_eq!(rest, [0x01, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn test_read_eof_mid_frame() {
        let mut stream = Builder::new().read(&[0x05, 0x02, 0x00]).build();
        let codec = Codec::default();
        let err = codec
            .read::<NegotiateRequest, _>(&mut stream, WAIT)
            .await
            .unwrap_err();
        assert!(err.is_eof());
    }

    #[tokio::test]
    async fn test_read_times_out() {
        let (_client, mut server) = tokio::io::duplex(64);
        let codec = Codec::default();
        let err = codec
            .read::<NegotiateRequest, _>(&mut server, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_read_unsupported_address_type() {
        let mut stream = Builder::new().read(&[0x05, 0x01, 0x00, 0x07]).build();
        let codec = Codec::default();
        let err = codec
            .read::<RelayRequest, _>(&mut stream, WAIT)
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::UnsupportedAddressType(0x07)));
    }

    #[tokio::test]
    async fn test_write_exact_bytes() {
        let mut stream = Builder::new()
            .write(&[0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0x04, 0x38])
            .build();
        let codec = Codec::default();
        let resp = RelayResponse::new(
            ReplyCode::Succeeded,
            TargetAddr::ipv4(Ipv4Addr::LOCALHOST, 1080),
        );
        codec.write(&mut stream, &resp).await.unwrap();
    }

    #[tokio::test]
    async fn test_buffers_returned_on_every_path() {
        let codec = Codec::default();

        let mut ok = Builder::new().read(&[0x05, 0x01, 0x00]).build();
        drop(codec.read::<NegotiateRequest, _>(&mut ok, WAIT).await.unwrap());

        let mut bad = Builder::new().read(&[0x05, 0x01]).build();
        assert!(codec
            .read::<NegotiateRequest, _>(&mut bad, WAIT)
            .await
            .is_err());

        let stats = codec.buffers().stats(BufferClass::Control);
        assert_eq!(stats.total_acquired, 2);
        assert_eq!(stats.in_use(), 0);
        assert_eq!(NegotiateRequest::pool(&codec).stats().in_use(), 0);
    }

    #[test]
    fn test_decode_datagram_reuses_envelope() {
        let codec = Codec::new(4);
        let datagram = [0, 0, 0, 0x01, 1, 2, 3, 4, 0, 80, b'h', b'i'];

        let env = codec.decode_datagram(&datagram).unwrap();
        assert_eq!(env.payload, b"hi");
        env.release();

        let env = codec.decode_datagram(&datagram).unwrap();
        assert_eq!(env.addr, TargetAddr::ipv4(Ipv4Addr::new(1, 2, 3, 4), 80));
        assert_eq!(UdpEnvelope::pool(&codec).stats().total_created, 1);
    }
}
