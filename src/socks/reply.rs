//! SOCKS5 reply sending
//!
//! Relay responses written by the handshake and relay layers.

use super::packet::{Codec, RelayResponse};
use super::types::TargetAddr;
use crate::error::{ReplyCode, Socks5Error};
use std::net::SocketAddr;
use tokio::io::AsyncWrite;

/// Build and send a SOCKS5 reply
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// `bind_addr` defaults to `0.0.0.0:0`.
pub async fn send_reply<W>(
    codec: &Codec,
    writer: &mut W,
    reply: ReplyCode,
    bind_addr: Option<SocketAddr>,
) -> Result<(), Socks5Error>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut resp = codec.message::<RelayResponse>();
    resp.reply = reply;
    resp.addr = bind_addr.map(TargetAddr::Ip).unwrap_or_default();
    codec.write(writer, &*resp).await
}

/// Send the failure reply closest to `error`
pub async fn send_failure<W>(codec: &Codec, writer: &mut W, error: &Socks5Error) -> Result<(), Socks5Error>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_reply(codec, writer, ReplyCode::from(error), None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_send_reply_default_addr() {
        let mut stream = Builder::new()
            .write(&[0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
            .build();
        send_reply(&Codec::default(), &mut stream, ReplyCode::CommandNotSupported, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_reply_ipv6_addr() {
        let addr: SocketAddr = "[::1]:1080".parse().unwrap();
        let mut expected = vec![0x05, 0x00, 0x00, 0x04];
        expected.extend_from_slice(&std::net::Ipv6Addr::LOCALHOST.octets());
        expected.extend_from_slice(&1080u16.to_be_bytes());

        let mut stream = Builder::new().write(&expected).build();
        send_reply(&Codec::default(), &mut stream, ReplyCode::Succeeded, Some(addr))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_maps_error() {
        let mut stream = Builder::new()
            .write(&[0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
            .build();
        let err = Socks5Error::Dial {
            target: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        send_failure(&Codec::default(), &mut stream, &err).await.unwrap();
    }
}
