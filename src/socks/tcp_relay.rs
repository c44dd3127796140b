//! TCP relay for SOCKS5 CONNECT command
//!
//! Handles CONNECT requests by dialing the destination and splicing the two
//! streams until either side closes.

use super::handler::SessionContext;
use super::packet::Codec;
use super::reply::{send_failure, send_reply};
use super::types::TargetAddr;
use crate::error::{ReplyCode, Socks5Error};
use crate::pool::BufferClass;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Handle TCP CONNECT command
///
/// 1. Resolves the target address
/// 2. Dials it within the connect timeout
/// 3. Replies with the dialed connection's local address
/// 4. Splices client and destination
///
/// Returns the bytes moved client to destination and destination to client.
pub async fn handle_connect<S>(
    mut client: S,
    target: &TargetAddr,
    ctx: &SessionContext,
) -> Result<(u64, u64), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let addr = match target.resolve(ctx.resolver.as_ref()).await {
        Ok(addr) => addr,
        Err(source) => {
            warn!("Failed to resolve {}: {}", target, source);
            send_reply(&ctx.codec, &mut client, ReplyCode::HostUnreachable, None).await?;
            return Err(Socks5Error::Dial {
                target: target.to_string(),
                source,
            });
        }
    };

    debug!("Connecting to target: {}", addr);

    let upstream = match ctx.dialer.dial(addr).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to connect to {}: {}", addr, e);
            send_failure(&ctx.codec, &mut client, &e).await?;
            return Err(e);
        }
    };

    let local = upstream.local_addr().ok();
    send_reply(&ctx.codec, &mut client, ReplyCode::Succeeded, local).await?;

    info!("SOCKS5 tunnel established to {}", target);

    let (up, down) = relay_tcp(client, upstream, &ctx.codec, ctx.config.relay_linger).await;
    info!(
        "SOCKS5 tunnel to {} closed ({} bytes up, {} bytes down)",
        target, up, down
    );

    Ok((up, down))
}

/// Relay data bidirectionally between two streams
///
/// Both directions run concurrently. An error in either direction ends the
/// relay at once and drops both streams. A clean EOF shuts down the write side
/// it was feeding, and the other direction then gets `linger` to drain before
/// it is cut off. Returns the byte counts for `a` to `b` and `b` to `a`.
pub async fn relay_tcp<A, B>(a: A, b: B, codec: &Codec, linger: Duration) -> (u64, u64)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);
    let mut up = 0u64;
    let mut down = 0u64;

    {
        let a_to_b = copy_half(&mut a_read, &mut b_write, codec, &mut up);
        let b_to_a = copy_half(&mut b_read, &mut a_write, codec, &mut down);
        tokio::pin!(a_to_b);
        tokio::pin!(b_to_a);

        tokio::select! {
            result = &mut a_to_b => drain_other("A->B", result, b_to_a, linger).await,
            result = &mut b_to_a => drain_other("B->A", result, a_to_b, linger).await,
        }
    }

    (up, down)
}

/// Finish the relay once the direction named `label` has ended
async fn drain_other<F>(label: &str, first: io::Result<()>, other: F, linger: Duration)
where
    F: Future<Output = io::Result<()>> + Unpin,
{
    if let Err(e) = first {
        debug!("{} failed, closing both sides: {}", label, e);
        return;
    }
    debug!("{} reached EOF, draining the other direction", label);

    match tokio::time::timeout(linger, other).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Relay ended with error after {} closed: {}", label, e),
        Err(_) => debug!("Relay linger of {:?} expired after {} closed", linger, label),
    }
}

async fn copy_half<R, W>(
    reader: &mut R,
    writer: &mut W,
    codec: &Codec,
    total: &mut u64,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = codec.buffer(BufferClass::Datagram);
    let scratch = buf.scratch();
    loop {
        let n = reader.read(scratch).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&scratch[..n]).await?;
        *total += n as u64;
    }
    writer.shutdown().await
}
