//! UDP ASSOCIATE handler
//!
//! Binds a dedicated UDP listener for the association, reports it to the
//! client, and bridges envelopes between that listener and the NAT table
//! for as long as the TCP control connection stays open.

use super::nat::AssociationId;
use crate::error::{ReplyCode, Socks5Error};
use crate::pool::BufferClass;
use crate::socks::handler::{ConnectionInfo, SessionContext};
use crate::socks::reply::send_reply;
use crate::socks::types::TargetAddr;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

enum Event {
    Control(io::Result<usize>),
    Datagram(io::Result<(usize, SocketAddr)>),
}

/// Handle UDP ASSOCIATE command
///
/// # Protocol Flow
///
/// 1. Client sends UDP ASSOCIATE with expected DST.ADDR and DST.PORT
/// 2. Server binds a UDP listener and replies with its BND.ADDR:BND.PORT
/// 3. Client sends envelopes to that address; payloads go out through the
///    client's NAT entry and replies come back wrapped in envelopes
/// 4. When the TCP control connection closes, the association ends and its
///    NAT entries are torn down
pub async fn handle_udp_associate<S>(
    mut control: S,
    requested: TargetAddr,
    info: &ConnectionInfo,
    ctx: &SessionContext,
) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let bind_ip = ctx.config.udp_bind_ip.unwrap_or_else(|| info.local.ip());
    let listener = match UdpSocket::bind(SocketAddr::new(bind_ip, 0)).await {
        Ok(socket) => Arc::new(socket),
        Err(e) => {
            warn!("Failed to bind UDP listener on {}: {}", bind_ip, e);
            send_reply(&ctx.codec, &mut control, ReplyCode::GeneralFailure, None).await?;
            return Err(e.into());
        }
    };

    let bound = listener.local_addr()?;
    let reported = if bound.ip().is_unspecified() {
        SocketAddr::new(info.local.ip(), bound.port())
    } else {
        bound
    };
    send_reply(&ctx.codec, &mut control, ReplyCode::Succeeded, Some(reported)).await?;

    let association = ctx.nat.next_association_id();
    info!(
        "UDP ASSOCIATE established on {} for {} (requested {})",
        reported, info.peer, requested
    );

    let result = relay_association(&mut control, &listener, association, info, ctx).await;

    let evicted = ctx.nat.evict_owner(association).await;
    info!(
        "UDP ASSOCIATE on {} ended, {} NAT entries released",
        reported, evicted
    );
    result
}

async fn relay_association<S>(
    control: &mut S,
    listener: &Arc<UdpSocket>,
    association: AssociationId,
    info: &ConnectionInfo,
    ctx: &SessionContext,
) -> Result<(), Socks5Error>
where
    S: AsyncRead + Unpin,
{
    let mut probe = [0u8; 64];

    loop {
        let mut buf = ctx.codec.buffer(BufferClass::Datagram);
        let event = tokio::select! {
            r = control.read(&mut probe) => Event::Control(r),
            r = listener.recv_from(buf.scratch()) => Event::Datagram(r),
        };

        match event {
            Event::Control(Ok(0)) => {
                debug!("Control connection closed, terminating UDP association");
                return Ok(());
            }
            Event::Control(Ok(n)) => {
                debug!("Ignoring {} unexpected bytes on UDP control connection", n);
            }
            Event::Control(Err(e)) => {
                debug!("Control connection error: {}", e);
                return Ok(());
            }
            Event::Datagram(Err(e)) => {
                warn!("UDP listener receive error: {}", e);
                return Err(e.into());
            }
            Event::Datagram(Ok((len, from))) => {
                forward_datagram(&buf[..len], from, listener, association, info, ctx).await;
            }
        }
    }
}

/// Send one client datagram on to its destination. Bad datagrams are dropped.
async fn forward_datagram(
    datagram: &[u8],
    from: SocketAddr,
    listener: &Arc<UdpSocket>,
    association: AssociationId,
    info: &ConnectionInfo,
    ctx: &SessionContext,
) {
    if !same_host(from.ip(), info.peer.ip()) {
        debug!(
            "Dropping datagram from {}: not the association client {}",
            from, info.peer
        );
        return;
    }

    let envelope = match ctx.codec.decode_datagram(datagram) {
        Ok(env) => env,
        Err(e) => {
            debug!("Dropping malformed datagram from {}: {}", from, e);
            return;
        }
    };
    if envelope.frag != 0 {
        debug!("Dropping fragment {} from {}", envelope.frag, from);
        return;
    }

    let destination = match envelope.addr.resolve(ctx.resolver.as_ref()).await {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Failed to resolve UDP target {}: {}", envelope.addr, e);
            return;
        }
    };

    let outbound = match ctx
        .nat
        .get_or_create(from, association, destination, listener)
        .await
    {
        Ok(socket) => socket,
        Err(e) => {
            warn!("Failed to open outbound UDP socket for {}: {}", from, e);
            return;
        }
    };

    match outbound.send_to(&envelope.payload, destination).await {
        Ok(n) => debug!("UDP relay: sent {} bytes from {} to {}", n, from, destination),
        Err(e) => warn!("UDP send to {} failed: {}", destination, e),
    }
}

fn same_host(a: IpAddr, b: IpAddr) -> bool {
    a.to_canonical() == b.to_canonical()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_host_mapped_v4() {
        let v4: IpAddr = "127.0.0.1".parse().unwrap();
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        let other: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(same_host(v4, mapped));
        assert!(!same_host(v4, other));
    }
}
