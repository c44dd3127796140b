//! UDP NAT table
//!
//! Maps a client's UDP source address to the outbound socket relaying its
//! datagrams. Each entry owns a reply task that reads the outbound socket,
//! wraps what arrives in a UDP envelope, and sends it back to the client
//! through the association listener. Entries are removed when idle beyond
//! the configured timeout, or when the association that created them ends.

use crate::pool::BufferClass;
use crate::socks::packet::{Codec, UdpEnvelope};
use crate::socks::types::TargetAddr;
use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Identifies the UDP association (control connection) owning an entry
pub type AssociationId = u64;

/// Last time traffic passed through an entry, in either direction
#[derive(Debug)]
struct Activity(StdMutex<Instant>);

impl Activity {
    fn new() -> Self {
        Activity(StdMutex::new(Instant::now()))
    }

    fn touch(&self) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn last(&self) -> Instant {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One client's outbound session
struct NatEntry {
    id: u64,
    owner: AssociationId,
    socket: Arc<UdpSocket>,
    activity: Arc<Activity>,
    task: JoinHandle<()>,
}

impl Drop for NatEntry {
    fn drop(&mut self) {
        // Stops the reply task, which releases the last handle on the socket
        self.task.abort();
    }
}

struct NatInner {
    entries: Mutex<HashMap<String, NatEntry>>,
    idle_timeout: Duration,
    codec: Codec,
    next_id: AtomicU64,
}

impl NatInner {
    async fn remove_if_id(&self, key: &str, id: u64) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.get(key).map(|e| e.id) == Some(id) {
            entries.remove(key);
            true
        } else {
            false
        }
    }
}

/// Shared table of active UDP sessions, keyed by client source address
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone)]
pub struct NatTable {
    inner: Arc<NatInner>,
}

impl NatTable {
    /// Create a table whose entries expire after `idle_timeout` without traffic
    pub fn new(idle_timeout: Duration, codec: Codec) -> Self {
        NatTable {
            inner: Arc::new(NatInner {
                entries: Mutex::new(HashMap::new()),
                idle_timeout,
                codec,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Idle timeout applied to entries
    pub fn idle_timeout(&self) -> Duration {
        self.inner.idle_timeout
    }

    /// Allocate an id for a new association
    pub fn next_association_id(&self) -> AssociationId {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Outbound socket for `client`, creating the entry if needed
    ///
    /// A new entry binds an ephemeral socket of the same family as
    /// `destination` and starts relaying replies to `client` through
    /// `listener`. An existing entry created by another association is
    /// replaced.
    pub async fn get_or_create(
        &self,
        client: SocketAddr,
        owner: AssociationId,
        destination: SocketAddr,
        listener: &Arc<UdpSocket>,
    ) -> io::Result<Arc<UdpSocket>> {
        let key = client.to_string();
        let mut entries = self.inner.entries.lock().await;

        if let Some(entry) = entries.get(&key) {
            if entry.owner == owner {
                entry.activity.touch();
                return Ok(Arc::clone(&entry.socket));
            }
            debug!("Replacing NAT entry for {} from another association", key);
            entries.remove(&key);
        }

        let bind_addr = match destination {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let activity = Arc::new(Activity::new());
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let task = tokio::spawn(reply_loop(ReplyTask {
            key: key.clone(),
            id,
            client,
            outbound: Arc::clone(&socket),
            listener: Arc::clone(listener),
            activity: Arc::clone(&activity),
            idle_timeout: self.inner.idle_timeout,
            codec: self.inner.codec.clone(),
            table: Arc::downgrade(&self.inner),
        }));

        info!(
            "NAT entry created for {} via {}",
            key,
            socket.local_addr().map(|a| a.to_string()).unwrap_or_default()
        );

        entries.insert(
            key,
            NatEntry {
                id,
                owner,
                socket: Arc::clone(&socket),
                activity,
                task,
            },
        );

        Ok(socket)
    }

    /// Remove every entry created by `owner`, closing their sockets
    pub async fn evict_owner(&self, owner: AssociationId) -> usize {
        let mut entries = self.inner.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = entry.owner != owner;
            if !keep {
                debug!("Evicting NAT entry for {}", key);
            }
            keep
        });
        before - entries.len()
    }

    /// Number of active entries
    pub async fn len(&self) -> usize {
        self.inner.entries.lock().await.len()
    }

    /// Whether the table has no entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether an entry exists for `client`
    pub async fn contains(&self, client: &SocketAddr) -> bool {
        self.inner
            .entries
            .lock()
            .await
            .contains_key(&client.to_string())
    }

    /// Local address of the outbound socket serving `client`
    ///
    /// The socket binds the unspecified address, so only the port identifies it.
    pub async fn outbound_addr(&self, client: &SocketAddr) -> Option<SocketAddr> {
        let entries = self.inner.entries.lock().await;
        entries
            .get(&client.to_string())
            .and_then(|e| e.socket.local_addr().ok())
    }

    /// Last time traffic passed through the entry for `client`
    pub async fn last_activity(&self, client: &SocketAddr) -> Option<Instant> {
        let entries = self.inner.entries.lock().await;
        entries.get(&client.to_string()).map(|e| e.activity.last())
    }
}

impl std::fmt::Debug for NatTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatTable")
            .field("idle_timeout", &self.inner.idle_timeout)
            .finish()
    }
}

struct ReplyTask {
    key: String,
    id: u64,
    client: SocketAddr,
    outbound: Arc<UdpSocket>,
    listener: Arc<UdpSocket>,
    activity: Arc<Activity>,
    idle_timeout: Duration,
    codec: Codec,
    table: Weak<NatInner>,
}

/// Relay datagrams arriving on the outbound socket back to the client
async fn reply_loop(task: ReplyTask) {
    loop {
        let idle = task.activity.last().elapsed();
        if idle >= task.idle_timeout {
            debug!("NAT entry for {} idle for {:?}", task.key, idle);
            break;
        }

        let mut buf = task.codec.buffer(BufferClass::Datagram);
        let recv = tokio::time::timeout(
            task.idle_timeout - idle,
            task.outbound.recv_from(buf.scratch()),
        )
        .await;

        let (len, from) = match recv {
            // Deadline reached; traffic in the other direction may have moved it
            Err(_) => continue,
            Ok(Err(e)) => {
                debug!("NAT entry for {} receive error: {}", task.key, e);
                break;
            }
            Ok(Ok(received)) => received,
        };
        task.activity.touch();

        let mut out = task.codec.buffer(BufferClass::Datagram);
        if let Err(e) = UdpEnvelope::encode_datagram(&TargetAddr::Ip(from), &buf[..len], &mut out) {
            warn!("Failed to wrap reply from {}: {}", from, e);
            continue;
        }
        if let Err(e) = task.listener.send_to(&out, task.client).await {
            warn!("Failed to send reply to {}: {}", task.client, e);
        }
        debug!("UDP reply: {} bytes from {} to {}", len, from, task.client);
    }

    if let Some(table) = task.table.upgrade() {
        if table.remove_if_id(&task.key, task.id).await {
            info!("NAT entry for {} removed", task.key);
        }
    }
}
