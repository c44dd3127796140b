//! Two-class scratch buffer pool
//!
//! Control buffers hold the largest negotiate/auth/request frame. Datagram
//! buffers hold one UDP datagram or one relay copy chunk.

use super::object::ObjectPool;
use super::stats::PoolStatsSnapshot;
use super::DEFAULT_MAX_IDLE;
use crate::socks::consts::{MAX_CONTROL_FRAME_LEN, UDP_BUFFER_SIZE};
use bytes::BytesMut;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Buffers that grew beyond this multiple of their class size are not kept
const MAX_GROWTH_FACTOR: usize = 4;

/// Size class of a pooled buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferClass {
    /// Control messages (negotiate, auth, request, reply)
    Control,
    /// UDP datagrams and stream relay chunks
    Datagram,
}

impl BufferClass {
    /// Minimum capacity of buffers in this class
    pub const fn capacity(self) -> usize {
        match self {
            BufferClass::Control => MAX_CONTROL_FRAME_LEN,
            BufferClass::Datagram => UDP_BUFFER_SIZE,
        }
    }
}

fn new_control() -> BytesMut {
    BytesMut::with_capacity(MAX_CONTROL_FRAME_LEN)
}

fn new_datagram() -> BytesMut {
    BytesMut::with_capacity(UDP_BUFFER_SIZE)
}

/// Pool of byte buffers in two size classes
#[derive(Clone, Debug)]
pub struct BufferPool {
    control: ObjectPool<BytesMut>,
    datagram: ObjectPool<BytesMut>,
}

impl BufferPool {
    /// Create a pool keeping at most `max_idle` idle buffers per class
    pub fn new(max_idle: usize) -> Self {
        BufferPool {
            control: ObjectPool::new(max_idle, new_control),
            datagram: ObjectPool::new(max_idle, new_datagram),
        }
    }

    fn pool_for(&self, class: BufferClass) -> &ObjectPool<BytesMut> {
        match class {
            BufferClass::Control => &self.control,
            BufferClass::Datagram => &self.datagram,
        }
    }

    /// Borrow an empty buffer of the given class
    pub fn acquire(&self, class: BufferClass) -> PooledBuffer {
        PooledBuffer {
            buf: Some(self.pool_for(class).take()),
            class,
            pool: self.clone(),
        }
    }

    /// Give a buffer back to the pool of its class, and only that pool
    fn release(&self, class: BufferClass, buf: BytesMut) {
        let pool = self.pool_for(class);
        if buf.capacity() > class.capacity() * MAX_GROWTH_FACTOR {
            pool.discard(buf);
        } else {
            pool.put(buf);
        }
    }

    /// Statistics for one size class
    pub fn stats(&self, class: BufferClass) -> PoolStatsSnapshot {
        self.pool_for(class).stats()
    }

    /// Idle buffers waiting in one size class
    pub fn idle_count(&self, class: BufferClass) -> usize {
        self.pool_for(class).idle_count()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

/// A borrowed buffer, returned to its class pool when dropped
pub struct PooledBuffer {
    buf: Option<BytesMut>,
    class: BufferClass,
    pool: BufferPool,
}

impl PooledBuffer {
    /// Size class this buffer came from
    pub fn class(&self) -> BufferClass {
        self.class
    }

    /// Zero-filled slice spanning the full class capacity, for socket reads
    pub fn scratch(&mut self) -> &mut [u8] {
        let len = self.class.capacity();
        let buf = &mut **self;
        buf.clear();
        buf.resize(len, 0);
        &mut buf[..]
    }

    /// Return the buffer to its pool now
    pub fn release(self) {
        drop(self)
    }
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        self.buf.as_ref().expect("buffer already released")
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buf.as_mut().expect("buffer already released")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(self.class, buf);
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("class", &self.class)
            .field("len", &self.buf.as_ref().map(|b| b.len()))
            .finish()
    }
}
