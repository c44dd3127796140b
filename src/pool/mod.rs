//! Pooling for the SOCKS5 hot path
//!
//! This module provides reusable scratch buffers and decoded-message
//! structures so that steady-state relaying does not allocate. Every pool is
//! typed at compile time: one [`ObjectPool`] instance per concrete type.
//!
//! Borrows are exclusive. A borrowed value is owned by its [`Pooled`] guard
//! (or [`PooledBuffer`]) until released, and is returned on every exit path
//! because the guard gives it back on drop.

mod buffer;
mod guard;
mod object;
mod stats;

pub use buffer::{BufferClass, BufferPool, PooledBuffer};
pub use guard::Pooled;
pub use object::ObjectPool;
pub use stats::{PoolStats, PoolStatsSnapshot};

use bytes::BytesMut;

/// Default number of idle values kept per pool
pub const DEFAULT_MAX_IDLE: usize = 64;

/// A value that can be reset and handed to another borrower
pub trait Recycle {
    /// Reset the value for reuse. Returns `false` if it should be dropped
    /// instead of going back to the pool.
    fn recycle(&mut self) -> bool;
}

impl Recycle for BytesMut {
    fn recycle(&mut self) -> bool {
        self.clear();
        true
    }
}
