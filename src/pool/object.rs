//! Typed object pool
//!
//! One pool instance per concrete type. Values are created on demand,
//! recycled on return, and kept up to a fixed idle limit.

use super::guard::Pooled;
use super::stats::{PoolStats, PoolStatsSnapshot};
use super::Recycle;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// A pool of reusable values of type `T`
pub struct ObjectPool<T> {
    inner: Arc<Shared<T>>,
}

pub(crate) struct Shared<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
    init: fn() -> T,
    stats: PoolStats,
}

impl<T: Recycle> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // A panic while holding the lock cannot leave the Vec half-updated
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn take(&self) -> T {
        self.stats.record_acquired();
        match self.lock().pop() {
            Some(value) => value,
            None => {
                self.stats.record_created();
                (self.init)()
            }
        }
    }

    pub(crate) fn put(&self, mut value: T) {
        if !value.recycle() {
            self.stats.record_discarded();
            return;
        }
        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(value);
            self.stats.record_returned();
        } else {
            self.stats.record_discarded();
        }
    }

    pub(crate) fn detached(&self) {
        self.stats.record_discarded();
    }
}

impl<T: Recycle> ObjectPool<T> {
    /// Create a pool that keeps at most `max_idle` values between borrows
    pub fn new(max_idle: usize, init: fn() -> T) -> Self {
        ObjectPool {
            inner: Arc::new(Shared {
                idle: Mutex::new(Vec::with_capacity(max_idle)),
                max_idle,
                init,
                stats: PoolStats::new(),
            }),
        }
    }

    /// Borrow a value; it goes back to the pool when the guard is released or dropped
    pub fn get(&self) -> Pooled<T> {
        Pooled::new(self.inner.take(), Arc::clone(&self.inner))
    }

    /// Borrow a raw value without a guard. The caller must hand it to [`ObjectPool::put`].
    pub(crate) fn take(&self) -> T {
        self.inner.take()
    }

    /// Return a raw value taken with [`ObjectPool::take`]
    pub(crate) fn put(&self, value: T) {
        self.inner.put(value)
    }

    /// Drop a raw value taken with [`ObjectPool::take`] instead of keeping it
    pub(crate) fn discard(&self, value: T) {
        drop(value);
        self.inner.detached();
    }

    /// Number of values waiting for reuse
    pub fn idle_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Current statistics
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.inner.stats.snapshot()
    }
}

impl<T> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        ObjectPool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("type", &std::any::type_name::<T>())
            .field("max_idle", &self.inner.max_idle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Scratch {
        data: Vec<u8>,
    }

    impl Recycle for Scratch {
        fn recycle(&mut self) -> bool {
            self.data.clear();
            true
        }
    }

    #[test]
    fn test_get_creates_when_empty() {
        let pool: ObjectPool<Scratch> = ObjectPool::new(4, Scratch::default);
        let value = pool.get();
        assert!(value.data.is_empty());
        assert_eq!(pool.stats().total_created, 1);
        assert_eq!(pool.stats().in_use(), 1);
    }

    #[test]
    fn test_value_is_reused_and_recycled() {
        let pool: ObjectPool<Scratch> = ObjectPool::new(4, Scratch::default);
        {
            let mut value = pool.get();
            value.data.extend_from_slice(b"hello");
        }
        assert_eq!(pool.idle_count(), 1);

        let value = pool.get();
        assert!(value.data.is_empty());
        assert!(value.data.capacity() >= 5);
        assert_eq!(pool.stats().total_created, 1);
    }

    #[test]
    fn test_max_idle_is_respected() {
        let pool: ObjectPool<Scratch> = ObjectPool::new(1, Scratch::default);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);

        assert_eq!(pool.idle_count(), 1);
        let stats = pool.stats();
        assert_eq!(stats.total_returned, 1);
        assert_eq!(stats.total_discarded, 1);
        assert_eq!(stats.in_use(), 0);
    }

    #[test]
    fn test_take_put_raw() {
        let pool: ObjectPool<Scratch> = ObjectPool::new(2, Scratch::default);
        let value = pool.take();
        assert_eq!(pool.stats().in_use(), 1);
        pool.put(value);
        assert_eq!(pool.stats().in_use(), 0);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_discard_is_not_kept() {
        let pool: ObjectPool<Scratch> = ObjectPool::new(2, Scratch::default);
        let value = pool.take();
        pool.discard(value);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.stats().total_discarded, 1);
        assert_eq!(pool.stats().in_use(), 0);
    }

    #[test]
    fn test_clone_shares_storage() {
        let pool: ObjectPool<Scratch> = ObjectPool::new(2, Scratch::default);
        let other = pool.clone();
        drop(other.get());
        assert_eq!(pool.idle_count(), 1);
    }
}
