//! RAII guard for pooled values
//!
//! Provides automatic return of borrowed values to their pool when dropped,
//! so every exit path (including `?` early returns) gives the value back.

use super::object::Shared;
use super::Recycle;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// RAII guard that returns the value to its pool on drop
///
/// The guard is the exclusive owner of the value for the duration of the
/// borrow. Call [`Pooled::release`] to hand it back explicitly, or
/// [`Pooled::detach`] to keep it permanently.
pub struct Pooled<T: Recycle> {
    /// The value (Option to allow taking)
    value: Option<T>,
    /// Pool the value belongs to
    home: Arc<Shared<T>>,
}

impl<T: Recycle> Pooled<T> {
    pub(crate) fn new(value: T, home: Arc<Shared<T>>) -> Self {
        Pooled {
            value: Some(value),
            home,
        }
    }

    /// Return the value to the pool now
    pub fn release(self) {
        drop(self)
    }

    /// Take ownership of the value (won't return to pool)
    pub fn detach(mut self) -> T {
        self.home.detached();
        self.value.take().expect("pooled value already taken")
    }
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("pooled value already taken")
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("pooled value already taken")
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.home.put(value);
        }
    }
}

impl<T: Recycle + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => value.fmt(f),
            None => f.write_str("<released>"),
        }
    }
}

impl<T: Recycle + PartialEq> PartialEq<T> for Pooled<T> {
    fn eq(&self, other: &T) -> bool {
        self.value.as_ref() == Some(other)
    }
}
