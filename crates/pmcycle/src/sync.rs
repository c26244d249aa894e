//! Lock primitives used by the idle gate and the worker pool.
//!
//! Wraps `parking_lot` so call sites never deal with lock poisoning. The
//! transition hooks do not use anything from here; they only touch atomics.

pub use std::sync::Arc;

pub use parking_lot::Condvar;

pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;

/// Mutex handing out guards that a [`Condvar`] can wait on.
pub struct Mutex<T> {
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new mutex protecting the given value.
    pub fn new(value: T) -> Self {
        Self {
            inner: parking_lot::Mutex::new(value),
        }
    }

    /// Acquires the mutex, blocking until it becomes available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
