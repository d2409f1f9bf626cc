//! Per-key mutual exclusion.
//!
//! A [`KeyLock`] is a capacity-one async mutex with a disposal flag. Disposal
//! does not wake or fail current waiters: they still get the guard, see
//! [`KeyLockGuard::is_disposed`] and bail out. That keeps the lock usable as
//! the single point where stale work is detected.

use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard};

/// Async mutex guarding one pool.
#[derive(Debug)]
pub struct KeyLock<T> {
    mutex: Mutex<T>,
    disposed: AtomicBool,
}

impl<T> KeyLock<T> {
    /// Creates an undisposed lock around `value`.
    pub fn new(value: T) -> Self {
        Self {
            mutex: Mutex::new(value),
            disposed: AtomicBool::new(false),
        }
    }

    /// Waits for the lock. Waiters are served in FIFO order.
    pub async fn lock(&self) -> KeyLockGuard<'_, T> {
        KeyLockGuard {
            guard: self.mutex.lock().await,
            disposed: &self.disposed,
        }
    }

    /// Takes the lock if nobody holds it.
    pub fn try_lock(&self) -> Option<KeyLockGuard<'_, T>> {
        self.mutex.try_lock().ok().map(|guard| KeyLockGuard {
            guard,
            disposed: &self.disposed,
        })
    }

    /// Marks the lock disposed. Returns `true` on the first call.
    pub fn dispose(&self) -> bool {
        !self.disposed.swap(true, Ordering::SeqCst)
    }

    /// Returns `true` once the lock was disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Scoped access to the value behind a [`KeyLock`]. Released on drop.
pub struct KeyLockGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    disposed: &'a AtomicBool,
}

impl<T> KeyLockGuard<'_, T> {
    /// Returns `true` if the lock was disposed, including while this guard
    /// was being waited for.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<T> Deref for KeyLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for KeyLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
