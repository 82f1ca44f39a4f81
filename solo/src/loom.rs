#![allow(unused_imports)]

pub(crate) mod sync {
  #[cfg(loom)]
  pub(crate) use loom::sync::Arc;
  #[cfg(not(loom))]
  pub(crate) use std::sync::Arc;

  // Poison-free mutex. Jobs run under catch_unwind and never while the lock
  // is held, so a poisoned lock only ever means a bug in this crate.
  pub(crate) struct Mutex<T> {
    #[cfg(not(loom))]
    inner: parking_lot::Mutex<T>,
    #[cfg(loom)]
    inner: loom::sync::Mutex<T>,
  }

  impl<T> Mutex<T> {
    pub(crate) fn new(value: T) -> Self {
      Self {
        #[cfg(not(loom))]
        inner: parking_lot::Mutex::new(value),
        #[cfg(loom)]
        inner: loom::sync::Mutex::new(value),
      }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
      #[cfg(not(loom))]
      {
        MutexGuard { inner: self.inner.lock() }
      }
      #[cfg(loom)]
      {
        MutexGuard {
          inner: Some(
            self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
          ),
        }
      }
    }
  }

  pub(crate) struct MutexGuard<'a, T> {
    #[cfg(not(loom))]
    inner: parking_lot::MutexGuard<'a, T>,
    // Vacant only while parked inside `Condvar::wait`.
    #[cfg(loom)]
    inner: Option<loom::sync::MutexGuard<'a, T>>,
  }

  impl<T> std::ops::Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
      #[cfg(not(loom))]
      {
        &self.inner
      }
      #[cfg(loom)]
      {
        self.inner.as_ref().expect("guard vacated outside of Condvar::wait")
      }
    }
  }

  impl<T> std::ops::DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
      #[cfg(not(loom))]
      {
        &mut self.inner
      }
      #[cfg(loom)]
      {
        self.inner.as_mut().expect("guard vacated outside of Condvar::wait")
      }
    }
  }

  pub(crate) struct Condvar {
    #[cfg(not(loom))]
    inner: parking_lot::Condvar,
    #[cfg(loom)]
    inner: loom::sync::Condvar,
  }

  impl Condvar {
    pub(crate) fn new() -> Self {
      Self {
        #[cfg(not(loom))]
        inner: parking_lot::Condvar::new(),
        #[cfg(loom)]
        inner: loom::sync::Condvar::new(),
      }
    }

    /// Atomically releases the lock behind `guard` and blocks until notified.
    /// The lock is held again when this returns.
    pub(crate) fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
      #[cfg(not(loom))]
      {
        self.inner.wait(&mut guard.inner);
      }
      #[cfg(loom)]
      {
        let held =
          guard.inner.take().expect("guard vacated outside of Condvar::wait");
        guard.inner = Some(
          self.inner.wait(held).unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
      }
    }

    pub(crate) fn notify_one(&self) {
      self.inner.notify_one();
    }

    pub(crate) fn notify_all(&self) {
      self.inner.notify_all();
    }
  }

  pub(crate) mod atomic {
    #[cfg(loom)]
    pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU8, Ordering};
    #[cfg(not(loom))]
    pub(crate) use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
  }
}

#[cfg(loom)]
pub(crate) use loom::thread;

#[cfg(not(loom))]
pub(crate) use std::thread;

#[cfg(loom)]
pub(crate) use loom::thread_local;

#[cfg(not(loom))]
pub(crate) use std::thread_local;
