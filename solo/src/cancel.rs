//! Cooperative cancellation.
//!
//! A worker never interrupts the job it runs. Canceling only raises a flag;
//! the job body has to poll it and return early on its own, either through the
//! [`CancelToken`] it was handed or through [`is_canceled`](crate::is_canceled).

use std::fmt;

use crate::loom::sync::{
  atomic::{AtomicU8, Ordering},
  Arc,
};

/// Cancellation status of a worker's current (or last) job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CancelState {
  NotCanceled = 0,
  /// Canceled before the worker picked the job up. The body is skipped.
  BeforeStart = 1,
  /// Canceled while the body was running. Observed only if the body polls.
  DuringRun = 2,
}

impl CancelState {
  pub fn is_canceled(self) -> bool {
    self != CancelState::NotCanceled
  }

  fn from_u8(value: u8) -> Self {
    match value {
      0 => CancelState::NotCanceled,
      1 => CancelState::BeforeStart,
      2 => CancelState::DuringRun,
      _ => unreachable!("invalid cancel state {value}"),
    }
  }
}

pub(crate) struct CancelFlag(AtomicU8);

impl CancelFlag {
  pub(crate) fn new() -> Self {
    Self(AtomicU8::new(CancelState::NotCanceled as u8))
  }

  pub(crate) fn load(&self) -> CancelState {
    CancelState::from_u8(self.0.load(Ordering::Acquire))
  }

  pub(crate) fn store(&self, state: CancelState) {
    self.0.store(state as u8, Ordering::Release);
  }
}

/// Handle to one worker's cancel flag.
///
/// Handed to bodies started with [`Job::start_cancelable`](crate::Job::start_cancelable),
/// and obtainable from [`Worker::token`](crate::Worker::token). Cloning is cheap.
#[derive(Clone)]
pub struct CancelToken(Arc<CancelFlag>);

#[cfg(test)]
static_assertions::assert_impl_all!(CancelToken: Send, Sync);

impl CancelToken {
  pub(crate) fn new(flag: Arc<CancelFlag>) -> Self {
    Self(flag)
  }

  pub fn is_canceled(&self) -> bool {
    self.state().is_canceled()
  }

  pub fn state(&self) -> CancelState {
    self.0.load()
  }
}

impl fmt::Debug for CancelToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("CancelToken").field(&self.state()).finish()
  }
}

#[cfg(all(test, not(loom)))]
mod tests {
  use super::*;

  #[test]
  fn token_observes_flag() {
    let flag = Arc::new(CancelFlag::new());
    let token = CancelToken::new(flag.clone());
    assert!(!token.is_canceled());

    flag.store(CancelState::DuringRun);
    assert_eq!(token.clone().state(), CancelState::DuringRun);
    assert!(token.is_canceled());

    flag.store(CancelState::NotCanceled);
    assert!(!token.is_canceled());
  }
}
