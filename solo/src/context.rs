use std::cell::RefCell;

use crate::{cancel::CancelToken, loom::thread_local};

thread_local! {
  // Token of the worker that owns this thread. Empty on every other thread.
  static CONTEXT: RefCell<Option<CancelToken>> = RefCell::new(None);
}

pub(crate) fn with_context<F, R>(func: F) -> R
where
  F: FnOnce(&RefCell<Option<CancelToken>>) -> R,
{
  CONTEXT.with(func)
}

/// Registers `token` as the current worker of this thread until the guard drops.
pub(crate) fn enter(token: CancelToken) -> ContextDropper {
  with_context(|ctx| {
    if ctx.replace(Some(token)).is_some() {
      panic!("a thread can only be owned by one worker");
    }
  });

  ContextDropper
}

pub(crate) struct ContextDropper;

impl Drop for ContextDropper {
  fn drop(&mut self) {
    with_context(|ctx| {
      ctx.borrow_mut().take();
    });
  }
}

/// Token of the worker owning the calling thread, if any.
///
/// Lets a job body fetch its cancellation capability without having it passed in.
pub fn current() -> Option<CancelToken> {
  with_context(|ctx| ctx.borrow().clone())
}

/// Whether the worker owning the calling thread has been asked to cancel.
///
/// Returns `false` when called from a thread no worker owns, such as the
/// thread that submitted the job.
pub fn is_canceled() -> bool {
  with_context(|ctx| ctx.borrow().as_ref().is_some_and(CancelToken::is_canceled))
}

#[cfg(all(test, not(loom)))]
mod tests {
  use super::*;
  use crate::{
    cancel::{CancelFlag, CancelState},
    loom::sync::Arc,
  };

  #[test]
  fn unowned_thread_is_never_canceled() {
    assert!(current().is_none());
    assert!(!is_canceled());
  }

  #[test]
  fn enter_scopes_the_token() {
    let flag = Arc::new(CancelFlag::new());

    let guard = enter(CancelToken::new(flag.clone()));
    assert!(current().is_some());
    assert!(!is_canceled());

    flag.store(CancelState::BeforeStart);
    assert!(is_canceled());

    drop(guard);
    assert!(current().is_none());
    assert!(!is_canceled());
  }

  #[test]
  #[should_panic(expected = "one worker")]
  fn nested_enter_panics() {
    let flag = Arc::new(CancelFlag::new());
    let _first = enter(CancelToken::new(flag.clone()));
    let _second = enter(CancelToken::new(flag));
  }
}
