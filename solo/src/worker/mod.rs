//! The untyped single-job worker.
//!
//! A [`Worker`] owns one background thread and runs at most one job on it at
//! a time. Jobs take no arguments and report failure through
//! `Result<(), BoxError>` or by panicking; [`Job`](crate::Job) layers a typed
//! result slot on top.

mod builder;
pub(crate) mod shared;

use std::{
  fmt,
  sync::atomic::{AtomicUsize, Ordering},
};

pub use builder::Builder;
use shared::Shared;

use crate::{
  cancel::{CancelState, CancelToken},
  context,
  error::{BoxError, JobError, SpawnError},
  loom::{sync::Arc, thread::JoinHandle},
};

/// Process-unique worker identifier, used in thread names and log spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

impl WorkerId {
  fn next() -> Self {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
    Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }
}

impl fmt::Display for WorkerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// A dedicated thread that runs one job at a time.
///
/// ```rust
/// use solo::Worker;
///
/// let worker = Worker::new().unwrap();
///
/// assert!(worker.start(|| Ok(())));
/// worker.wait();
/// assert!(worker.rethrow().is_ok());
/// ```
///
/// # Drop behavior
///
/// Dropping a worker cancels the outstanding job, waits for it to return and
/// joins the thread. No job outlives its worker. An error nobody collected is
/// logged and discarded; use [`Worker::shutdown`] to receive it instead.
pub struct Worker {
  shared: Arc<Shared>,
  thread: Option<JoinHandle<()>>,
}

#[cfg(test)]
static_assertions::assert_impl_all!(Worker: Send, Sync);

impl Worker {
  /// Spawns a worker with the default [`Builder`] settings.
  pub fn new() -> Result<Self, SpawnError> {
    Builder::new().spawn()
  }

  pub fn builder() -> Builder {
    Builder::new()
  }

  pub fn id(&self) -> WorkerId {
    self.shared.id()
  }

  /// Hands `task` to the worker thread.
  ///
  /// Returns `false` without running anything if a job is still pending or
  /// running, if another thread is inside [`cancel`](Worker::cancel), or if
  /// the worker is shutting down. A successful start clears the previous error and cancel state.
  #[must_use = "a rejected job never runs"]
  pub fn start<F>(&self, task: F) -> bool
  where
    F: FnOnce() -> Result<(), BoxError> + Send + 'static,
  {
    self.shared.start(Box::new(task))
  }

  /// Blocks until no job is pending or running. Returns immediately when idle.
  pub fn wait(&self) {
    self.shared.wait();
  }

  /// Asks the current job to stop, waits for it and surfaces its error.
  ///
  /// A job the thread has not picked up yet is skipped entirely. A running job
  /// is only told to stop; it keeps running until it polls
  /// [`is_canceled`](crate::is_canceled) or its [`CancelToken`] and returns.
  /// Canceling an idle worker does nothing lasting: the next start resets the flag.
  pub fn cancel(&self) -> Result<(), JobError> {
    self.shared.cancel()
  }

  /// Snapshot of whether a job is pending or running.
  pub fn is_working(&self) -> bool {
    self.shared.is_working()
  }

  pub fn is_canceled(&self) -> bool {
    self.cancel_state().is_canceled()
  }

  pub fn cancel_state(&self) -> CancelState {
    self.shared.cancel_state()
  }

  /// Whether the worker owning the calling thread has been canceled.
  ///
  /// Same as [`crate::is_canceled`].
  pub fn is_current_canceled() -> bool {
    context::is_canceled()
  }

  /// Takes the error captured by the last run, if any.
  ///
  /// The error is handed out once; a second call returns `Ok(())`.
  pub fn rethrow(&self) -> Result<(), JobError> {
    self.shared.rethrow()
  }

  pub fn token(&self) -> CancelToken {
    self.shared.token()
  }

  /// Cancels the outstanding job, joins the thread and returns the last
  /// run's uncollected error.
  pub fn shutdown(mut self) -> Result<(), JobError> {
    self.teardown()
  }

  fn teardown(&mut self) -> Result<(), JobError> {
    let Some(thread) = self.thread.take() else {
      return Ok(());
    };

    let outcome = self.shared.cancel();
    self.shared.request_shutdown();

    if thread.join().is_err() {
      tracing::error!(worker_id = %self.id(), "worker thread panicked outside of a job");
    }
    tracing::debug!(worker_id = %self.id(), "joined");

    outcome
  }
}

impl Drop for Worker {
  fn drop(&mut self) {
    if let Err(err) = self.teardown() {
      tracing::warn!(worker_id = %self.id(), error = %err, "discarding uncollected job error");
    }
  }
}

impl fmt::Debug for Worker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Worker")
      .field("id", &self.id())
      .field("working", &self.is_working())
      .field("cancel", &self.cancel_state())
      .finish()
  }
}

#[cfg(all(test, not(loom)))]
mod tests {
  use std::{io, sync::mpsc, time::Duration};

  use super::*;

  #[test]
  fn start_rejects_while_busy() {
    let worker = Worker::new().unwrap();
    let (release, parked) = mpsc::channel::<()>();

    assert!(worker.start(move || {
      parked.recv().ok();
      Ok(())
    }));
    assert!(worker.is_working());
    assert!(!worker.start(|| unreachable!("second job ran")));

    release.send(()).unwrap();
    worker.wait();
    assert!(!worker.is_working());
    assert!(worker.start(|| Ok(())));
  }

  #[test]
  fn wait_on_idle_worker_returns() {
    let worker = Worker::new().unwrap();
    worker.wait();
    worker.wait();
    assert!(worker.rethrow().is_ok());
  }

  #[test]
  fn error_is_surfaced_once_and_cleared_by_next_start() {
    let worker = Worker::new().unwrap();

    assert!(worker.start(|| Err(io::Error::other("test").into())));
    worker.wait();

    let err = worker.rethrow().unwrap_err();
    assert_eq!(err.to_string(), "test");
    assert!(worker.rethrow().is_ok());

    assert!(worker.start(|| Err("stale".into())));
    worker.wait();

    assert!(worker.start(|| Ok(())));
    worker.wait();
    assert!(worker.rethrow().is_ok());
  }

  #[test]
  fn panic_does_not_kill_the_loop() {
    let worker = Worker::new().unwrap();

    assert!(worker.start(|| panic!("boom")));
    worker.wait();
    assert_eq!(worker.rethrow().unwrap_err().panic_message(), Some("boom"));

    let (tx, rx) = mpsc::channel();
    assert!(worker.start(move || {
      tx.send(7).unwrap();
      Ok(())
    }));
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(7));
  }

  #[test]
  fn cancel_reaches_running_job_through_context() {
    let worker = Worker::new().unwrap();
    let (started_tx, started) = mpsc::channel();

    assert!(worker.start(move || {
      started_tx.send(()).unwrap();
      while !crate::is_canceled() {
        std::thread::sleep(Duration::from_millis(1));
      }
      Err("stopped".into())
    }));

    started.recv().unwrap();
    let err = worker.cancel().unwrap_err();
    assert_eq!(err.to_string(), "stopped");
    assert_eq!(worker.cancel_state(), CancelState::DuringRun);
    assert!(!worker.is_working());
  }

  #[test]
  fn cancel_keeps_error_while_other_thread_starts() {
    for _ in 0..50 {
      let worker = Arc::new(Worker::new().unwrap());
      let (started_tx, started) = mpsc::channel();
      let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

      assert!(worker.start(move || {
        started_tx.send(()).unwrap();
        while !crate::is_canceled() {
          std::thread::sleep(Duration::from_millis(1));
        }
        Err("stopped".into())
      }));
      started.recv().unwrap();

      let starter = {
        let worker = worker.clone();
        let done = done.clone();
        std::thread::spawn(move || {
          while !worker.is_canceled() {
            std::thread::yield_now();
          }
          while !done.load(Ordering::Acquire) {
            let _ = worker.start(|| Ok(()));
          }
        })
      };

      let err = worker.cancel().unwrap_err();
      done.store(true, Ordering::Release);
      starter.join().unwrap();

      assert_eq!(err.to_string(), "stopped");
    }
  }

  #[test]
  fn shutdown_returns_uncollected_error() {
    let worker = Worker::builder().name("shutdown-test").spawn().unwrap();

    assert!(worker.start(|| Err("left behind".into())));
    worker.wait();

    assert_eq!(worker.shutdown().unwrap_err().to_string(), "left behind");
  }

  #[test]
  fn thread_carries_configured_name() {
    let worker = Worker::builder().name("named-worker").spawn().unwrap();
    let (tx, rx) = mpsc::channel();

    assert!(worker.start(move || {
      tx.send(std::thread::current().name().map(str::to_owned)).unwrap();
      Ok(())
    }));

    assert_eq!(rx.recv().unwrap().as_deref(), Some("named-worker"));
  }
}
