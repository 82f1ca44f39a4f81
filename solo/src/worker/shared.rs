use std::panic::{self, AssertUnwindSafe};

use crate::{
  cancel::{CancelFlag, CancelState, CancelToken},
  error::{BoxError, JobError, Panic},
  loom::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex,
  },
};

use super::WorkerId;

pub(crate) type Task = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'static>;

#[derive(Default)]
struct State {
  // Submitted but not yet picked up by the worker thread.
  task: Option<Task>,
  // Pending or running. Cleared by the worker thread once the run is over.
  busy: bool,
  running: bool,
  // Threads inside `cancel`. Starts are refused until the last of them has
  // taken the canceled run's error.
  cancelers: usize,
  error: Option<JobError>,
}

/// State shared between a [`Worker`](super::Worker) and its thread.
pub(crate) struct Shared {
  id: WorkerId,
  state: Mutex<State>,
  has_work: Condvar,
  is_done: Condvar,
  cancel: Arc<CancelFlag>,
  shutdown: AtomicBool,
}

impl Shared {
  pub(crate) fn new(id: WorkerId) -> Self {
    Shared {
      id,
      state: Mutex::new(State::default()),
      has_work: Condvar::new(),
      is_done: Condvar::new(),
      cancel: Arc::new(CancelFlag::new()),
      shutdown: AtomicBool::new(false),
    }
  }

  pub(crate) fn id(&self) -> WorkerId {
    self.id
  }

  pub(crate) fn token(&self) -> CancelToken {
    CancelToken::new(self.cancel.clone())
  }

  pub(crate) fn cancel_state(&self) -> CancelState {
    self.cancel.load()
  }

  pub(crate) fn start(&self, task: Task) -> bool {
    let mut state = self.state.lock();

    if self.shutdown.load(Ordering::Acquire) {
      tracing::debug!(worker_id = %self.id, "couldn't start working, worker is shut down");
      return false;
    }

    if state.busy {
      tracing::debug!(worker_id = %self.id, "couldn't start working, worker is busy");
      return false;
    }

    if state.cancelers > 0 {
      tracing::debug!(worker_id = %self.id, "couldn't start working, cancel in progress");
      return false;
    }

    state.task = Some(task);
    state.busy = true;
    state.error = None;
    self.cancel.store(CancelState::NotCanceled);

    tracing::trace!(worker_id = %self.id, "starting to work");
    self.has_work.notify_one();
    true
  }

  /// Body of the worker thread. Returns once shutdown has been requested.
  pub(crate) fn run(&self) {
    while self.run_once() {}
  }

  /// Waits for one task and runs or skips it. Returns `false` on shutdown.
  fn run_once(&self) -> bool {
    let (task, canceled) = {
      let mut state = self.state.lock();

      while state.task.is_none() && !self.shutdown.load(Ordering::Acquire) {
        tracing::trace!("waiting for work");
        self.has_work.wait(&mut state);
      }

      if self.shutdown.load(Ordering::Acquire) {
        tracing::debug!("shut down signal received, shutting down");
        return false;
      }

      let Some(task) = state.task.take() else { return true };
      state.running = true;

      (task, self.cancel.load() == CancelState::BeforeStart)
    };

    let outcome = if canceled {
      tracing::debug!("canceled before start, skipping job");
      discard(task)
    } else {
      execute(task)
    };

    let mut state = self.state.lock();
    state.error = outcome.err();
    state.running = false;
    state.busy = false;

    tracing::trace!(failed = state.error.is_some(), "finished job");
    self.is_done.notify_all();
    true
  }

  pub(crate) fn wait(&self) {
    let mut state = self.state.lock();
    while state.busy {
      tracing::trace!(worker_id = %self.id, "waiting for the worker to finish its job");
      self.is_done.wait(&mut state);
    }
  }

  /// Raises the cancel flag, waits for the outstanding job and takes its error.
  ///
  /// The decision between `BeforeStart` and `DuringRun` is taken under the
  /// lock so it can't race the worker thread picking the task up. Starts are
  /// refused from the moment the flag is raised until the error has been taken.
  pub(crate) fn cancel(&self) -> Result<(), JobError> {
    let mut state = self.state.lock();

    let requested = if state.running {
      CancelState::DuringRun
    } else {
      CancelState::BeforeStart
    };
    self.cancel.store(requested);
    state.cancelers += 1;

    tracing::debug!(worker_id = %self.id, ?requested, busy = state.busy, "cancel requested");

    while state.busy {
      self.is_done.wait(&mut state);
    }

    state.cancelers -= 1;
    match state.error.take() {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  pub(crate) fn is_working(&self) -> bool {
    self.state.lock().busy
  }

  pub(crate) fn rethrow(&self) -> Result<(), JobError> {
    match self.state.lock().error.take() {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  /// Tells the worker thread to leave its loop. Only called once the worker is idle.
  pub(crate) fn request_shutdown(&self) {
    let state = self.state.lock();
    debug_assert!(!state.busy, "shutdown requested while a job is outstanding");

    self.shutdown.store(true, Ordering::Release);
    tracing::debug!(worker_id = %self.id, "shut down signal sent");
    self.has_work.notify_all();
  }
}

// Captured values may panic while being dropped.
fn discard(task: Task) -> Result<(), JobError> {
  panic::catch_unwind(AssertUnwindSafe(move || drop(task))).map_err(|payload| {
    let panic = Panic::new(payload);
    tracing::debug!(panic_message = panic.message(), "skipped job panicked on drop");
    JobError::Panicked(panic)
  })
}

fn execute(task: Task) -> Result<(), JobError> {
  match panic::catch_unwind(AssertUnwindSafe(task)) {
    Ok(Ok(())) => Ok(()),
    Ok(Err(err)) => {
      tracing::debug!(error = %err, "job returned an error");
      Err(JobError::Failed(err))
    }
    Err(payload) => {
      let panic = Panic::new(payload);
      tracing::debug!(panic_message = panic.message(), "job panicked");
      Err(JobError::Panicked(panic))
    }
  }
}
