//! Typed, get-once handle over a [`Worker`].
//!
//! A [`Job<T>`] wraps a closure returning `T` into the worker's untyped
//! contract and parks the returned value in a slot next to the worker. The
//! value is collected with [`Job::get`] or [`Job::pick`] once the run is over.
//! `Job<()>` is the variant for closures without a result.

use std::{fmt, mem};

use crate::{
  cancel::CancelToken,
  context,
  error::{BoxError, JobError, SpawnError},
  loom::sync::{Arc, Mutex},
  worker::{Builder, Worker},
};

enum Phase<T> {
  Unstarted,
  Started,
  Ready(T),
  // Value picked, or outcome already surfaced as an error.
  Consumed,
}

/// A reusable single-job handle with its own worker thread.
///
/// ```rust
/// let mut job = solo::Job::new().unwrap();
///
/// assert!(job.start(|| 6 * 7));
/// assert_eq!(job.get().ok(), Some(&42));
///
/// // The same thread takes the next job once this one is done.
/// assert!(job.start(|| 1));
/// assert_eq!(job.pick().ok(), Some(1));
/// ```
///
/// # Drop behavior
///
/// Dropping a `Job` cancels whatever it still runs, blocks until the body
/// returns and joins the thread.
pub struct Job<T> {
  worker: Option<Worker>,
  slot: Arc<Mutex<Option<T>>>,
  phase: Phase<T>,
}

#[cfg(test)]
static_assertions::assert_impl_all!(Job<u32>: Send);

/// Spawns a [`Job`] and starts `f` on it.
pub fn spawn<T, F>(f: F) -> Result<Job<T>, SpawnError>
where
  T: Send + 'static,
  F: FnOnce() -> T + Send + 'static,
{
  let mut job = Job::new()?;
  let started = job.start(f);
  debug_assert!(started, "fresh worker rejected its first job");
  Ok(job)
}

impl<T> Job<T>
where
  T: Send + 'static,
{
  pub fn new() -> Result<Self, SpawnError> {
    Self::with_builder(Builder::new())
  }

  pub fn with_builder(builder: Builder) -> Result<Self, SpawnError> {
    Ok(Self::from_worker(builder.spawn()?))
  }

  fn from_worker(worker: Worker) -> Self {
    Job { worker: Some(worker), slot: Arc::new(Mutex::new(None)), phase: Phase::Unstarted }
  }

  fn empty() -> Self {
    Job { worker: None, slot: Arc::new(Mutex::new(None)), phase: Phase::Unstarted }
  }

  /// Starts `f` on the worker thread.
  ///
  /// Returns `false` if the previous job hasn't finished yet or the handle is
  /// empty; `f` is dropped without running in that case.
  #[must_use = "a rejected job never runs"]
  pub fn start<F>(&mut self, f: F) -> bool
  where
    F: FnOnce() -> T + Send + 'static,
  {
    self.submit(move || Ok(f()))
  }

  /// Starts `f(arg)`. On rejection `arg` is dropped along with `f`.
  #[must_use = "a rejected job never runs"]
  pub fn start_with<F, A>(&mut self, f: F, arg: A) -> bool
  where
    F: FnOnce(A) -> T + Send + 'static,
    A: Send + 'static,
  {
    self.submit(move || Ok(f(arg)))
  }

  /// Starts `f` with the worker's [`CancelToken`], for bodies that poll for
  /// cancellation.
  ///
  /// ```rust
  /// let mut job = solo::Job::new().unwrap();
  ///
  /// assert!(job.start_cancelable(|token| {
  ///   let mut spins = 0u64;
  ///   while !token.is_canceled() {
  ///     spins += 1;
  ///     std::thread::yield_now();
  ///   }
  ///   spins
  /// }));
  ///
  /// job.cancel().unwrap();
  /// assert!(job.is_finished());
  /// ```
  #[must_use = "a rejected job never runs"]
  pub fn start_cancelable<F>(&mut self, f: F) -> bool
  where
    F: FnOnce(&CancelToken) -> T + Send + 'static,
  {
    let Some(token) = self.token() else {
      return false;
    };
    self.submit(move || Ok(f(&token)))
  }

  /// Starts a fallible `f`. An `Err` is surfaced as [`JobError::Failed`],
  /// keeping its concrete type.
  #[must_use = "a rejected job never runs"]
  pub fn try_start<F, E>(&mut self, f: F) -> bool
  where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    E: Into<BoxError>,
  {
    self.submit(move || f().map_err(Into::into))
  }

  fn submit<F>(&mut self, f: F) -> bool
  where
    F: FnOnce() -> Result<T, BoxError> + Send + 'static,
  {
    let Some(worker) = &self.worker else {
      tracing::debug!("couldn't start working, job handle is empty");
      return false;
    };

    // Held across the start so a stale value can't be cleared after the new
    // body already wrote its own.
    let mut slot = self.slot.lock();

    let body_slot = self.slot.clone();
    let started = worker.start(move || {
      let value = f()?;
      *body_slot.lock() = Some(value);
      Ok(())
    });

    if started {
      *slot = None;
      self.phase = Phase::Started;
    }
    started
  }

  /// Waits for the job and returns a reference to its value.
  ///
  /// A captured error takes precedence over the value and is returned once.
  /// A job canceled before its body ran yields [`JobError::Canceled`].
  ///
  /// # Panics
  ///
  /// If no job was started, if the outcome was already consumed by
  /// [`pick`](Job::pick) or an earlier error, or if the handle is empty.
  pub fn get(&mut self) -> Result<&T, JobError> {
    self.settle()?;

    match &self.phase {
      Phase::Ready(value) => Ok(value),
      _ => unreachable!("settled job without a value"),
    }
  }

  /// Like [`get`](Job::get) but moves the value out.
  ///
  /// # Panics
  ///
  /// Same conditions as [`get`](Job::get).
  pub fn pick(&mut self) -> Result<T, JobError> {
    self.settle()?;

    match mem::replace(&mut self.phase, Phase::Consumed) {
      Phase::Ready(value) => Ok(value),
      _ => unreachable!("settled job without a value"),
    }
  }

  fn settle(&mut self) -> Result<(), JobError> {
    let Some(worker) = &self.worker else {
      panic!("job result requested from an empty handle");
    };

    match self.phase {
      Phase::Unstarted => panic!("job result requested before a job was started"),
      Phase::Consumed => panic!("job outcome was already consumed"),
      Phase::Ready(_) => return Ok(()),
      Phase::Started => {}
    }

    worker.wait();
    if let Err(err) = worker.rethrow() {
      self.phase = Phase::Consumed;
      return Err(err);
    }

    match self.slot.lock().take() {
      Some(value) => {
        self.phase = Phase::Ready(value);
        Ok(())
      }
      None => {
        self.phase = Phase::Consumed;
        Err(JobError::Canceled)
      }
    }
  }

  /// Blocks until the current job, if any, is over. Nothing is consumed.
  pub fn wait(&self) {
    if let Some(worker) = &self.worker {
      worker.wait();
    }
  }

  /// `true` when nothing is pending: never started, done, or empty.
  pub fn is_finished(&self) -> bool {
    self.worker.as_ref().map_or(true, |worker| !worker.is_working())
  }

  /// Cancels the current job and waits for it. See [`Worker::cancel`].
  ///
  /// Does nothing on an idle or empty handle. An error returned here counts
  /// as the run's outcome, so a following `get`/`pick` panics as consumed.
  pub fn cancel(&mut self) -> Result<(), JobError> {
    let Some(worker) = &self.worker else {
      return Ok(());
    };

    let outcome = worker.cancel();
    if outcome.is_err() && matches!(self.phase, Phase::Started) {
      self.phase = Phase::Consumed;
    }
    outcome
  }

  /// Whether the job running on the calling thread has been canceled.
  ///
  /// Same as [`crate::is_canceled`].
  pub fn is_canceled() -> bool {
    context::is_canceled()
  }

  pub fn token(&self) -> Option<CancelToken> {
    self.worker.as_ref().map(Worker::token)
  }

  pub fn worker(&self) -> Option<&Worker> {
    self.worker.as_ref()
  }

  /// Moves everything this handle owns into a new handle.
  ///
  /// `self` is left empty: it reports finished, rejects every start,
  /// treats cancel as a no-op and panics on `get`/`pick`.
  pub fn take(&mut self) -> Job<T> {
    mem::replace(self, Job::empty())
  }

  pub fn is_empty(&self) -> bool {
    self.worker.is_none()
  }
}

impl<T> fmt::Debug for Job<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let phase = match self.phase {
      Phase::Unstarted => "unstarted",
      Phase::Started => "started",
      Phase::Ready(_) => "ready",
      Phase::Consumed => "consumed",
    };

    f.debug_struct("Job").field("worker", &self.worker).field("phase", &phase).finish()
  }
}
