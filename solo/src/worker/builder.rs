use crate::{
  context,
  error::SpawnError,
  loom::{sync::Arc, thread},
};

use super::{shared::Shared, Worker, WorkerId};

/// Thread configuration for a [`Worker`].
///
/// ```rust
/// use solo::worker::Builder;
///
/// let worker = Builder::new().name("indexer").stack_size(256 * 1024).spawn().unwrap();
/// assert!(!worker.is_working());
/// ```
#[derive(Debug, Default)]
pub struct Builder {
  name: Option<String>,
  stack_size: Option<usize>,
}

impl Builder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Thread name. Defaults to `solo-worker-<id>`.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn stack_size(mut self, size: usize) -> Self {
    self.stack_size = Some(size);
    self
  }

  /// Spawns the worker thread, parked until a job is started.
  pub fn spawn(self) -> Result<Worker, SpawnError> {
    let id = WorkerId::next();
    let shared = Arc::new(Shared::new(id));

    let mut builder = thread::Builder::new()
      .name(self.name.unwrap_or_else(|| format!("solo-worker-{id}")));
    if let Some(size) = self.stack_size {
      builder = builder.stack_size(size);
    }

    let thread_shared = shared.clone();
    let handle = builder.spawn(move || {
      let span = tracing::error_span!("solo-worker", id = %thread_shared.id());
      let _guard = span.enter();
      let _context = context::enter(thread_shared.token());

      thread_shared.run();
    })?;

    tracing::trace!(worker_id = %id, "initialized");
    Ok(Worker { shared, thread: Some(handle) })
  }
}
