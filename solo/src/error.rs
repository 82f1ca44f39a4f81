use std::{any::Any, fmt, io};

use thiserror::Error;

/// Error type accepted from fallible job bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The backing worker thread could not be spawned.
#[derive(Error, Debug)]
#[error("couldn't create new job worker")]
pub struct SpawnError(#[from] io::Error);

/// Failure of the most recent job run on a worker.
///
/// A captured error is handed to the submitting thread exactly once: by
/// [`Worker::rethrow`](crate::Worker::rethrow), [`Worker::cancel`](crate::Worker::cancel)
/// or the [`Job`](crate::Job) accessors built on them. The next successful start clears it.
#[derive(Error, Debug)]
pub enum JobError {
  /// The job body panicked. The original payload is kept.
  #[error("job panicked: {0}")]
  Panicked(Panic),

  /// The job body returned an error. Display and source are forwarded to it.
  #[error(transparent)]
  Failed(BoxError),

  /// The job was canceled before its body started, so it produced no value.
  #[error("job was canceled before it started")]
  Canceled,
}

impl JobError {
  pub fn is_panic(&self) -> bool {
    matches!(self, JobError::Panicked(_))
  }

  pub fn is_canceled(&self) -> bool {
    matches!(self, JobError::Canceled)
  }

  /// Message of a panic raised with a `&str` or `String` payload.
  pub fn panic_message(&self) -> Option<&str> {
    match self {
      JobError::Panicked(panic) => panic.message(),
      _ => None,
    }
  }

  /// Borrows the error returned by a fallible job body as its concrete type.
  pub fn downcast_ref<E>(&self) -> Option<&E>
  where
    E: std::error::Error + 'static,
  {
    match self {
      JobError::Failed(err) => err.downcast_ref::<E>(),
      _ => None,
    }
  }

  /// Re-raises the failure on the calling thread.
  ///
  /// A panic is resumed with its original payload. Other variants panic with
  /// their display message.
  pub fn resume_unwind(self) -> ! {
    match self {
      JobError::Panicked(panic) => std::panic::resume_unwind(panic.into_payload()),
      other => panic!("{other}"),
    }
  }
}

/// Payload of a panic caught on a worker thread.
pub struct Panic {
  message: Option<String>,
  payload: Box<dyn Any + Send + 'static>,
}

impl Panic {
  pub(crate) fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
    let message = payload
      .downcast_ref::<&str>()
      .map(|message| (*message).to_owned())
      .or_else(|| payload.downcast_ref::<String>().cloned());

    Self { message, payload }
  }

  pub fn message(&self) -> Option<&str> {
    self.message.as_deref()
  }

  pub fn payload(&self) -> &(dyn Any + Send + 'static) {
    &*self.payload
  }

  pub fn into_payload(self) -> Box<dyn Any + Send + 'static> {
    self.payload
  }
}

impl fmt::Debug for Panic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Panic")
      .field("message", &self.message)
      .field("payload", &"{...}")
      .finish()
  }
}

impl fmt::Display for Panic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.message().unwrap_or("Box<dyn Any>"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn panic_message_from_str_and_string() {
    let from_str = Panic::new(Box::new("boom"));
    assert_eq!(from_str.message(), Some("boom"));

    let from_string = Panic::new(Box::new(String::from("bang")));
    assert_eq!(from_string.to_string(), "bang");

    let opaque = Panic::new(Box::new(7u32));
    assert_eq!(opaque.message(), None);
    assert_eq!(opaque.payload().downcast_ref::<u32>(), Some(&7));
  }

  #[test]
  fn failed_keeps_concrete_type() {
    let err = JobError::Failed(Box::new(io::Error::other("test")));

    assert_eq!(err.to_string(), "test");
    assert_eq!(
      err.downcast_ref::<io::Error>().map(io::Error::kind),
      Some(io::ErrorKind::Other)
    );
    assert!(!err.is_panic());
  }

  #[test]
  fn failed_reports_inner_message_once() {
    let inner = io::Error::other("disk full");
    let err = JobError::Failed(Box::new(inner));

    let mut chain = vec![err.to_string()];
    let mut source = std::error::Error::source(&err);
    while let Some(next) = source {
      chain.push(next.to_string());
      source = next.source();
    }

    assert_eq!(chain, ["disk full"]);
  }

  #[test]
  fn resume_unwind_keeps_payload() {
    let err = JobError::Panicked(Panic::new(Box::new(42i64)));

    let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
      move || {
        err.resume_unwind();
      },
    ))
    .expect_err("resume_unwind returned");

    assert_eq!(payload.downcast_ref::<i64>(), Some(&42));
  }
}
