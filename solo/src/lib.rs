//! Single-job worker threads with cooperative cancellation.
//!
//! A [`Worker`] owns one background thread and runs at most one job on it at a
//! time. A [`Job<T>`] wraps a worker with a typed result slot, so a closure can
//! be started, waited for and its value collected:
//!
//! ```rust
//! use solo::Job;
//!
//! let mut job: Job<i32> = Job::new().unwrap();
//! assert!(job.start(|| 42));
//! assert_eq!(job.pick().unwrap(), 42);
//! ```
//!
//! Panics and returned errors inside a job never reach the worker thread's
//! loop. They are captured as a [`JobError`] and handed back to the submitting
//! thread by the next `get`, `pick` or `cancel`.
//!
//! Cancellation is cooperative. [`Job::cancel`] raises a flag and blocks until
//! the body returns. A body that never checks [`is_canceled`] (or its
//! [`CancelToken`]) runs to completion.

mod loom;

pub mod cancel;
mod context;
pub mod error;
pub mod job;
pub mod worker;

pub use cancel::{CancelState, CancelToken};
pub use context::{current, is_canceled};
pub use error::{BoxError, JobError, Panic, SpawnError};
pub use job::{spawn, Job};
pub use worker::Worker;
