use std::{
  panic::{self, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
  },
  thread,
  time::Duration,
};

use solo::{Job, JobError};
use tracing::Level;

type Outcome = Result<(), Box<dyn std::error::Error>>;

fn check(condition: bool, what: &str) -> Outcome {
  if condition {
    Ok(())
  } else {
    Err(format!("check failed: {what}").into())
  }
}

fn scenario(name: &str, body: impl FnOnce() -> Outcome) -> bool {
  let passed = match panic::catch_unwind(AssertUnwindSafe(body)) {
    Ok(Ok(())) => true,
    Ok(Err(err)) => {
      tracing::error!(scenario = name, error = %err);
      false
    }
    Err(_) => false,
  };

  tracing::info!("---{name}: {}", if passed { "PASSED" } else { "FAILED" });
  passed
}

fn spin_until_canceled(flag: Arc<AtomicBool>) -> impl FnOnce() + Send + 'static {
  move || {
    while !solo::is_canceled() {
      thread::sleep(Duration::from_millis(1));
    }
    flag.store(true, Ordering::SeqCst);
  }
}

fn main() {
  tracing_subscriber::fmt().with_max_level(Level::INFO).init();

  let results = [
    scenario("Basic execution", || {
      let mut job = Job::new()?;
      check(job.start(|| 42), "start accepted")?;
      check(*job.get()? == 42, "result is 42")
    }),
    scenario("Void jobs", || {
      let executed = Arc::new(AtomicBool::new(false));
      let mut job: Job<()> = Job::new()?;
      let flag = executed.clone();
      check(job.start(move || flag.store(true, Ordering::SeqCst)), "start accepted")?;
      job.get()?;
      check(executed.load(Ordering::SeqCst), "side effect happened")
    }),
    scenario("Exception handling", || {
      let mut job: Job<()> = Job::new()?;
      check(job.start(|| panic!("test")), "start accepted")?;
      match job.get() {
        Err(err) => check(err.panic_message() == Some("test"), "panic message kept"),
        Ok(_) => check(false, "error surfaced"),
      }
    }),
    scenario("Cancellation", || {
      let canceled = Arc::new(AtomicBool::new(false));
      let mut job = Job::new()?;
      check(job.start(spin_until_canceled(canceled.clone())), "start accepted")?;
      thread::sleep(Duration::from_millis(100));
      job.cancel()?;
      check(canceled.load(Ordering::SeqCst), "body observed cancel")
    }),
    scenario("Automatic scope cancellation", || {
      let canceled = Arc::new(AtomicBool::new(false));
      {
        let mut job = Job::new()?;
        check(job.start(spin_until_canceled(canceled.clone())), "start accepted")?;
        thread::sleep(Duration::from_millis(100));
      }
      check(canceled.load(Ordering::SeqCst), "drop canceled and joined")
    }),
    scenario("Move semantics", || {
      let mut job1 = Job::new()?;
      check(job1.start(|| 123), "start accepted")?;
      let mut job2 = job1.take();
      check(*job2.get()? == 123, "moved handle yields result")?;
      check(job1.is_finished(), "source reports finished")
    }),
    scenario("Cancellation during execution", || {
      let progress = Arc::new(AtomicUsize::new(0));
      let mut job = Job::new()?;
      let seen = progress.clone();
      check(
        job.start_cancelable(move |token| {
          for i in 0..10 {
            if token.is_canceled() {
              break;
            }
            seen.store(i + 1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
          }
        }),
        "start accepted",
      )?;
      thread::sleep(Duration::from_millis(250));
      job.cancel()?;
      let progress = progress.load(Ordering::SeqCst);
      check(progress > 0 && progress < 10, "stopped part way")
    }),
    scenario("Immediate cancellation", || {
      let mut job = Job::new()?;
      job.cancel()?;
      check(job.is_finished(), "idle after cancel")?;
      // Canceling an idle job is not sticky: the next start is accepted.
      check(job.start(|| "runs"), "start accepted after cancel")?;
      match job.pick() {
        Ok(value) => check(value == "runs", "fresh job ran"),
        Err(JobError::Canceled) => check(false, "fresh job was not canceled"),
        Err(err) => Err(err.into()),
      }
    }),
  ];

  let failed = results.iter().filter(|passed| !**passed).count();
  if failed > 0 {
    tracing::error!(failed, "some scenarios failed");
    std::process::exit(1);
  }
}
