#![cfg(loom)]

use loom::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};
use solo::{Job, JobError, Worker};

#[test]
fn start_then_wait() {
  loom::model(|| {
    let worker = Worker::new().unwrap();
    assert!(worker.start(|| Ok(())));
    worker.wait();
    assert!(!worker.is_working());
    assert!(worker.rethrow().is_ok());
  })
}

#[test]
fn cancel_races_pickup() {
  loom::model(|| {
    let ran = Arc::new(AtomicBool::new(false));
    let mut job = Job::new().unwrap();

    let flag = ran.clone();
    assert!(job.start(move || {
      flag.store(true, Ordering::SeqCst);
      1u8
    }));
    job.cancel().unwrap();
    assert!(job.is_finished());

    // Either the body ran to completion or it was skipped; never half of each.
    match job.pick() {
      Ok(value) => {
        assert_eq!(value, 1);
        assert!(ran.load(Ordering::SeqCst));
      }
      Err(JobError::Canceled) => assert!(!ran.load(Ordering::SeqCst)),
      Err(err) => panic!("unexpected error: {err}"),
    }
  })
}

#[test]
fn second_start_rejected_until_done() {
  loom::model(|| {
    let worker = Worker::new().unwrap();
    assert!(worker.start(|| Ok(())));

    let accepted = worker.start(|| Err("second".into()));
    worker.wait();
    assert!(!worker.is_working());

    // The captured error belongs to whichever run finished last.
    assert_eq!(worker.rethrow().is_err(), accepted);
  })
}

#[test]
fn drop_joins_running_job() {
  loom::model(|| {
    let finished = Arc::new(AtomicBool::new(false));
    {
      let worker = Worker::new().unwrap();
      let flag = finished.clone();
      assert!(worker.start(move || {
        flag.store(true, Ordering::SeqCst);
        Ok(())
      }));
    }
    // Ran or skipped, the body and everything it captured are gone.
    assert_eq!(Arc::strong_count(&finished), 1);
  })
}

#[test]
fn error_handed_over_once() {
  loom::model(|| {
    let worker = Worker::new().unwrap();
    assert!(worker.start(|| Err("boom".into())));
    worker.wait();

    assert!(worker.rethrow().is_err());
    assert!(worker.rethrow().is_ok());
  })
}
