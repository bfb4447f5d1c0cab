use crate::vtq::Vtq;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;

fn new_store() -> Vtq {
    let conn = Connection::open_in_memory().unwrap();
    Vtq::migrate(&conn).unwrap();
    Vtq::new(Arc::new(Mutex::new(conn)), Duration::from_millis(100))
}

#[test]
fn publish_then_claim_then_ack() {
    let vtq = new_store();
    let id = vtq.publish("jobs", b"hello".to_vec()).unwrap();

    let job = vtq.claim("jobs", None).unwrap().expect("job should be claimable");
    assert_eq!(job.id, id);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.payload, b"hello");

    // Claimed again immediately: invisible until visibility elapses.
    assert!(vtq.claim("jobs", None).unwrap().is_none());

    vtq.ack(&id).unwrap();
    assert!(vtq.get(&id).unwrap().is_none());
}

#[test]
fn nack_makes_claimable_again_immediately() {
    let vtq = new_store();
    let id = vtq.publish("jobs", b"x".to_vec()).unwrap();
    vtq.claim("jobs", None).unwrap().unwrap();
    assert!(vtq.claim("jobs", None).unwrap().is_none());

    vtq.nack(&id).unwrap();
    let job = vtq.claim("jobs", None).unwrap().expect("nacked job reclaimable");
    assert_eq!(job.attempts, 2);
}

#[test]
fn attempts_strictly_non_decreasing_across_claims() {
    let vtq = new_store();
    let id = vtq.publish("jobs", b"x".to_vec()).unwrap();
    let mut last = 0;
    for _ in 0..3 {
        let job = vtq.claim("jobs", None).unwrap().unwrap();
        assert!(job.attempts > last);
        last = job.attempts;
        vtq.nack(&id).unwrap();
    }
}

#[test]
fn batch_claim_respects_limit_and_order() {
    let vtq = new_store();
    for i in 0..5 {
        vtq.publish_with_id(&format!("job-{i}"), "jobs", vec![i as u8]).unwrap();
    }
    let jobs = vtq.batch_claim("jobs", 3, None).unwrap();
    assert_eq!(jobs.len(), 3);
    let remaining = vtq.batch_claim("jobs", 10, None).unwrap();
    assert_eq!(remaining.len(), 2);
}

#[test]
fn leader_election_second_claim_waits_for_expiry() {
    let vtq = new_store();
    vtq.publish_with_id("leader-row", "leaders", Vec::new()).unwrap();

    // Contender A claims first.
    let a = vtq.claim("leaders", Some(Duration::from_millis(50))).unwrap();
    assert!(a.is_some());

    // Contender B immediately fails: A is considered alive.
    let b = vtq.claim("leaders", Some(Duration::from_millis(50))).unwrap();
    assert!(b.is_none());

    std::thread::sleep(Duration::from_millis(70));

    // B now succeeds: A is considered dead.
    let b = vtq.claim("leaders", Some(Duration::from_millis(50))).unwrap();
    assert!(b.is_some());
}

#[tokio::test]
async fn run_acks_on_success_and_nacks_on_error() {
    let vtq = new_store();
    let ok_id = vtq.publish("jobs", b"ok".to_vec()).unwrap();
    let _fail_id = vtq.publish("jobs", b"fail".to_vec()).unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    let vtq_clone = vtq.clone();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move {
        vtq_clone
            .run(
                "jobs",
                Duration::from_millis(5),
                None,
                Some(Duration::from_millis(20)),
                cancel_clone,
                |job, _cancel| async move {
                    if job.payload == b"ok" {
                        Ok(())
                    } else {
                        Err("boom".to_string())
                    }
                },
            )
            .await;
    });

    tokio::time::sleep(Duration::from_millis(60)).await;
    cancel.cancel();
    let _ = handle.await;

    assert!(vtq.get(&ok_id).unwrap().is_none(), "ok job should be acked/deleted");
}

#[tokio::test]
async fn run_batch_nacks_a_handler_that_finishes_after_cancellation() {
    let vtq = new_store();
    let id = vtq.publish("batch", b"slow".to_vec()).unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    let vtq_clone = vtq.clone();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move {
        vtq_clone
            .run_batch(
                "batch",
                Duration::from_millis(5),
                4,
                4,
                None,
                Some(Duration::from_secs(30)),
                cancel_clone,
                |_job, job_cancel| async move {
                    job_cancel.cancelled().await;
                    Ok(())
                },
            )
            .await;
    });

    // Give the loop time to claim the job and start the handler before
    // cancelling mid-flight.
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    let _ = handle.await;

    let job = vtq.get(&id).unwrap().expect("nacked job should still exist");
    assert_eq!(job.visible_at, 0, "job should be immediately reclaimable after cancellation");
}
