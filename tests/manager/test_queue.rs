//! Unit tests for `SessionCreationQueue`
//!
//! Tests FIFO ordering, failure isolation and the inter-job delay

use std::sync::Arc;
use std::time::Duration;

use kodegen_agent_fleet::error::FleetError;
use kodegen_agent_fleet::manager::SessionCreationQueue;
use parking_lot::Mutex;
use tokio::time::Instant;

#[tokio::test]
async fn test_jobs_run_in_submission_order() {
    let queue = SessionCreationQueue::new(Duration::ZERO);
    let order = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let order = order.clone();
            queue.enqueue(format!("job-{i}"), async move {
                // Later jobs finish faster; order must still hold.
                tokio::time::sleep(Duration::from_millis(5 * (5 - i))).await;
                order.lock().push(i);
                Ok(i)
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.wait().await.unwrap(), i as u64);
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn test_failing_job_does_not_stop_queue() {
    let queue = SessionCreationQueue::new(Duration::ZERO);

    let failing = queue.enqueue("bad", async {
        Err::<(), _>(FleetError::command("bad", "boom"))
    });
    let next = queue.enqueue("good", async { Ok("done") });

    assert!(matches!(
        failing.wait().await,
        Err(FleetError::CommandFailure { .. })
    ));
    assert_eq!(next.wait().await.unwrap(), "done");
}

#[tokio::test]
async fn test_panicking_job_does_not_stop_queue() {
    let queue = SessionCreationQueue::new(Duration::ZERO);

    let panicking = queue.enqueue("panics", async {
        if true {
            panic!("job exploded");
        }
        Ok(())
    });
    let next = queue.enqueue("after", async { Ok(7) });

    assert!(matches!(
        panicking.wait().await,
        Err(FleetError::QueueClosed(_))
    ));
    assert_eq!(next.wait().await.unwrap(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_delay_between_consecutive_jobs() {
    let queue = SessionCreationQueue::new(Duration::from_millis(1000));

    let first = queue.enqueue("first", async { Ok(Instant::now()) });
    let second = queue.enqueue("second", async { Ok(Instant::now()) });

    let first_at = first.wait().await.unwrap();
    let second_at = second.wait().await.unwrap();
    assert!(second_at >= first_at + Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_worker_restarts_after_draining() {
    let queue = SessionCreationQueue::new(Duration::from_millis(1000));

    let start = Instant::now();
    queue.enqueue("one", async { Ok(()) }).wait().await.unwrap();
    // The last job of a batch is not followed by a delay.
    assert!(start.elapsed() < Duration::from_millis(1000));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!queue.is_processing());

    queue.enqueue("two", async { Ok(()) }).wait().await.unwrap();
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn test_job_ids_are_unique() {
    let queue = SessionCreationQueue::new(Duration::ZERO);
    let a = queue.enqueue("a", async { Ok(()) });
    let b = queue.enqueue("b", async { Ok(()) });
    assert_ne!(a.id(), b.id());
    a.wait().await.unwrap();
    b.wait().await.unwrap();
}
