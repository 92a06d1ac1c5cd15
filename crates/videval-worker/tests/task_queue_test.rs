use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use videval_worker::{JobError, TaskQueue, TaskQueueConfig};

fn config(max_workers: usize, capacity: usize) -> TaskQueueConfig {
    TaskQueueConfig {
        max_workers,
        capacity,
        poll_interval_ms: 10,
        monitor_interval_ms: 50,
    }
}

/// A job that reports when it starts and then blocks until released.
fn gated() -> (
    impl std::future::Future<Output = anyhow::Result<&'static str>> + Send + 'static,
    oneshot::Receiver<()>,
    oneshot::Sender<()>,
) {
    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let job = async move {
        let _ = started_tx.send(());
        let _ = release_rx.await;
        Ok("gated")
    };
    (job, started_rx, release_tx)
}

async fn wait_for_workers(queue: &TaskQueue, expected: usize) -> bool {
    for _ in 0..200 {
        if queue.worker_count().await == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_job_result_is_delivered() {
    let queue = TaskQueue::new(config(2, 10));

    let handle = queue.submit("answer", async { Ok(42) }).unwrap();
    assert_eq!(handle.name(), "answer");
    assert_eq!(handle.wait().await.unwrap(), 42);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_job_error_is_reported_as_failed() {
    let queue = TaskQueue::new(config(1, 10));

    let handle = queue
        .submit("broken", async { Err::<(), _>(anyhow::anyhow!("disk on fire")) })
        .unwrap();
    match handle.wait().await {
        Err(JobError::Failed(e)) => assert_eq!(e.to_string(), "disk on fire"),
        other => panic!("expected Failed, got {:?}", other.map(|_| ())),
    }

    // a failing job does not take its worker down
    assert_eq!(queue.worker_count().await, 1);
    assert_eq!(queue.submit("next", async { Ok(1) }).unwrap().wait().await.unwrap(), 1);

    queue.shutdown().await;
}

/// A panicking job resolves its handle and the monitor replaces its worker.
#[tokio::test]
async fn test_panicked_worker_is_restarted() {
    let queue = TaskQueue::new(config(2, 10));
    assert_eq!(queue.worker_count().await, 2);

    let handle = queue
        .submit("explodes", async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        })
        .unwrap();
    match handle.wait().await {
        Err(JobError::Panicked(message)) => assert_eq!(message, "kaboom"),
        other => panic!("expected Panicked, got {:?}", other),
    }

    assert!(wait_for_workers(&queue, 2).await, "worker was not restarted");

    let mut handles = Vec::new();
    for i in 0..4 {
        handles.push(queue.submit(format!("after-{}", i), async move { Ok(i) }).unwrap());
    }
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.wait().await.unwrap(), i);
    }

    queue.shutdown().await;
}

#[tokio::test]
async fn test_single_worker_runs_jobs_in_submission_order() {
    let queue = TaskQueue::new(config(1, 10));
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..5 {
        let order = Arc::clone(&order);
        handles.push(
            queue
                .submit(format!("job-{}", i), async move {
                    order.lock().await.push(i);
                    Ok(())
                })
                .unwrap(),
        );
    }
    for handle in handles {
        handle.wait().await.unwrap();
    }

    assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_submit_rejects_when_queue_is_full() {
    let queue = TaskQueue::new(config(1, 1));

    let (job, started, release) = gated();
    let running = queue.submit("running", job).unwrap();
    started.await.unwrap();

    let waiting = queue.submit("waiting", async { Ok("waiting") }).unwrap();
    assert!(matches!(
        queue.submit("overflow", async { Ok("overflow") }),
        Err(JobError::QueueFull)
    ));

    release.send(()).unwrap();
    assert_eq!(running.wait().await.unwrap(), "gated");
    assert_eq!(waiting.wait().await.unwrap(), "waiting");

    queue.shutdown().await;
}

/// Shutdown lets the running job finish and cancels the ones still queued.
#[tokio::test]
async fn test_shutdown_drains_and_cancels_queued_jobs() {
    let queue = Arc::new(TaskQueue::new(config(1, 1)));

    let (job, started, release) = gated();
    let running = queue.submit("running", job).unwrap();
    started.await.unwrap();
    let queued = queue.submit("queued", async { Ok("queued") }).unwrap();

    let stopping = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.shutdown().await })
    };

    // the queue is full until shutdown starts, then submissions are refused
    let mut refused = false;
    for _ in 0..200 {
        match queue.submit("late", async { Ok("late") }) {
            Err(JobError::ShuttingDown) => {
                refused = true;
                break;
            }
            Err(JobError::QueueFull) => tokio::time::sleep(Duration::from_millis(5)).await,
            Ok(_) => panic!("submission accepted while the queue is full"),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert!(refused, "shutdown never started");

    release.send(()).unwrap();
    stopping.await.unwrap();

    assert_eq!(running.wait().await.unwrap(), "gated");
    assert!(matches!(queued.wait().await, Err(JobError::Cancelled)));
    assert_eq!(queue.worker_count().await, 0);
}
