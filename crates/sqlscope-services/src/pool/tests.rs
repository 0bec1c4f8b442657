//! Tests for the worker pool

use super::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// A job that reports it started, then waits for a permit
fn blocking_job(
    started: mpsc::UnboundedSender<()>,
    gate: Arc<Semaphore>,
    completed: Arc<AtomicUsize>,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = started.send(());
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
        completed.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_requires_runtime() {
    assert!(matches!(WorkerPool::new(1, 1), Err(PoolError::NoRuntime)));
}

#[tokio::test]
async fn test_new_rejects_zero_sizes() {
    assert!(matches!(WorkerPool::new(0, 1), Err(PoolError::Invalid(_))));
    assert!(matches!(WorkerPool::new(1, 0), Err(PoolError::Invalid(_))));
}

// ============================================================================
// Overflow
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overflow_fails_fast_beyond_pool_plus_queue() {
    let pool = WorkerPool::new(2, 3).unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();

    // occupy both workers
    for _ in 0..2 {
        pool.try_submit(blocking_job(started_tx.clone(), gate.clone(), completed.clone()))
            .unwrap();
    }
    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(5), started_rx.recv())
            .await
            .expect("workers should pick up jobs")
            .unwrap();
    }

    // fill the queue
    for _ in 0..3 {
        pool.try_submit(blocking_job(started_tx.clone(), gate.clone(), completed.clone()))
            .unwrap();
    }

    // everything beyond pool_size + queue_capacity fails immediately
    for _ in 0..2 {
        let err = pool
            .try_submit(blocking_job(started_tx.clone(), gate.clone(), completed.clone()))
            .unwrap_err();
        match err {
            PoolError::Overflow(overflow) => assert_eq!(
                overflow,
                DispatchOverflowError {
                    pool_size: 2,
                    queue_capacity: 3,
                }
            ),
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    gate.add_permits(100);
    pool.shutdown().await;
    assert_eq!(completed.load(Ordering::SeqCst), 5);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_drains_queue_and_rejects_new_jobs() {
    let pool = WorkerPool::new(1, 10).unwrap();
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let completed = completed.clone();
        pool.try_submit(async move {
            tokio::task::yield_now().await;
            completed.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.shutdown().await;
    assert_eq!(completed.load(Ordering::SeqCst), 5);
    assert!(pool.is_closed());
    assert!(matches!(pool.try_submit(async {}), Err(PoolError::Closed)));
}

#[tokio::test]
async fn test_drop_lets_queued_jobs_finish() {
    let completed = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    {
        let pool = WorkerPool::new(1, 4).unwrap();
        for _ in 0..3 {
            let completed = completed.clone();
            let done_tx = done_tx.clone();
            pool.try_submit(async move {
                completed.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
            .unwrap();
        }
    }
    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
            .await
            .expect("queued job should still run")
            .unwrap();
    }
    assert_eq!(completed.load(Ordering::SeqCst), 3);
}
