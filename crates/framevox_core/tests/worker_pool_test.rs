//! # Worker Pool Integration Tests
//!
//! Barrier, reconfiguration and failure isolation under real threads.
//!
//! Run with: cargo test --package framevox_core --test worker_pool_test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded};
use framevox_core::{
    DeferredTask, Invokable, PoolError, TaskError, TaskFailure, WorkerPool,
};

/// Test: 4 workers drain 10,000 no-op tasks and the barrier releases.
#[test]
fn test_ten_thousand_noop_tasks() {
    let pool = WorkerPool::new(4).unwrap();

    let tasks: Vec<Arc<DeferredTask<()>>> = (0..10_000)
        .map(|_| {
            let task = Arc::new(DeferredTask::new(|| ()));
            pool.submit(task.clone()).unwrap();
            task
        })
        .collect();

    pool.wait_all();

    assert_eq!(pool.active_count(), 0);
    assert!(tasks.iter().all(|task| task.is_complete()));
    let stats = pool.stats();
    assert_eq!(stats.submitted, 10_000);
    assert_eq!(stats.completed, 10_000);
    assert_eq!(stats.failed, 0);
}

/// Test: reconfiguring with 50 queued, unstarted tasks drains them.
#[test]
fn test_set_thread_count_drains_queue() {
    let pool = Arc::new(WorkerPool::new(4).unwrap());
    let (release_tx, release_rx) = bounded::<()>(0);
    let (started_tx, started_rx) = unbounded::<()>();

    // Occupy every worker until the gate opens
    let blockers: Vec<_> = (0..4)
        .map(|_| {
            let release_rx = release_rx.clone();
            let started_tx = started_tx.clone();
            pool.spawn(move || {
                started_tx.send(()).unwrap();
                // Returns once the sender is dropped
                let _ = release_rx.recv();
            })
            .unwrap()
        })
        .collect();
    for _ in 0..4 {
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    let ran = Arc::new(AtomicUsize::new(0));
    let queued: Vec<_> = (0..50)
        .map(|_| {
            let ran = Arc::clone(&ran);
            pool.spawn(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        })
        .collect();
    assert!(queued.iter().all(|handle| !pool.is_task_complete(handle.id())));

    let reconfig = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.set_thread_count(2))
    };

    while pool.is_accepting() {
        thread::yield_now();
    }
    // Halting: new work is refused while the old workers wind down
    assert!(matches!(
        pool.spawn(|| ()),
        Err(PoolError::SubmissionRejected)
    ));

    drop(release_tx);
    reconfig.join().unwrap().unwrap();

    // In-flight tasks finished, queued ones never ran
    assert!(blockers.iter().all(|handle| handle.wait().is_ok()));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    for handle in &queued {
        assert!(pool.is_task_complete(handle.id()));
        assert_eq!(
            handle.result(),
            Err(TaskError::Failed(TaskFailure::Discarded))
        );
    }

    assert_eq!(pool.thread_count(), 2);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.tracked_count(), 0);
    assert_eq!(pool.stats().drained, 50);

    // Fresh workers pick up new work
    let handle = pool.spawn(|| 5).unwrap();
    assert_eq!(handle.result(), Ok(5));
    pool.wait_all();
}

/// Test: a shutdown issued mid-reconfiguration still holds afterwards.
#[test]
fn test_shutdown_during_reconfiguration_sticks() {
    let pool = Arc::new(WorkerPool::new(1).unwrap());
    let (release_tx, release_rx) = bounded::<()>(0);
    let (started_tx, started_rx) = unbounded::<()>();

    let blocker = pool
        .spawn(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let reconfig = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.set_thread_count(2))
    };
    while pool.is_accepting() {
        thread::yield_now();
    }

    pool.shutdown();
    drop(release_tx);
    reconfig.join().unwrap().unwrap();

    assert!(blocker.wait().is_ok());
    assert!(!pool.is_accepting());
    assert!(matches!(
        pool.spawn(|| ()),
        Err(PoolError::SubmissionRejected)
    ));
    pool.wait_all();
    assert_eq!(pool.active_count(), 0);
}

/// Test: wait(id) blocks until that specific task completes.
#[test]
fn test_wait_single_task() {
    let pool = WorkerPool::new(2).unwrap();
    let (release_tx, release_rx) = bounded::<()>(0);

    let task = Arc::new(DeferredTask::new(move || {
        let _ = release_rx.recv();
        "done"
    }));
    let id = pool.submit(task.clone()).unwrap();
    assert!(!pool.is_task_complete(id));

    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        drop(release_tx);
    });

    pool.wait(id);
    assert!(task.is_complete());
    assert!(task.has_started());
    assert_eq!(task.result(), Ok("done"));
    opener.join().unwrap();
}

/// Test: failing tasks neither stop workers nor leak into other tasks.
#[test]
fn test_failures_are_isolated() {
    let pool = WorkerPool::new(3).unwrap();

    let handles: Vec<_> = (0..30u32)
        .map(|i| {
            pool.spawn(move || {
                assert!(i % 3 != 0, "task {i} failed on purpose");
                i
            })
            .unwrap()
        })
        .collect();
    let fallible = Arc::new(DeferredTask::fallible(|| "x".parse::<u32>()));
    pool.submit(fallible.clone()).unwrap();

    pool.wait_all();

    for (i, handle) in handles.iter().enumerate() {
        let i = u32::try_from(i).unwrap();
        if i % 3 == 0 {
            assert!(matches!(
                handle.result(),
                Err(TaskError::Failed(TaskFailure::Panicked(_)))
            ));
        } else {
            assert_eq!(handle.result(), Ok(i));
        }
    }
    assert!(matches!(
        fallible.result(),
        Err(TaskError::Failed(TaskFailure::Errored(_)))
    ));
    assert_eq!(pool.stats().failed, 11);
}

/// Test: tasks start in submission order on a single worker.
#[test]
fn test_fifo_start_order() {
    let pool = WorkerPool::new(1).unwrap();
    let (order_tx, order_rx) = unbounded::<usize>();

    for i in 0..20 {
        let order_tx = order_tx.clone();
        pool.spawn(move || order_tx.send(i).unwrap()).unwrap();
    }
    pool.wait_all();
    drop(order_tx);

    let order: Vec<usize> = order_rx.iter().collect();
    assert_eq!(order, (0..20).collect::<Vec<_>>());
}

/// Test: dropping the pool finishes queued work and joins the workers.
#[test]
fn test_drop_joins_workers() {
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let pool = WorkerPool::new(2).unwrap();
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
    }
    assert_eq!(counter.load(Ordering::SeqCst), 100);
}
