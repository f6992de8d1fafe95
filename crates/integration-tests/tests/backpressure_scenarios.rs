//! End-to-end backpressure scenarios
//!
//! - Full queue rejects until a worker frees a slot
//! - Workers drain concurrently at the configured service time
//! - Drain-then-stop lets the in-flight item finish
//! - Runtime service time changes reach the next dequeued item

use slowpoke_core::application::WorkerPool;
use slowpoke_core::domain::{DomainError, PoolConfig, ServiceTimeSetting, ShutdownPolicy, WorkItem};
use slowpoke_core::port::completion::mocks::RecordingSink;
use slowpoke_core::port::time_provider::SystemTimeProvider;
use slowpoke_core::port::TaskOutcome;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

fn pool_with(
    workers: usize,
    capacity: usize,
    service_seconds: i64,
) -> (WorkerPool, Arc<ServiceTimeSetting>, Arc<RecordingSink>) {
    let setting = Arc::new(ServiceTimeSetting::new(service_seconds).unwrap());
    let sink = Arc::new(RecordingSink::new());
    let pool = WorkerPool::start(
        PoolConfig::new(workers, capacity),
        setting.clone(),
        sink.clone(),
        Arc::new(SystemTimeProvider),
    )
    .unwrap();
    (pool, setting, sink)
}

/// Capacity 2, one worker, zero service time: the third offer bounces,
/// a fourth succeeds once the worker has taken one
#[tokio::test(start_paused = true)]
async fn test_rejection_until_worker_drains() {
    let (pool, _setting, sink) = pool_with(1, 2, 0);
    let queue = pool.queue().clone();

    assert!(queue.try_enqueue(WorkItem::noop()).is_ok());
    assert!(queue.try_enqueue(WorkItem::noop()).is_ok());
    assert!(matches!(
        queue.try_enqueue(WorkItem::noop()),
        Err(DomainError::Rejected { capacity: 2 })
    ));

    sink.wait_for(1).await;
    assert!(queue.try_enqueue(WorkItem::noop()).is_ok());

    pool.shutdown(ShutdownPolicy::Drain).await.unwrap();
    assert_eq!(sink.count(TaskOutcome::is_success), 3);

    println!("✅ Scenario: full queue rejects, freed slot admits");
}

/// Two workers, ten one-second items: about five seconds end to end
#[tokio::test(start_paused = true)]
async fn test_two_workers_halve_drain_time() {
    let (pool, _setting, sink) = pool_with(2, 10, 1);

    for _ in 0..10 {
        pool.queue().try_enqueue(WorkItem::noop()).unwrap();
    }
    assert!(pool.queue().try_enqueue(WorkItem::noop()).is_err());

    let started = Instant::now();
    sink.wait_for(10).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(5), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "elapsed {:?}", elapsed);

    let per_worker = |id| {
        sink.reports()
            .iter()
            .filter(|r| r.worker_id == Some(id))
            .count()
    };
    assert_eq!(per_worker(0) + per_worker(1), 10);
    assert!(per_worker(0) > 0 && per_worker(1) > 0, "Both workers took items");

    pool.stop().await.unwrap();
    println!("✅ Scenario: workers drain concurrently");
}

/// Drain-then-stop: the in-flight item completes before its worker exits
#[tokio::test(start_paused = true)]
async fn test_drain_shutdown_completes_in_flight_item() {
    let (pool, _setting, sink) = pool_with(1, 4, 10);
    let finished = Arc::new(AtomicUsize::new(0));

    let counter = finished.clone();
    pool.queue()
        .try_enqueue(WorkItem::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    // Let the worker take the item and start its simulated delay
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(pool.queue().size(), 0);
    assert_eq!(finished.load(Ordering::SeqCst), 0);

    let started = Instant::now();
    let report = pool.shutdown(ShutdownPolicy::Drain).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(9));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(report.outcomes.completed, 1);
    assert_eq!(pool.live_workers(), 0);
    assert!(matches!(
        pool.queue().try_enqueue(WorkItem::noop()),
        Err(DomainError::QueueClosed)
    ));

    println!("✅ Scenario: drain-then-stop finishes in-flight work");
}

/// An operator write is seen by the next item, not the one in flight
#[tokio::test(start_paused = true)]
async fn test_runtime_tuning_applies_to_next_item() {
    let (pool, setting, sink) = pool_with(1, 4, 2);
    for _ in 0..3 {
        pool.queue().try_enqueue(WorkItem::noop()).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    setting.set(0).unwrap();

    sink.wait_for(3).await;
    let seen: Vec<Option<i64>> = sink.reports().iter().map(|r| r.service_seconds).collect();
    assert_eq!(seen, vec![Some(2), Some(0), Some(0)]);

    assert!(setting.set(-1).is_err());
    assert_eq!(pool.stats().service_seconds, 0);

    pool.stop().await.unwrap();
    println!("✅ Scenario: service time tunable without restart");
}

/// Many producers against a live pool: occupancy stays bounded and every
/// admitted item is reported exactly once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overload_is_bounded_and_accounted() {
    const CAPACITY: usize = 8;
    let setting = Arc::new(ServiceTimeSetting::new(1).unwrap());
    let sink = Arc::new(RecordingSink::new());
    let pool = Arc::new(
        WorkerPool::start(
            PoolConfig::new(3, CAPACITY).with_service_unit(Duration::from_millis(2)),
            setting,
            sink.clone(),
            Arc::new(SystemTimeProvider),
        )
        .unwrap(),
    );

    let mut producers = JoinSet::new();
    for _ in 0..6 {
        let pool = pool.clone();
        producers.spawn(async move {
            let (mut accepted, mut rejected) = (0usize, 0usize);
            for _ in 0..200 {
                match pool.queue().try_enqueue(WorkItem::noop()) {
                    Ok(_) => accepted += 1,
                    Err(DomainError::Rejected { .. }) => rejected += 1,
                    Err(e) => panic!("unexpected admission error: {}", e),
                }
                assert!(pool.queue().size() <= CAPACITY);
                tokio::task::yield_now().await;
            }
            (accepted, rejected)
        });
    }

    let (mut accepted, mut rejected) = (0, 0);
    while let Some(result) = producers.join_next().await {
        let (a, r) = result.unwrap();
        accepted += a;
        rejected += r;
    }
    assert_eq!(accepted + rejected, 1_200);
    assert!(rejected > 0, "Producers outran three slow workers");

    let report = pool.shutdown(ShutdownPolicy::Drain).await.unwrap();
    assert_eq!(report.outcomes.completed as usize, accepted);
    assert_eq!(sink.reports().len(), accepted);

    let stats = pool.stats();
    assert_eq!(stats.accepted as usize, accepted);
    assert_eq!(stats.rejected as usize, rejected);

    println!("✅ Overload: bounded occupancy, no lost or duplicated items");
}
