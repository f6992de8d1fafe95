//! Unit tests for BoundedWorkQueue admission, ordering and close semantics

use super::error::DomainError;
use super::queue::BoundedWorkQueue;
use super::work_item::WorkItem;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_test::{assert_pending, assert_ready};

fn labelled(i: usize) -> WorkItem {
    WorkItem::noop().with_label(format!("item-{}", i))
}

#[test]
fn test_zero_capacity_rejected() {
    let err = BoundedWorkQueue::new(0).unwrap_err();
    assert!(matches!(err, DomainError::InvalidConfiguration(_)));
}

#[test]
fn test_try_enqueue_full_leaves_size_unchanged() {
    let queue = BoundedWorkQueue::new(2).unwrap();

    assert!(queue.try_enqueue(labelled(0)).is_ok());
    assert!(queue.try_enqueue(labelled(1)).is_ok());
    assert_eq!(queue.size(), 2);

    let err = queue.try_enqueue(labelled(2)).unwrap_err();
    assert_eq!(err, DomainError::Rejected { capacity: 2 });
    assert_eq!(queue.size(), 2, "Rejected enqueue must not change occupancy");

    // Freeing exactly one slot admits exactly one more item
    assert!(queue.try_dequeue().is_some());
    assert!(queue.try_enqueue(labelled(3)).is_ok());
    assert!(queue.try_enqueue(labelled(4)).is_err());

    let counters = queue.counters();
    assert_eq!(counters.accepted, 3);
    assert_eq!(counters.rejected, 2);
}

#[test]
fn test_fifo_single_producer_single_consumer() {
    let queue = BoundedWorkQueue::new(8).unwrap();
    for i in 0..8 {
        queue.try_enqueue(labelled(i)).unwrap();
    }

    let labels: Vec<String> = std::iter::from_fn(|| queue.try_dequeue())
        .map(|q| q.item.label().unwrap_or_default().to_string())
        .collect();

    let expected: Vec<String> = (0..8).map(|i| format!("item-{}", i)).collect();
    assert_eq!(labels, expected);
}

#[tokio::test]
async fn test_fifo_across_tasks() {
    let queue = Arc::new(BoundedWorkQueue::new(3).unwrap());

    let producer = {
        let queue = queue.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                queue
                    .enqueue_blocking(labelled(i), Duration::from_secs(10))
                    .await
                    .unwrap();
            }
        })
    };

    let mut seqs = Vec::new();
    for _ in 0..50 {
        let next = queue.dequeue_blocking().await.unwrap();
        seqs.push(next.seq);
    }
    producer.await.unwrap();

    let expected: Vec<u64> = (0..50).collect();
    assert_eq!(seqs, expected, "Items must come out in admission order");
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_blocking_times_out_when_full() {
    let queue = BoundedWorkQueue::new(1).unwrap();
    queue.try_enqueue(labelled(0)).unwrap();

    let started = tokio::time::Instant::now();
    let err = queue
        .enqueue_blocking(labelled(1), Duration::from_secs(3))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DomainError::EnqueueTimeout {
            timeout: Duration::from_secs(3)
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(queue.size(), 1);
    assert_eq!(queue.counters().timed_out, 1);
}

#[tokio::test]
async fn test_enqueue_blocking_released_by_dequeue() {
    let queue = BoundedWorkQueue::new(1).unwrap();
    queue.try_enqueue(labelled(0)).unwrap();

    let mut blocked =
        tokio_test::task::spawn(queue.enqueue_blocking(labelled(1), Duration::from_secs(60)));
    assert_pending!(blocked.poll());

    let first = queue.try_dequeue().unwrap();
    assert_eq!(first.seq, 0);

    assert!(blocked.is_woken());
    let seq = assert_ready!(blocked.poll()).unwrap();
    assert_eq!(seq, 1);
    assert_eq!(queue.size(), 1);
}

#[tokio::test]
async fn test_dequeue_blocking_waits_for_item() {
    let queue = BoundedWorkQueue::new(4).unwrap();

    let mut waiting = tokio_test::task::spawn(queue.dequeue_blocking());
    assert_pending!(waiting.poll());

    queue.try_enqueue(labelled(7)).unwrap();

    assert!(waiting.is_woken());
    let item = assert_ready!(waiting.poll()).unwrap();
    assert_eq!(item.item.label(), Some("item-7"));
}

#[tokio::test]
async fn test_parked_producers_released_in_arrival_order() {
    let queue = BoundedWorkQueue::new(1).unwrap();
    queue.try_enqueue(labelled(0)).unwrap();

    let mut producers: Vec<_> = (1..=3)
        .map(|i| {
            tokio_test::task::spawn(queue.enqueue_blocking(labelled(i), Duration::from_secs(60)))
        })
        .collect();
    for producer in producers.iter_mut() {
        assert_pending!(producer.poll());
    }

    for (released, expected_label) in (0..3).zip(["item-0", "item-1", "item-2"]) {
        let taken = queue.try_dequeue().unwrap();
        assert_eq!(taken.item.label(), Some(expected_label));

        assert!(producers[released].is_woken());
        assert_ready!(producers[released].poll()).unwrap();
        for still_parked in producers.iter_mut().skip(released + 1) {
            assert_pending!(still_parked.poll());
        }
    }

    assert_eq!(queue.try_dequeue().unwrap().item.label(), Some("item-3"));
}

#[tokio::test]
async fn test_parked_consumers_served_in_arrival_order() {
    let queue = BoundedWorkQueue::new(4).unwrap();

    let mut consumers: Vec<_> = (0..3)
        .map(|_| tokio_test::task::spawn(queue.dequeue_blocking()))
        .collect();
    for consumer in consumers.iter_mut() {
        assert_pending!(consumer.poll());
    }

    for i in 0..3 {
        queue.try_enqueue(labelled(i)).unwrap();

        assert!(consumers[i].is_woken());
        let got = assert_ready!(consumers[i].poll()).unwrap();
        assert_eq!(got.item.label(), Some(format!("item-{}", i).as_str()));
        for still_parked in consumers.iter_mut().skip(i + 1) {
            assert_pending!(still_parked.poll());
        }
    }
    assert_eq!(queue.size(), 0);
}

#[tokio::test]
async fn test_close_rejects_new_work_and_keeps_pending() {
    let queue = BoundedWorkQueue::new(4).unwrap();
    queue.try_enqueue(labelled(0)).unwrap();
    queue.try_enqueue(labelled(1)).unwrap();

    assert!(queue.close());
    assert!(!queue.close(), "Second close is a no-op");
    assert!(queue.is_closed());

    assert_eq!(
        queue.try_enqueue(labelled(2)).unwrap_err(),
        DomainError::QueueClosed
    );
    assert_eq!(
        queue
            .enqueue_blocking(labelled(3), Duration::from_millis(10))
            .await
            .unwrap_err(),
        DomainError::QueueClosed
    );

    assert_eq!(queue.dequeue_blocking().await.unwrap().seq, 0);
    assert_eq!(queue.dequeue_blocking().await.unwrap().seq, 1);
    assert!(queue.dequeue_blocking().await.is_none());
    // Every idle consumer observes the end, not just the first one
    assert!(queue.dequeue_blocking().await.is_none());
}

#[tokio::test]
async fn test_close_wakes_blocked_producer_and_consumers() {
    let queue = BoundedWorkQueue::new(1).unwrap();

    let mut consumer_a = tokio_test::task::spawn(queue.dequeue_blocking());
    let mut consumer_b = tokio_test::task::spawn(queue.dequeue_blocking());
    assert_pending!(consumer_a.poll());
    assert_pending!(consumer_b.poll());

    queue.close();

    assert!(assert_ready!(consumer_a.poll()).is_none());
    assert!(assert_ready!(consumer_b.poll()).is_none());

    let full = BoundedWorkQueue::new(1).unwrap();
    full.try_enqueue(labelled(0)).unwrap();
    let mut producer =
        tokio_test::task::spawn(full.enqueue_blocking(labelled(1), Duration::from_secs(60)));
    assert_pending!(producer.poll());

    full.close();
    assert_eq!(
        assert_ready!(producer.poll()).unwrap_err(),
        DomainError::QueueClosed
    );
}

#[test]
fn test_drain_returns_pending_and_frees_slots() {
    let queue = BoundedWorkQueue::new(3).unwrap();
    for i in 0..3 {
        queue.try_enqueue(labelled(i)).unwrap();
    }

    let drained = queue.drain();
    assert_eq!(drained.iter().map(|q| q.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(queue.size(), 0);
    assert!(queue.try_dequeue().is_none());

    for i in 0..3 {
        assert!(queue.try_enqueue(labelled(i)).is_ok());
    }
    assert_eq!(queue.try_dequeue().unwrap().seq, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_never_exceeded_under_contention() {
    const CAPACITY: usize = 4;
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 250;

    let queue = Arc::new(BoundedWorkQueue::new(CAPACITY).unwrap());
    let max_seen = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();

    for p in 0..PRODUCERS {
        let queue = queue.clone();
        let max_seen = max_seen.clone();
        tasks.spawn(async move {
            let mut accepted = 0;
            while accepted < PER_PRODUCER {
                let item = labelled(p * PER_PRODUCER + accepted);
                let admitted = if accepted % 2 == 0 {
                    queue.try_enqueue(item).is_ok()
                } else {
                    queue
                        .enqueue_blocking(item, Duration::from_secs(30))
                        .await
                        .is_ok()
                };
                if admitted {
                    accepted += 1;
                } else {
                    tokio::task::yield_now().await;
                }
                max_seen.fetch_max(queue.size(), Ordering::SeqCst);
            }
            Vec::new()
        });
    }

    for _ in 0..2 {
        let queue = queue.clone();
        let max_seen = max_seen.clone();
        tasks.spawn(async move {
            let mut seqs = Vec::new();
            for _ in 0..(PRODUCERS * PER_PRODUCER / 2) {
                let next = queue.dequeue_blocking().await.unwrap();
                max_seen.fetch_max(queue.size(), Ordering::SeqCst);
                seqs.push(next.seq);
            }
            seqs
        });
    }

    let mut consumed = HashSet::new();
    while let Some(result) = tasks.join_next().await {
        for seq in result.unwrap() {
            assert!(consumed.insert(seq), "Sequence {} delivered twice", seq);
        }
    }

    assert_eq!(consumed.len(), PRODUCERS * PER_PRODUCER);
    assert!(max_seen.load(Ordering::SeqCst) <= CAPACITY);
    assert_eq!(queue.size(), 0);
}
