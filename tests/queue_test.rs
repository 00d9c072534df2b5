// Persistence queue integration tests: ordering, single-writer drain and
// failure isolation.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::InstrumentedStore;
use miharu::{QueueState, RecordQueue, RecordStore, SqliteStore, UsageRecord};

fn record(id: String) -> UsageRecord {
    UsageRecord::success(id, "gpt-4", 1, 1, 0.009, 5)
}

#[tokio::test]
async fn test_single_producer_fifo() {
    let store = Arc::new(InstrumentedStore::new());
    let queue = RecordQueue::new(store.clone());

    let expected: Vec<String> = (0..100).map(|i| format!("r{i}")).collect();
    for id in &expected {
        queue.enqueue(record(id.clone()));
    }
    queue.wait_idle().await;

    assert_eq!(store.inserted_ids(), expected);
    assert_eq!(store.max_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_single_writer_in_enqueue_order() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 50;

    let store = Arc::new(InstrumentedStore::with_delay(Duration::from_micros(200)));
    let queue = RecordQueue::new(store.clone());
    // Serializes (log, enqueue) pairs so the log reflects true enqueue order
    let enqueue_log = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for p in 0..PRODUCERS {
        let queue = queue.clone();
        let enqueue_log = Arc::clone(&enqueue_log);
        handles.push(std::thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                let id = format!("p{p}-{i}");
                let mut log = enqueue_log.lock().unwrap();
                log.push(id.clone());
                queue.enqueue(record(id));
                drop(log);
                if i % 7 == 0 {
                    std::thread::sleep(Duration::from_micros(300));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    queue.wait_idle().await;

    let inserted = store.inserted_ids();
    assert_eq!(inserted.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(inserted, *enqueue_log.lock().unwrap());
    assert_eq!(store.max_in_flight(), 1);
    assert_eq!(queue.state(), QueueState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_from_async_tasks_never_strands_records() {
    let store = Arc::new(InstrumentedStore::new());
    let queue = RecordQueue::new(store.clone());

    // Repeated bursts hit the Draining -> Idle transition many times
    for round in 0..20 {
        let mut tasks = Vec::new();
        for t in 0..10 {
            let queue = queue.clone();
            tasks.push(tokio::spawn(async move {
                queue.enqueue(record(format!("{round}-{t}")));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        tokio::task::yield_now().await;
    }

    queue.wait_idle().await;
    assert_eq!(store.inserted_ids().len(), 200);
    assert_eq!(store.max_in_flight(), 1);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_failing_store_drops_records_and_returns_to_idle() {
    let store = Arc::new(InstrumentedStore::failing());
    let queue = RecordQueue::new(store.clone());

    for i in 0..5 {
        queue.enqueue(record(format!("lost-{i}")));
    }
    queue.wait_idle().await;

    assert_eq!(store.attempts(), 5);
    assert!(store.inserted_ids().is_empty());
    assert_eq!(queue.state(), QueueState::Idle);

    // Still accepting work after every insert failed
    store.set_failing(false);
    queue.enqueue(record("kept".to_string()));
    queue.wait_idle().await;

    assert_eq!(store.attempts(), 6);
    assert_eq!(store.inserted_ids(), vec!["kept".to_string()]);
}

#[tokio::test]
async fn test_panicking_insert_does_not_strand_later_records() {
    let store = Arc::new(InstrumentedStore::panicking_once());
    let queue = RecordQueue::new(store.clone());

    queue.enqueue(record("crashes".to_string()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.enqueue(record("second".to_string()));
    queue.enqueue(record("third".to_string()));

    tokio::time::timeout(Duration::from_secs(5), queue.wait_idle())
        .await
        .expect("queue drained");

    assert_eq!(store.attempts(), 3);
    assert_eq!(
        store.inserted_ids(),
        vec!["second".to_string(), "third".to_string()]
    );
    assert_eq!(queue.state(), QueueState::Idle);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_enqueue_returns_before_insert_completes() {
    let store = Arc::new(InstrumentedStore::with_delay(Duration::from_millis(200)));
    let queue = RecordQueue::new(store.clone());

    let started = std::time::Instant::now();
    queue.enqueue(record("slow".to_string()));
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(queue.state(), QueueState::Draining);

    queue.wait_idle().await;
    assert_eq!(store.inserted_ids(), vec!["slow".to_string()]);
}

#[tokio::test]
async fn test_one_failed_insert_does_not_block_the_rest() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let queue = RecordQueue::new(store.clone());

    queue.enqueue(record("a".to_string()));
    // Duplicate primary key
    queue.enqueue(record("a".to_string()));
    queue.enqueue(record("b".to_string()));
    queue.wait_idle().await;

    let mut ids: Vec<String> = store
        .select_all_ordered_by_timestamp_desc()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
}
