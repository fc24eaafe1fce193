//! Multithreaded correctness stress test for the MPMC bounded object queue
//! (spec.md §8, scenario S4).

use p_core::MpmcBoundedQueue;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

fn run(producers: usize, consumers: usize, items_per_producer: usize) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let queue = Arc::new(MpmcBoundedQueue::<u64>::new(1024).unwrap());
    let total = producers * items_per_producer;
    let received = Arc::new(Mutex::new(HashSet::new()));
    let consumed_count = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();

    for producer_id in 0..producers {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            for seq in 0..items_per_producer {
                let key = ((producer_id as u64) << 32) | seq as u64;
                while !queue.offer(key) {
                    thread::yield_now();
                }
            }
        }));
    }

    for _ in 0..consumers {
        let queue = queue.clone();
        let received = received.clone();
        let consumed_count = consumed_count.clone();
        handles.push(thread::spawn(move || {
            while consumed_count.load(Ordering::Relaxed) < total {
                if let Some(key) = queue.poll() {
                    received.lock().unwrap().insert(key);
                    consumed_count.fetch_add(1, Ordering::Relaxed);
                } else {
                    thread::yield_now();
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let received = received.lock().unwrap();
    assert_eq!(received.len(), total, "lost or duplicated elements");
}

#[test]
fn mpmc_queue_no_lost_or_duplicated_elements() {
    run(4, 4, 2_000);
}

#[test]
#[ignore = "full-scale stress run, not suitable for default CI timing"]
fn mpmc_queue_no_lost_or_duplicated_elements_full_scale() {
    run(8, 8, 250_000);
}
