//! Multithreaded correctness stress test for the MPMC record ring buffer
//! (spec.md §8, scenario S3: N producers, M consumers, no lost or duplicated
//! records).

use p_core::MpmcRingBuffer;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

fn run(producers: usize, consumers: usize, msgs_per_producer: usize) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let ring = Arc::new(MpmcRingBuffer::new(1 << 16).unwrap());
    let received = Arc::new(Mutex::new(HashSet::new()));
    let produced_total = producers * msgs_per_producer;
    let consumed_count = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();

    for producer_id in 0..producers {
        let ring = ring.clone();
        handles.push(thread::spawn(move || {
            for seq in 0..msgs_per_producer {
                // Encode (producer_id, seq) as 8 bytes of payload so the
                // consumer side can verify the full (producer, seq) multiset.
                let key = ((producer_id as u64) << 32) | seq as u64;
                let payload = key.to_ne_bytes();
                loop {
                    match ring.offer_slice((producer_id + 1) as i32, &payload) {
                        Ok(true) => break,
                        Ok(false) => thread::yield_now(),
                        Err(e) => panic!("unexpected claim error: {e:?}"),
                    }
                }
            }
        }));
    }

    for _ in 0..consumers {
        let ring = ring.clone();
        let received = received.clone();
        let consumed_count = consumed_count.clone();
        handles.push(thread::spawn(move || {
            while consumed_count.load(Ordering::Relaxed) < produced_total {
                let got = ring.poll(
                    |_type_id, view| {
                        let mut buf = [0u8; 8];
                        view.copy_to(&mut buf);
                        let key = u64::from_ne_bytes(buf);
                        received.lock().unwrap().insert(key);
                    },
                    64,
                );
                if got == 0 {
                    thread::yield_now();
                } else {
                    consumed_count.fetch_add(got, Ordering::Relaxed);
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let received = received.lock().unwrap();
    assert_eq!(received.len(), produced_total, "lost or duplicated records");
    for producer_id in 0..producers {
        for seq in 0..msgs_per_producer {
            let key = ((producer_id as u64) << 32) | seq as u64;
            assert!(received.contains(&key), "missing ({producer_id}, {seq})");
        }
    }
}

#[test]
fn mpmc_ring_no_lost_or_duplicated_records() {
    run(4, 4, 500);
}

#[test]
#[ignore = "full-scale stress run, not suitable for default CI timing"]
fn mpmc_ring_no_lost_or_duplicated_records_full_scale() {
    run(4, 4, 1_000_000 / 4);
}
