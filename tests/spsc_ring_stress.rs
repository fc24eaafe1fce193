//! Single-producer/single-consumer high-volume correctness test for the
//! SPSC record ring buffer, including wrap-around.

use p_core::SpscRingBuffer;
use std::sync::Arc;
use std::thread;

#[test]
fn spsc_ring_preserves_fifo_order_under_wraparound() {
    let ring = Arc::new(SpscRingBuffer::new(4096).unwrap());
    let total = 200_000u64;

    let producer = {
        let ring = ring.clone();
        thread::spawn(move || {
            for i in 0..total {
                let payload = i.to_ne_bytes();
                loop {
                    match ring.offer_slice(1, &payload) {
                        Ok(true) => break,
                        Ok(false) => thread::yield_now(),
                        Err(e) => panic!("unexpected claim error: {e:?}"),
                    }
                }
            }
        })
    };

    let consumer = {
        let ring = ring.clone();
        thread::spawn(move || {
            let mut next_expected = 0u64;
            while next_expected < total {
                let got = ring.poll(
                    |_type_id, view| {
                        let mut buf = [0u8; 8];
                        view.copy_to(&mut buf);
                        let value = u64::from_ne_bytes(buf);
                        assert_eq!(value, next_expected, "FIFO order violated");
                        next_expected += 1;
                    },
                    256,
                );
                if got == 0 {
                    thread::yield_now();
                }
            }
        })
    };

    producer.join().unwrap();
    consumer.join().unwrap();
}
