//! Integration test for backing an ABR — and a ring built over it — with a
//! shared-memory region instead of the default heap allocation (spec.md
//! §4.1's "referenced (non-owning) by a ring buffer overlay").

#![cfg(target_os = "linux")]

use p_core::ring::layout::SpscTrailer;
use p_core::{create_shared_memory, AtomicBuffer, SpscRingBuffer};

#[test]
fn atomic_buffer_over_shared_memory_roundtrips_primitives() {
    let shm = create_shared_memory(4096, Some("p_core_abr_test")).unwrap();
    let buffer = AtomicBuffer::from_shared_memory(shm);
    assert_eq!(buffer.len(), 4096);

    buffer.put_i64(0, -1);
    buffer.put_u32(8, 0xCAFE_BABE);
    assert_eq!(buffer.get_i64(0), -1);
    assert_eq!(buffer.get_u32(8), 0xCAFE_BABE);
}

#[test]
fn spsc_ring_over_shared_memory_backed_abr() {
    let capacity = 4096usize;
    let shm = create_shared_memory(capacity + SpscTrailer::LEN, Some("p_core_ring_test")).unwrap();
    let buffer = AtomicBuffer::from_shared_memory(shm);
    let ring = SpscRingBuffer::with_buffer(buffer, capacity);

    assert!(ring.offer_slice(7, b"shared memory payload").unwrap());
    let mut seen = Vec::new();
    ring.poll(
        |type_id, view| {
            let mut buf = vec![0u8; view.length()];
            view.copy_to(&mut buf);
            seen.push((type_id, buf));
        },
        1,
    );
    assert_eq!(seen, vec![(7, b"shared memory payload".to_vec())]);
}
