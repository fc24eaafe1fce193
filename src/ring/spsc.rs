//! Single-producer / single-consumer record ring buffer (spec.md §4.3).
//!
//! Exactly one producer thread and one consumer thread may use a given
//! instance; violating this is a programmer error the implementation does
//! not detect (spec.md §4.3, §5).
//!
//! # Memory ordering
//!
//! Unlike the MPMC variant, a single producer thread executes `claim`,
//! `publish`/`abandon` strictly in program order, so the producer position
//! (`head`) alone is a sufficient synchronization edge: `publish`/`abandon`
//! write the payload and header with ordinary stores and then advance `head`
//! with a `Release` store; `poll` reads `head` with `Acquire` before
//! touching any record in `[tail, head)`, which makes every earlier
//! ordinary write happen-before the read. The header `length` field is not
//! itself atomic here — that refinement is needed only for MPMC, where
//! multiple producers can finish out of claim order (spec.md §9, Design
//! Notes).

use crate::abr::AtomicBuffer;
use crate::error::{ControlAction, PCoreError};
use crate::framing::{
    align_up, max_payload_length, RecordHeader, RecordKind, HEADER_LEN, PADDING_TYPE_ID,
};
use crate::ring::layout::SpscTrailer;
use crate::view::PayloadView;
use std::cell::Cell;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

#[derive(Clone, Copy)]
struct PendingClaim {
    header_offset: usize,
    length: i32,
    record_len: usize,
    base_head: u64,
}

/// A single-producer / single-consumer variable-length typed-record ring
/// buffer over an [`AtomicBuffer`].
pub struct SpscRingBuffer {
    buffer: AtomicBuffer,
    capacity: usize,
    mask: usize,
    max_payload: i32,
    pending: Cell<Option<PendingClaim>>,
}

// SAFETY: `pending` is touched only by the single producer thread, by
// contract (spec.md §4.3). All cross-thread-visible state is the trailer's
// atomics, which are genuinely Send + Sync.
unsafe impl Send for SpscRingBuffer {}
unsafe impl Sync for SpscRingBuffer {}

impl SpscRingBuffer {
    /// Create a ring with a freshly-allocated, heap-backed data area of
    /// `capacity` bytes (must be a power of two).
    pub fn new(capacity: usize) -> Result<Self, PCoreError> {
        if !capacity.is_power_of_two() {
            return Err(PCoreError::NonPowerOfTwoCapacity(capacity));
        }
        let buffer = AtomicBuffer::new(capacity + SpscTrailer::LEN, 64);
        Ok(Self::with_buffer(buffer, capacity))
    }

    /// Attach a ring view over a caller-supplied ABR whose length is exactly
    /// `capacity + size_of::<SpscTrailer>()` (spec.md §6's ring constructor
    /// contract). Use this to back a ring with shared memory.
    pub fn with_buffer(buffer: AtomicBuffer, capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "capacity must be a power of two");
        assert_eq!(
            buffer.len(),
            capacity + SpscTrailer::LEN,
            "ABR length must equal capacity + trailer size"
        );
        tracing::debug!(capacity, "constructed SPSC record ring buffer");
        Self {
            buffer,
            capacity,
            mask: capacity - 1,
            max_payload: max_payload_length(capacity),
            pending: Cell::new(None),
        }
    }

    #[inline]
    fn trailer(&self) -> &SpscTrailer {
        // SAFETY: the trailer occupies the last `SpscTrailer::LEN` bytes of
        // `self.buffer`, established by the constructors above.
        unsafe { &*SpscTrailer::at(self.buffer.as_mut_ptr().add(self.capacity)) }
    }

    /// The framing limit for a single record's payload.
    #[inline]
    pub fn max_payload_length(&self) -> i32 {
        self.max_payload
    }

    /// The ring's data-area capacity in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// `head - tail` in bytes: how much of the ring is currently occupied.
    pub fn utilization(&self) -> usize {
        let trailer = self.trailer();
        let head = trailer.head.load(Acquire);
        let tail = trailer.tail.load(Acquire);
        head.wrapping_sub(tail) as usize
    }

    /// A fresh, monotonically increasing correlation id.
    pub fn next_correlation(&self) -> u64 {
        self.trailer().correlation.fetch_add(1, Relaxed)
    }

    pub fn mark_heartbeat(&self, value: u64) {
        self.trailer().heartbeat.store(value, Release);
    }

    pub fn read_heartbeat(&self) -> u64 {
        self.trailer().heartbeat.load(Acquire)
    }

    fn validate_claim_args(&self, type_id: i32, length: i32) -> Result<(), PCoreError> {
        if type_id <= 0 {
            return Err(PCoreError::InvalidTypeId(type_id));
        }
        if length < 0 {
            return Err(PCoreError::NegativeLength(length));
        }
        if length > self.max_payload {
            return Err(PCoreError::PayloadTooLarge {
                requested: length,
                max: self.max_payload,
            });
        }
        Ok(())
    }

    /// Zero-copy reservation. On success, the caller must write `length`
    /// payload bytes at the returned offset and then call [`publish`] or
    /// [`abandon`] before claiming again.
    pub fn claim(&self, type_id: i32, length: i32) -> Result<Option<usize>, PCoreError> {
        self.validate_claim_args(type_id, length)?;
        assert!(
            self.pending.get().is_none(),
            "claim() called while a previous claim is still pending publish/abandon"
        );

        let record_len = align_up(HEADER_LEN + length as usize);
        let trailer = self.trailer();
        let head = trailer.head.load(Relaxed);
        let mut cached_tail = trailer.head_cache.load(Relaxed);

        let mut header_offset = (head as usize) & self.mask;
        let padding_len = if header_offset + record_len > self.capacity {
            self.capacity - header_offset
        } else {
            0
        };
        let needed = (padding_len + record_len) as u64;

        let mut used = head.wrapping_sub(cached_tail);
        if self.capacity as u64 - used < needed {
            cached_tail = trailer.tail.load(Acquire);
            trailer.head_cache.store(cached_tail, Relaxed);
            used = head.wrapping_sub(cached_tail);
            if self.capacity as u64 - used < needed {
                return Ok(None);
            }
        }

        let mut base_head = head;
        if padding_len > 0 {
            RecordHeader::write(
                &self.buffer,
                header_offset,
                (padding_len - HEADER_LEN) as i32,
                PADDING_TYPE_ID,
            );
            base_head = base_head.wrapping_add(padding_len as u64);
            header_offset = 0;
            trailer.head.store(base_head, Release);
            tracing::trace!(padding_len, "spsc ring: inserted padding record at wrap point");
        }

        RecordHeader::write_type(&self.buffer, header_offset, type_id);
        self.pending.set(Some(PendingClaim {
            header_offset,
            length,
            record_len,
            base_head,
        }));
        Ok(Some(header_offset + HEADER_LEN))
    }

    /// Finalise a prior [`claim`], making the record visible to the consumer.
    pub fn publish(&self, offset: usize) -> Result<(), PCoreError> {
        let pending = self
            .pending
            .get()
            .filter(|p| offset == p.header_offset + HEADER_LEN)
            .ok_or(PCoreError::InvalidClaimOffset(offset as i32))?;

        RecordHeader::write_length(&self.buffer, pending.header_offset, pending.length);
        let trailer = self.trailer();
        let new_head = pending.base_head.wrapping_add(pending.record_len as u64);
        trailer.head.store(new_head, Release);
        self.pending.set(None);
        Ok(())
    }

    /// Convert a prior [`claim`] into a padding record of the same span.
    pub fn abandon(&self, offset: usize) -> Result<(), PCoreError> {
        let pending = self
            .pending
            .get()
            .filter(|p| offset == p.header_offset + HEADER_LEN)
            .ok_or(PCoreError::InvalidClaimOffset(offset as i32))?;

        RecordHeader::write(
            &self.buffer,
            pending.header_offset,
            (pending.record_len - HEADER_LEN) as i32,
            PADDING_TYPE_ID,
        );
        let trailer = self.trailer();
        let new_head = pending.base_head.wrapping_add(pending.record_len as u64);
        trailer.head.store(new_head, Release);
        self.pending.set(None);
        Ok(())
    }

    /// Copy-based publish: claim, write `src[src_offset..src_offset+length]`,
    /// publish, in one call.
    pub fn offer(
        &self,
        type_id: i32,
        src: &[u8],
        src_offset: usize,
        length: usize,
    ) -> Result<bool, PCoreError> {
        let Some(offset) = self.claim(type_id, length as i32)? else {
            return Ok(false);
        };
        self.buffer
            .put_bytes(offset, &src[src_offset..src_offset + length]);
        self.publish(offset)?;
        Ok(true)
    }

    /// Convenience over [`offer`] for a whole slice.
    pub fn offer_slice(&self, type_id: i32, src: &[u8]) -> Result<bool, PCoreError> {
        self.offer(type_id, src, 0, src.len())
    }

    /// Invoke `handler(type_id, payload)` for up to `limit` records in FIFO
    /// order, returning the count consumed. Padding records are skipped
    /// transparently and not counted.
    pub fn poll<F>(&self, mut handler: F, limit: usize) -> usize
    where
        F: FnMut(i32, PayloadView<'_>),
    {
        let trailer = self.trailer();
        let mut tail = trailer.tail.load(Relaxed);
        let head = trailer.head.load(Acquire);
        let mut consumed = 0usize;

        while consumed < limit && tail != head {
            let offset = (tail as usize) & self.mask;
            let header = RecordHeader::read(&self.buffer, offset);
            let record_len = align_up(HEADER_LEN + header.length as usize);

            match RecordKind::decode_spsc(header) {
                RecordKind::Claimed => {
                    tracing::error!(
                        offset,
                        "SPSC poll reached an unpublished record ahead of head"
                    );
                    debug_assert!(false, "SPSC record length must never be negative");
                    break;
                }
                RecordKind::Padding { .. } => {
                    tail = tail.wrapping_add(record_len as u64);
                }
                RecordKind::User { type_id, length } => {
                    let view = PayloadView::new(&self.buffer, offset + HEADER_LEN, length as usize);
                    handler(type_id, view);
                    tail = tail.wrapping_add(record_len as u64);
                    consumed += 1;
                }
            }
        }

        trailer.tail.store(tail, Release);
        consumed
    }

    /// As [`poll`], but the handler chooses whether to continue, stop, or
    /// abort without consuming the current record (spec.md §4.3). SPSC
    /// supports all three actions.
    pub fn controlled_poll<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(i32, PayloadView<'_>) -> ControlAction,
    {
        let trailer = self.trailer();
        let mut tail = trailer.tail.load(Relaxed);
        let head = trailer.head.load(Acquire);
        let mut consumed = 0usize;

        while tail != head {
            let offset = (tail as usize) & self.mask;
            let header = RecordHeader::read(&self.buffer, offset);
            let record_len = align_up(HEADER_LEN + header.length as usize);

            let (type_id, length) = match RecordKind::decode_spsc(header) {
                RecordKind::Claimed => {
                    tracing::error!(
                        offset,
                        "SPSC controlled_poll reached an unpublished record ahead of head"
                    );
                    debug_assert!(false, "SPSC record length must never be negative");
                    trailer.tail.store(tail, Release);
                    return consumed;
                }
                RecordKind::Padding { .. } => {
                    tail = tail.wrapping_add(record_len as u64);
                    continue;
                }
                RecordKind::User { type_id, length } => (type_id, length),
            };

            let view = PayloadView::new(&self.buffer, offset + HEADER_LEN, length as usize);
            match handler(type_id, view) {
                ControlAction::Continue => {
                    tail = tail.wrapping_add(record_len as u64);
                    consumed += 1;
                }
                ControlAction::Break => {
                    tail = tail.wrapping_add(record_len as u64);
                    consumed += 1;
                    trailer.tail.store(tail, Release);
                    return consumed;
                }
                ControlAction::Abort => {
                    trailer.tail.store(tail, Release);
                    return consumed;
                }
            }
        }

        trailer.tail.store(tail, Release);
        consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_and_poll_roundtrip() {
        let ring = SpscRingBuffer::new(1024).unwrap();
        assert!(ring.offer_slice(1, b"hello").unwrap());

        let mut seen = Vec::new();
        let consumed = ring.poll(
            |type_id, view| {
                let mut buf = vec![0u8; view.length()];
                view.copy_to(&mut buf);
                seen.push((type_id, buf));
            },
            10,
        );
        assert_eq!(consumed, 1);
        assert_eq!(seen, vec![(1, b"hello".to_vec())]);
    }

    #[test]
    fn claim_abandon_then_offer_delivers_only_second_record() {
        // S2 — SPSC claim/abandon
        let ring = SpscRingBuffer::new(1024).unwrap();
        let offset = ring.claim(1, 64).unwrap().unwrap();
        assert!(offset >= HEADER_LEN);
        ring.abandon(offset).unwrap();
        assert!(ring.offer_slice(2, &[0u8; 32]).unwrap());

        let mut delivered = Vec::new();
        let consumed = ring.poll(|type_id, view| delivered.push((type_id, view.length())), 10);
        assert_eq!(consumed, 1);
        assert_eq!(delivered, vec![(2, 32)]);
    }

    #[test]
    fn wrap_around_inserts_padding_and_preserves_payload() {
        // S1 — SPSC wrap-around
        let ring = SpscRingBuffer::new(1024).unwrap();
        assert!(ring.offer_slice(1, &vec![0xAAu8; 952]).unwrap());
        assert_eq!(ring.poll(|_, _| {}, 10), 1);
        assert_eq!(ring.utilization(), 0);

        let payload = vec![0xBBu8; 128];
        assert!(ring.offer_slice(2, &payload).unwrap());

        let mut got = None;
        let consumed = ring.poll(
            |type_id, view| {
                let mut buf = vec![0u8; view.length()];
                view.copy_to(&mut buf);
                got = Some((type_id, buf));
            },
            10,
        );
        assert_eq!(consumed, 1);
        assert_eq!(got, Some((2, payload)));
    }

    #[test]
    fn max_payload_length_plus_one_fails() {
        let ring = SpscRingBuffer::new(1024).unwrap();
        let max = ring.max_payload_length();
        assert_eq!(
            ring.claim(1, max + 1),
            Err(PCoreError::PayloadTooLarge {
                requested: max + 1,
                max
            })
        );
    }

    #[test]
    fn non_positive_type_id_is_rejected() {
        let ring = SpscRingBuffer::new(1024).unwrap();
        assert_eq!(ring.claim(0, 8), Err(PCoreError::InvalidTypeId(0)));
        assert_eq!(ring.claim(-1, 8), Err(PCoreError::InvalidTypeId(-1)));
    }

    #[test]
    fn controlled_poll_break_stops_after_current_record() {
        // S5 — controlled poll BREAK
        let ring = SpscRingBuffer::new(4096).unwrap();
        for type_id in [1, 2, 3] {
            assert!(ring.offer_slice(type_id, b"x").unwrap());
        }

        let mut seen = Vec::new();
        let consumed = ring.controlled_poll(|type_id, _view| {
            seen.push(type_id);
            if type_id == 2 {
                ControlAction::Break
            } else {
                ControlAction::Continue
            }
        });
        assert_eq!(consumed, 2);
        assert_eq!(seen, vec![1, 2]);

        let mut next = Vec::new();
        let consumed_next = ring.poll(|type_id, _view| next.push(type_id), 10);
        assert_eq!(consumed_next, 1);
        assert_eq!(next, vec![3]);
    }

    #[test]
    fn heartbeat_is_release_acquire() {
        let ring = SpscRingBuffer::new(1024).unwrap();
        assert_eq!(ring.read_heartbeat(), 0);
        ring.mark_heartbeat(42);
        assert_eq!(ring.read_heartbeat(), 42);
    }

    #[test]
    fn publish_on_unmatched_offset_is_a_precondition_violation() {
        let ring = SpscRingBuffer::new(1024).unwrap();
        assert_eq!(ring.publish(123), Err(PCoreError::InvalidClaimOffset(123)));
    }
}
