//! Multi-producer / multi-consumer record ring buffer (spec.md §4.4).
//!
//! Any number of producer threads and any number of consumer threads may
//! share an instance. Slot ownership on both sides is arbitrated with
//! `compare_exchange_weak` on the shared position counters, the same
//! CAS-retry-with-`spin_loop`-backoff idiom this codebase's MPMC buffer
//! uses for its `enqueue`/`dequeue`.
//!
//! # Commit protocol
//!
//! A single producer thread publishing in program order (SPSC) can rely on
//! `head` alone as its synchronization edge. With multiple producers that
//! guarantee breaks: producer A can claim a slot before producer B and
//! still finish writing it after B. So each record's header `length` field
//! is itself an atomic commit flag: claiming writes it as the *negative* of
//! the payload length (`Release`), and `publish`/`abandon` flip it back to
//! a non-negative value (`Release`). A consumer that reaches a still-negative
//! length via an `Acquire` load knows the slot is claimed but not yet
//! published, and must stop rather than skip past it — FIFO order is
//! preserved at the cost of being blocked behind a slow producer
//! (spec.md §4.4's documented starvation case).

use crate::abr::AtomicBuffer;
use crate::error::{ControlAction, PCoreError};
use crate::framing::{
    align_up, max_payload_length, RecordHeader, RecordKind, HEADER_LEN, PADDING_TYPE_ID,
};
use crate::ring::layout::MpmcTrailer;
use crate::view::PayloadView;
use std::hint::spin_loop;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};

/// A multi-producer / multi-consumer variable-length typed-record ring
/// buffer over an [`AtomicBuffer`].
pub struct MpmcRingBuffer {
    buffer: AtomicBuffer,
    capacity: usize,
    mask: usize,
    max_payload: i32,
}

unsafe impl Send for MpmcRingBuffer {}
unsafe impl Sync for MpmcRingBuffer {}

impl MpmcRingBuffer {
    pub fn new(capacity: usize) -> Result<Self, PCoreError> {
        if !capacity.is_power_of_two() {
            return Err(PCoreError::NonPowerOfTwoCapacity(capacity));
        }
        let buffer = AtomicBuffer::new(capacity + MpmcTrailer::LEN, 64);
        Ok(Self::with_buffer(buffer, capacity))
    }

    /// Attach a ring view over a caller-supplied ABR, e.g. a shared memory
    /// region visible to other processes (spec.md §6).
    pub fn with_buffer(buffer: AtomicBuffer, capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "capacity must be a power of two");
        assert_eq!(
            buffer.len(),
            capacity + MpmcTrailer::LEN,
            "ABR length must equal capacity + trailer size"
        );
        tracing::debug!(capacity, "constructed MPMC record ring buffer");
        Self {
            buffer,
            capacity,
            mask: capacity - 1,
            max_payload: max_payload_length(capacity),
        }
    }

    #[inline]
    fn trailer(&self) -> &MpmcTrailer {
        // SAFETY: the trailer occupies the last `MpmcTrailer::LEN` bytes of
        // `self.buffer`, established by the constructors above.
        unsafe { &*MpmcTrailer::at(self.buffer.as_mut_ptr().add(self.capacity)) }
    }

    #[inline]
    pub fn max_payload_length(&self) -> i32 {
        self.max_payload
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// `head - tail` in bytes. Approximate under concurrent claims: a
    /// reservation in flight counts as occupied even before it publishes.
    pub fn utilization(&self) -> usize {
        let trailer = self.trailer();
        let head = trailer.head.load(Acquire);
        let tail = trailer.tail.load(Acquire);
        head.wrapping_sub(tail) as usize
    }

    pub fn next_correlation(&self) -> u64 {
        self.trailer().correlation.fetch_add(1, Relaxed)
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

    /// Zero-copy reservation. Multiple producers may race here; exactly one
    /// wins each byte range via a CAS loop on `head`.
    pub fn claim(&self, type_id: i32, length: i32) -> Result<Option<usize>, PCoreError> {
        self.validate_claim_args(type_id, length)?;
        let record_len = align_up(HEADER_LEN + length as usize);
        let trailer = self.trailer();

        loop {
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

            let new_head = head.wrapping_add(needed);
            if trailer
                .head
                .compare_exchange_weak(head, new_head, AcqRel, Relaxed)
                .is_err()
            {
                spin_loop();
                continue;
            }

            // This thread now exclusively owns [head, new_head).
            if padding_len > 0 {
                RecordHeader::write_type(&self.buffer, header_offset, PADDING_TYPE_ID);
                RecordHeader::length_atomic(&self.buffer, header_offset)
                    .store((padding_len - HEADER_LEN) as i32, Release);
                header_offset = 0;
            }

            RecordHeader::write_type(&self.buffer, header_offset, type_id);
            // Negative length: claimed, not yet published.
            RecordHeader::length_atomic(&self.buffer, header_offset).store(-length, Release);

            tracing::trace!(padding_len, "mpmc ring: claimed record slot");
            return Ok(Some(header_offset + HEADER_LEN));
        }
    }

    fn claimed_length_at(&self, header_offset: usize) -> Result<i32, PCoreError> {
        let claimed = RecordHeader::length_atomic(&self.buffer, header_offset).load(Relaxed);
        let type_id = self.buffer.get_i32(header_offset + 4);
        match RecordKind::decode_mpmc(RecordHeader {
            length: claimed,
            type_id,
        }) {
            RecordKind::Claimed => Ok(-claimed),
            _ => Err(PCoreError::InvalidClaimOffset(
                (header_offset + HEADER_LEN) as i32,
            )),
        }
    }

    /// Finalise a prior [`claim`], making the record visible to consumers.
    pub fn publish(&self, offset: usize) -> Result<(), PCoreError> {
        let header_offset = offset
            .checked_sub(HEADER_LEN)
            .ok_or(PCoreError::InvalidClaimOffset(offset as i32))?;
        let length = self.claimed_length_at(header_offset)?;
        RecordHeader::length_atomic(&self.buffer, header_offset).store(length, Release);
        Ok(())
    }

    /// Convert a prior [`claim`] into a padding record of the same span.
    pub fn abandon(&self, offset: usize) -> Result<(), PCoreError> {
        let header_offset = offset
            .checked_sub(HEADER_LEN)
            .ok_or(PCoreError::InvalidClaimOffset(offset as i32))?;
        let length = self.claimed_length_at(header_offset)?;
        RecordHeader::write_type(&self.buffer, header_offset, PADDING_TYPE_ID);
        RecordHeader::length_atomic(&self.buffer, header_offset).store(length, Release);
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

    pub fn offer_slice(&self, type_id: i32, src: &[u8]) -> Result<bool, PCoreError> {
        self.offer(type_id, src, 0, src.len())
    }

    /// Attempt to claim the record currently at `tail` for consumption,
    /// racing any other consumer threads. Returns `None` if the ring is
    /// empty or the next record is claimed but not yet published.
    fn try_claim_next(&self, trailer: &MpmcTrailer) -> Option<(usize, RecordKind)> {
        loop {
            let tail = trailer.tail.load(Relaxed);
            let head = trailer.head.load(Acquire);
            if tail == head {
                return None;
            }
            let offset = (tail as usize) & self.mask;
            let length = RecordHeader::length_atomic(&self.buffer, offset).load(Acquire);
            let type_id = self.buffer.get_i32(offset + 4);
            let kind = RecordKind::decode_mpmc(RecordHeader { length, type_id });
            if matches!(kind, RecordKind::Claimed) {
                // Claimed but not yet published: must not skip ahead.
                return None;
            }
            let record_len = align_up(HEADER_LEN + length as usize);
            let new_tail = tail.wrapping_add(record_len as u64);
            match trailer
                .tail
                .compare_exchange_weak(tail, new_tail, AcqRel, Relaxed)
            {
                Ok(_) => return Some((offset, kind)),
                Err(_) => {
                    spin_loop();
                    continue;
                }
            }
        }
    }

    /// Invoke `handler(type_id, payload)` for up to `limit` records in FIFO
    /// order, returning the count consumed. Padding records are skipped
    /// transparently and not counted.
    pub fn poll<F>(&self, mut handler: F, limit: usize) -> usize
    where
        F: FnMut(i32, PayloadView<'_>),
    {
        let trailer = self.trailer();
        let mut consumed = 0usize;
        while consumed < limit {
            let Some((offset, kind)) = self.try_claim_next(trailer) else {
                break;
            };
            let (type_id, length) = match kind {
                RecordKind::Padding { .. } => continue,
                RecordKind::User { type_id, length } => (type_id, length),
                RecordKind::Claimed => unreachable!("try_claim_next filters claimed records"),
            };
            let view = PayloadView::new(&self.buffer, offset + HEADER_LEN, length as usize);
            handler(type_id, view);
            consumed += 1;
        }
        consumed
    }

    /// As [`poll`], but the handler chooses whether to continue, stop, or
    /// abort. `ControlAction::Abort` is not supported on the MPMC ring:
    /// once a consumer has won the CAS race for a slot there is no
    /// mechanism to hand it back, so aborting surfaces as an error instead
    /// of silently behaving like `Break` (spec.md §9).
    pub fn controlled_poll<F>(&self, mut handler: F) -> Result<usize, PCoreError>
    where
        F: FnMut(i32, PayloadView<'_>) -> ControlAction,
    {
        let trailer = self.trailer();
        let mut consumed = 0usize;
        loop {
            let Some((offset, kind)) = self.try_claim_next(trailer) else {
                return Ok(consumed);
            };
            let (type_id, length) = match kind {
                RecordKind::Padding { .. } => continue,
                RecordKind::User { type_id, length } => (type_id, length),
                RecordKind::Claimed => unreachable!("try_claim_next filters claimed records"),
            };
            let view = PayloadView::new(&self.buffer, offset + HEADER_LEN, length as usize);
            match handler(type_id, view) {
                ControlAction::Continue => {
                    consumed += 1;
                }
                ControlAction::Break => {
                    consumed += 1;
                    return Ok(consumed);
                }
                ControlAction::Abort => {
                    return Err(PCoreError::UnsupportedAbort);
                }
            }
        }
    }
}
