//! Single-producer / single-consumer bounded object queue (spec.md §4.6).
//!
//! No per-slot sequence numbers are needed here — with exactly one writer
//! and one reader, a plain `head`/`tail` pair with `Acquire`/`Release` is
//! sufficient, the same reasoning the SPSC record ring buffer uses for its
//! own position counters.

use crate::error::PCoreError;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::atomic::AtomicUsize;

/// A bounded queue of `T` for exactly one producer thread and one consumer
/// thread. Using it from more is a programmer error the implementation does
/// not detect (spec.md §4.6, §5).
pub struct SpscBoundedQueue<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: the producer thread only ever writes through `tail`'s slot and
// the consumer thread only ever reads through `head`'s slot; the
// Acquire/Release pair on the position counters makes those accesses not
// race with each other.
unsafe impl<T: Send> Send for SpscBoundedQueue<T> {}
unsafe impl<T: Send> Sync for SpscBoundedQueue<T> {}

impl<T> SpscBoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, PCoreError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(PCoreError::NonPowerOfTwoCapacity(capacity));
        }
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        tracing::debug!(capacity, "constructed SPSC bounded object queue");
        Ok(Self {
            slots,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn size(&self) -> usize {
        let tail = self.tail.load(Acquire);
        let head = self.head.load(Acquire);
        tail.wrapping_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Attempt to enqueue `value`. Returns `false` if the queue is full.
    pub fn offer(&self, value: T) -> bool {
        let tail = self.tail.load(Relaxed);
        let head = self.head.load(Acquire);
        if tail.wrapping_sub(head) >= self.slots.len() {
            return false;
        }
        let slot = &self.slots[tail & self.mask];
        // SAFETY: only the producer thread reaches this slot at this index,
        // and only after the consumer has released it via `head`.
        unsafe { (*slot.get()).write(value) };
        self.tail.store(tail.wrapping_add(1), Release);
        true
    }

    /// Attempt to dequeue a value. Returns `None` if the queue is empty.
    pub fn poll(&self) -> Option<T> {
        let head = self.head.load(Relaxed);
        let tail = self.tail.load(Acquire);
        if head == tail {
            return None;
        }
        let slot = &self.slots[head & self.mask];
        // SAFETY: `tail`'s Acquire load synchronizes with the producer's
        // Release store, so the slot's write is visible here.
        let value = unsafe { (*slot.get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Release);
        Some(value)
    }

    /// Invoke `handler(value)` for up to `limit` elements in FIFO order,
    /// stopping early if the queue empties, and returning the count drained.
    pub fn drain<F: FnMut(T)>(&self, mut handler: F, limit: usize) -> usize {
        let mut n = 0;
        while n < limit {
            match self.poll() {
                Some(value) => {
                    handler(value);
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Offer `supplier()` values until the queue is full or `limit` elements
    /// have been enqueued, returning the count actually enqueued.
    pub fn fill<F: FnMut() -> T>(&self, mut supplier: F, limit: usize) -> usize {
        let mut n = 0;
        while n < limit {
            if !self.offer(supplier()) {
                break;
            }
            n += 1;
        }
        n
    }

    /// Drop every currently-available element.
    pub fn clear(&self) {
        while self.poll().is_some() {}
    }
}

impl<T> SpscBoundedQueue<*mut T> {
    /// See [`MpmcBoundedQueue::offer_non_null`](crate::queue::mpmc::MpmcBoundedQueue::offer_non_null).
    pub fn offer_non_null(&self, ptr: *mut T) -> Result<bool, PCoreError> {
        if ptr.is_null() {
            return Err(PCoreError::NullElement);
        }
        Ok(self.offer(ptr))
    }
}

impl<T> Drop for SpscBoundedQueue<T> {
    fn drop(&mut self) {
        while self.poll().is_some() {}
    }
}

impl<T> std::fmt::Debug for SpscBoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpscBoundedQueue")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish()
    }
}
