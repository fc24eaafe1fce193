//! Multi-producer / multi-consumer bounded object queue (spec.md §4.5).
//!
//! The classic Vyukov bounded MPMC queue: each slot carries its own
//! sequence number instead of relying on a single pair of position
//! counters, so producers and consumers only ever contend on the one slot
//! they're currently touching. This generalizes this codebase's
//! `SlotHeader`/`RingBuffer` byte-slot sequence protocol from fixed-size
//! raw bytes to an arbitrary `T`.

use crate::error::PCoreError;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::hint::spin_loop;
use std::mem::MaybeUninit;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::atomic::AtomicUsize;

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded queue of `T` safe for any number of concurrent producers and
/// consumers.
pub struct MpmcBoundedQueue<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    enq_pos: CachePadded<AtomicUsize>,
    deq_pos: CachePadded<AtomicUsize>,
}

// SAFETY: `Slot<T>`'s `UnsafeCell` is only ever touched by the thread that
// wins the corresponding sequence-number CAS, which is exactly one thread
// per slot occupancy; that's the invariant the algorithm below maintains.
unsafe impl<T: Send> Send for MpmcBoundedQueue<T> {}
unsafe impl<T: Send> Sync for MpmcBoundedQueue<T> {}

impl<T> MpmcBoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, PCoreError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(PCoreError::NonPowerOfTwoCapacity(capacity));
        }
        let slots = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        tracing::debug!(capacity, "constructed MPMC bounded object queue");
        Ok(Self {
            slots,
            mask: capacity - 1,
            enq_pos: CachePadded::new(AtomicUsize::new(0)),
            deq_pos: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Approximate occupied-slot count; may be stale the instant it's read
    /// under concurrent use (spec.md §4.5).
    pub fn size(&self) -> usize {
        let enq = self.enq_pos.load(Relaxed);
        let deq = self.deq_pos.load(Relaxed);
        enq.wrapping_sub(deq).min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Attempt to enqueue `value`. Returns `false` if the queue is full.
    pub fn offer(&self, value: T) -> bool {
        let mut pos = self.enq_pos.load(Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.sequence.load(Acquire);
            let dif = seq as i64 - pos as i64;
            if dif == 0 {
                match self
                    .enq_pos
                    .compare_exchange_weak(pos, pos + 1, Relaxed, Relaxed)
                {
                    Ok(_) => {
                        // SAFETY: winning this CAS grants exclusive access to the
                        // slot until its sequence is published below.
                        unsafe { (*slot.value.get()).write(value) };
                        slot.sequence.store(pos + 1, Release);
                        return true;
                    }
                    Err(cur) => {
                        pos = cur;
                        spin_loop();
                    }
                }
            } else if dif < 0 {
                return false;
            } else {
                pos = self.enq_pos.load(Relaxed);
                spin_loop();
            }
        }
    }

    /// Attempt to dequeue a value. Returns `None` if the queue is empty.
    pub fn poll(&self) -> Option<T> {
        let mut pos = self.deq_pos.load(Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.sequence.load(Acquire);
            let dif = seq as i64 - (pos + 1) as i64;
            if dif == 0 {
                match self
                    .deq_pos
                    .compare_exchange_weak(pos, pos + 1, Relaxed, Relaxed)
                {
                    Ok(_) => {
                        // SAFETY: winning this CAS grants exclusive access to the
                        // slot's initialized value.
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.sequence.store(pos + self.slots.len() + 1, Release);
                        return Some(value);
                    }
                    Err(cur) => {
                        pos = cur;
                        spin_loop();
                    }
                }
            } else if dif < 0 {
                return None;
            } else {
                pos = self.deq_pos.load(Relaxed);
                spin_loop();
            }
        }
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

    /// Drop every currently-available element. Only meaningful when called
    /// with no concurrent producers, since a producer racing this call could
    /// have its element drained without ever being observed by a consumer.
    pub fn clear(&self) {
        while self.poll().is_some() {}
    }
}

impl<T> MpmcBoundedQueue<*mut T> {
    /// Like [`offer`](Self::offer), but rejects a null pointer as a
    /// precondition violation instead of silently enqueuing it — the
    /// null-element rejection spec.md §4.5 describes for pointer/reference
    /// element types, where Rust's ownership model can't rule out null at
    /// the type level the way it does for owned `T`.
    pub fn offer_non_null(&self, ptr: *mut T) -> Result<bool, PCoreError> {
        if ptr.is_null() {
            return Err(PCoreError::NullElement);
        }
        Ok(self.offer(ptr))
    }
}

impl<T> Drop for MpmcBoundedQueue<T> {
    fn drop(&mut self) {
        while self.poll().is_some() {}
    }
}


impl<T> std::fmt::Debug for MpmcBoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpmcBoundedQueue")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish()
    }
}
