//! Bounded object queues: an SPSC variant and an MPMC variant, both holding
//! `T` directly rather than framed bytes (spec.md §4.5, §4.6).

pub mod mpmc;
pub mod spsc;

pub use mpmc::MpmcBoundedQueue;
pub use spsc::SpscBoundedQueue;

use crate::error::PCoreError;

/// Validated construction for either object queue variant, mirroring
/// [`crate::ring::RingBufferBuilder`] and this codebase's `ChannelBuilder`.
#[derive(Debug, Clone, Copy)]
pub struct ObjectQueueBuilder {
    capacity: usize,
}

impl Default for ObjectQueueBuilder {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl ObjectQueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot count. Must be a power of two; validated at build time.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build_spsc<T>(self) -> Result<SpscBoundedQueue<T>, PCoreError> {
        SpscBoundedQueue::new(self.capacity)
    }

    pub fn build_mpmc<T>(self) -> Result<MpmcBoundedQueue<T>, PCoreError> {
        MpmcBoundedQueue::new(self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_non_power_of_two_capacity() {
        let err = ObjectQueueBuilder::new()
            .with_capacity(3)
            .build_spsc::<i32>()
            .unwrap_err();
        assert_eq!(err, PCoreError::NonPowerOfTwoCapacity(3));
    }

    #[test]
    fn builder_builds_with_default_capacity() {
        let q = ObjectQueueBuilder::new().build_mpmc::<i32>().unwrap();
        assert_eq!(q.capacity(), 1024);
    }
}
