//! Record ring buffers: an SPSC variant and an MPMC variant sharing the
//! same framing (spec.md §4.2, §4.3, §4.4).

pub mod layout;
pub mod mpmc;
pub mod spsc;

pub use mpmc::MpmcRingBuffer;
pub use spsc::SpscRingBuffer;

use crate::error::PCoreError;

/// Validated construction for either ring variant, mirroring this
/// codebase's `ChannelBuilder` (`with_*` consuming setters, `build_*`
/// terminal methods).
#[derive(Debug, Clone, Copy)]
pub struct RingBufferBuilder {
    capacity: usize,
}

impl Default for RingBufferBuilder {
    fn default() -> Self {
        Self { capacity: 1024 * 1024 }
    }
}

impl RingBufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data-area capacity in bytes. Must be a power of two; validated at
    /// `build_spsc`/`build_mpmc` time rather than here, so the builder
    /// itself never fails.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build_spsc(self) -> Result<SpscRingBuffer, PCoreError> {
        SpscRingBuffer::new(self.capacity)
    }

    pub fn build_mpmc(self) -> Result<MpmcRingBuffer, PCoreError> {
        MpmcRingBuffer::new(self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_non_power_of_two_capacity() {
        let err = RingBufferBuilder::new().with_capacity(1000).build_spsc().unwrap_err();
        assert_eq!(err, PCoreError::NonPowerOfTwoCapacity(1000));

        let err = RingBufferBuilder::new().with_capacity(1000).build_mpmc().unwrap_err();
        assert_eq!(err, PCoreError::NonPowerOfTwoCapacity(1000));
    }

    #[test]
    fn builder_builds_with_default_capacity() {
        let ring = RingBufferBuilder::new().build_spsc().unwrap();
        assert_eq!(ring.size(), 1024 * 1024);
    }
}
