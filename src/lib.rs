//! Low-allocation, cache-aware concurrency primitives: an addressable byte
//! region, record framing, SPSC/MPMC record ring buffers, and SPSC/MPMC
//! bounded object queues.
//!
//! Dependency order mirrors the module layout: [`abr`] underlies
//! [`framing`] and [`view`], which the [`ring`] variants build on; the
//! [`queue`] variants are independent of framing, built directly on
//! `std::sync::atomic` plus the same cache-padding and CAS-retry idioms.

pub mod abr;
pub mod error;
pub mod framing;
pub mod queue;
pub mod ring;
pub mod shared_memory;
pub mod view;

pub use abr::AtomicBuffer;
pub use error::{ControlAction, PCoreError};
pub use queue::{MpmcBoundedQueue, ObjectQueueBuilder, SpscBoundedQueue};
pub use ring::{MpmcRingBuffer, RingBufferBuilder, SpscRingBuffer};
pub use shared_memory::{attach_shared_memory, create_shared_memory, RawHandle, SharedMemoryBackend};
