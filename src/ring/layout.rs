//! Trailer layout shared by the SPSC and MPMC record ring buffers.
//!
//! Each ring's backing [`AtomicBuffer`](crate::abr::AtomicBuffer) is
//! `data_area_len + size_of::<Trailer>()` bytes: the first `data_area_len`
//! bytes are the framed record area, the remainder is this trailer,
//! reinterpreted in place via a raw pointer cast — the same trick this
//! codebase's `ChannelEntry`/`GlobalHeader` layout uses to put atomic
//! cursors directly at a fixed offset in a shared memory region.

use crossbeam_utils::CachePadded;
use static_assertions::const_assert;
use std::sync::atomic::AtomicU64;

/// Trailer for the SPSC ring: producer position, consumer position, the
/// producer's cached snapshot of the consumer position, a correlation
/// counter, and the heartbeat cell (spec.md §3, §4.3).
///
/// Every field is independently cache-padded per spec.md §5's mandatory
/// padding list: (a) producer vs. consumer position, (b) producer position
/// vs. producer's cache of the consumer position.
#[repr(C)]
pub struct SpscTrailer {
    pub head: CachePadded<AtomicU64>,
    pub tail: CachePadded<AtomicU64>,
    pub head_cache: CachePadded<AtomicU64>,
    pub correlation: CachePadded<AtomicU64>,
    pub heartbeat: CachePadded<AtomicU64>,
}

impl SpscTrailer {
    pub const LEN: usize = std::mem::size_of::<Self>();

    /// Reinterpret the trailer bytes of `buffer` (the last [`Self::LEN`]
    /// bytes of a region whose total length is `data_area_len + Self::LEN`)
    /// as a `SpscTrailer`. The trailer is zero-initialized by the ABR
    /// allocator, which is exactly the all-zero starting state this layout
    /// requires (all counters start at 0).
    ///
    /// # Safety
    /// `ptr` must point to at least `Self::LEN` valid, writable bytes, and
    /// no other `SpscTrailer`/`MpmcTrailer` view may alias them.
    #[inline]
    pub unsafe fn at(ptr: *mut u8) -> *mut SpscTrailer {
        ptr as *mut SpscTrailer
    }
}

/// Trailer for the MPMC ring: producer position, consumer position, and a
/// shared cached snapshot of the consumer position, plus a correlation
/// counter. The MPMC variant has no heartbeat cell — spec.md §4.3 defines
/// heartbeat as SPSC-only.
#[repr(C)]
pub struct MpmcTrailer {
    pub head: CachePadded<AtomicU64>,
    pub tail: CachePadded<AtomicU64>,
    pub head_cache: CachePadded<AtomicU64>,
    pub correlation: CachePadded<AtomicU64>,
}

impl MpmcTrailer {
    pub const LEN: usize = std::mem::size_of::<Self>();

    /// # Safety
    /// `ptr` must point to at least `Self::LEN` valid, writable bytes, and
    /// no other trailer view may alias them.
    #[inline]
    pub unsafe fn at(ptr: *mut u8) -> *mut MpmcTrailer {
        ptr as *mut MpmcTrailer
    }
}

// Each CachePadded<AtomicU64> is at least a cache line; verify the compiler
// actually separated the fields rather than packing them (Design Notes §9:
// "verify at build time with a static assertion on struct size/offsets").
const_assert!(std::mem::size_of::<SpscTrailer>() >= 5 * 64);
const_assert!(std::mem::size_of::<MpmcTrailer>() >= 4 * 64);
