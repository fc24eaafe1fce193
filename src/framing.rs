//! Record framing: the per-record header layout and padding-record
//! convention shared by both ring buffer variants (spec.md §4.2).
//!
//! ```text
//! offset 0: length   (32-bit signed)
//! offset 4: type     (32-bit signed)
//! offset 8: payload  (length bytes)
//! total:    align_up(8 + length, 8)
//! ```

use crate::abr::AtomicBuffer;
use std::sync::atomic::AtomicI32;

/// Size of a record header in bytes.
pub const HEADER_LEN: usize = 8;

/// Records (and the data area as a whole) are aligned to this boundary.
pub const RECORD_ALIGNMENT: usize = 8;

/// The reserved `type` value denoting a padding record.
pub const PADDING_TYPE_ID: i32 = -1;

/// Round `n` up to the next multiple of [`RECORD_ALIGNMENT`].
#[inline]
pub const fn align_up(n: usize) -> usize {
    (n + (RECORD_ALIGNMENT - 1)) & !(RECORD_ALIGNMENT - 1)
}

/// The largest payload a ring of the given data-area `capacity` may carry.
///
/// Resolves the open question in spec.md §9: the `capacity / 8` default
/// spec.md §4.2 offers as "acceptable" would reject spec.md §8's own S1
/// scenario (a 952-byte record in a capacity-1024 ring), so this picks the
/// other formula spec.md's Design Notes leave open instead: a single record
/// may use the whole data area, less the one header it must carry. This is
/// the largest limit the framing invariants allow without changing the
/// padding-at-wrap logic, and it is the one the spec's own worked examples
/// require.
#[inline]
pub const fn max_payload_length(capacity: usize) -> i32 {
    (capacity - HEADER_LEN) as i32
}

/// The raw two-`i32` record header, read/written without interpreting sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub length: i32,
    pub type_id: i32,
}

impl RecordHeader {
    #[inline]
    pub fn read(buffer: &AtomicBuffer, offset: usize) -> Self {
        Self {
            length: buffer.get_i32(offset),
            type_id: buffer.get_i32(offset + 4),
        }
    }

    /// Write only the `type` field. Used by producers that must publish the
    /// type before the length becomes visible (MPMC claim) or vice versa
    /// (SPSC publish, where length must be written last).
    #[inline]
    pub fn write_type(buffer: &AtomicBuffer, offset: usize, type_id: i32) {
        buffer.put_i32(offset + 4, type_id);
    }

    #[inline]
    pub fn write_length(buffer: &AtomicBuffer, offset: usize, length: i32) {
        buffer.put_i32(offset, length);
    }

    #[inline]
    pub fn write(buffer: &AtomicBuffer, offset: usize, length: i32, type_id: i32) {
        Self::write_type(buffer, offset, type_id);
        Self::write_length(buffer, offset, length);
    }

    /// Reinterpret the length field at `offset` as an atomic cell. The MPMC
    /// ring's commit protocol needs a genuine `Acquire`/`Release` edge on
    /// this one field, since multiple producers can finish publishing out of
    /// claim order (spec.md §4.4, §9) — the SPSC ring has no equivalent
    /// because its single producer thread is already ordered by `head`.
    #[inline]
    pub(crate) fn length_atomic(buffer: &AtomicBuffer, offset: usize) -> &AtomicI32 {
        let ptr = buffer.ptr_at(offset, 4) as *const AtomicI32;
        // SAFETY: ptr_at bounds-checked `offset` for 4 bytes; AtomicI32 has
        // the same size and layout as i32, and every caller reaches this
        // field only through the claim/publish/abandon/poll protocol, which
        // never aliases it with a non-atomic access.
        unsafe { &*ptr }
    }
}

/// The decoded meaning of a record header, per the Design Notes' resolution
/// of "padding vs claimed vs published" (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A fully published, application-visible record.
    User { type_id: i32, length: i32 },
    /// A padding record inserted to skip unusable trailing bytes.
    Padding { length: i32 },
    /// Claimed but not yet published (MPMC: negative length; SPSC: the slot
    /// simply hasn't been written, observed as a zero length).
    Claimed,
}

impl RecordKind {
    /// Decode a header using the MPMC sign-of-length convention: negative
    /// length means "claimed, not yet published"; `type_id == PADDING_TYPE_ID`
    /// with a non-negative length means padding.
    pub fn decode_mpmc(header: RecordHeader) -> Self {
        if header.length < 0 {
            RecordKind::Claimed
        } else if header.type_id == PADDING_TYPE_ID {
            RecordKind::Padding {
                length: header.length,
            }
        } else {
            RecordKind::User {
                type_id: header.type_id,
                length: header.length,
            }
        }
    }

    /// Decode a header using the SPSC convention: `length == 0` means "not
    /// yet published" (the producer always writes length last).
    pub fn decode_spsc(header: RecordHeader) -> Self {
        if header.length == 0 {
            RecordKind::Claimed
        } else if header.type_id == PADDING_TYPE_ID {
            RecordKind::Padding {
                length: header.length,
            }
        } else {
            RecordKind::User {
                type_id: header.type_id,
                length: header.length,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiple_of_eight() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 8);
        assert_eq!(align_up(8), 8);
        assert_eq!(align_up(9), 16);
        assert_eq!(align_up(64), 64);
    }

    #[test]
    fn max_payload_length_is_capacity_minus_one_header() {
        // capacity 1024, minus the 8-byte header -> 1016; large enough to
        // admit spec.md §8 S1's 952-byte record.
        assert_eq!(max_payload_length(1024), 1016);
        assert!(952 <= max_payload_length(1024));
    }

    #[test]
    fn decode_spsc_distinguishes_claimed_padding_user() {
        assert_eq!(
            RecordKind::decode_spsc(RecordHeader {
                length: 0,
                type_id: 0
            }),
            RecordKind::Claimed
        );
        assert_eq!(
            RecordKind::decode_spsc(RecordHeader {
                length: 16,
                type_id: PADDING_TYPE_ID
            }),
            RecordKind::Padding { length: 16 }
        );
        assert_eq!(
            RecordKind::decode_spsc(RecordHeader {
                length: 16,
                type_id: 3
            }),
            RecordKind::User {
                type_id: 3,
                length: 16
            }
        );
    }

    #[test]
    fn decode_mpmc_distinguishes_claimed_padding_user() {
        assert_eq!(
            RecordKind::decode_mpmc(RecordHeader {
                length: -16,
                type_id: 3
            }),
            RecordKind::Claimed
        );
        assert_eq!(
            RecordKind::decode_mpmc(RecordHeader {
                length: 16,
                type_id: PADDING_TYPE_ID
            }),
            RecordKind::Padding { length: 16 }
        );
        assert_eq!(
            RecordKind::decode_mpmc(RecordHeader {
                length: 16,
                type_id: 3
            }),
            RecordKind::User {
                type_id: 3,
                length: 16
            }
        );
    }
}
