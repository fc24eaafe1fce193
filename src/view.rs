//! A borrowed, bounds-limited view over a payload region of an
//! [`AtomicBuffer`](crate::abr::AtomicBuffer), handed to poll handlers
//! (spec.md §6).

use crate::abr::AtomicBuffer;

/// A read/write view over `[offset, offset + length)` of an `AtomicBuffer`.
///
/// Accessors are relative to the view's own start, not the buffer's, and
/// are bounds-checked against `length` rather than the whole buffer.
pub struct PayloadView<'a> {
    buffer: &'a AtomicBuffer,
    offset: usize,
    length: usize,
}

impl<'a> PayloadView<'a> {
    pub(crate) fn new(buffer: &'a AtomicBuffer, offset: usize, length: usize) -> Self {
        Self {
            buffer,
            offset,
            length,
        }
    }

    /// The payload length in bytes (the record's length, not the header's).
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    fn check(&self, rel_offset: usize, width: usize) {
        assert!(
            rel_offset.checked_add(width).is_some_and(|end| end <= self.length),
            "payload view access out of bounds: offset={rel_offset} width={width} length={}",
            self.length
        );
    }

    /// Copy the whole payload into `dst`, which must be at least `length()` bytes.
    pub fn copy_to(&self, dst: &mut [u8]) {
        self.check(0, self.length);
        self.buffer.get_bytes(self.offset, &mut dst[..self.length]);
    }

    pub fn get_u8(&self, rel_offset: usize) -> u8 {
        self.check(rel_offset, 1);
        self.buffer.get_u8(self.offset + rel_offset)
    }

    pub fn get_i32(&self, rel_offset: usize) -> i32 {
        self.check(rel_offset, 4);
        self.buffer.get_i32(self.offset + rel_offset)
    }

    pub fn get_i64(&self, rel_offset: usize) -> i64 {
        self.check(rel_offset, 8);
        self.buffer.get_i64(self.offset + rel_offset)
    }

    pub fn get_u64(&self, rel_offset: usize) -> u64 {
        self.check(rel_offset, 8);
        self.buffer.get_u64(self.offset + rel_offset)
    }

    pub fn put_bytes(&self, rel_offset: usize, src: &[u8]) {
        self.check(rel_offset, src.len());
        self.buffer.put_bytes(self.offset + rel_offset, src);
    }
}
