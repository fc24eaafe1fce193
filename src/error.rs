//! Error taxonomy for `p-core`.
//!
//! Per the precondition/transient/unsupported split in the design: precondition
//! violations are the only failures ever carried as a [`PCoreError`]. Transient
//! capacity failures (buffer full, buffer empty) are reported through plain
//! `bool`/`Option`/`usize` return values and never allocate or raise here.

use thiserror::Error;

/// A precondition violation or unsupported-operation error.
///
/// These are caller bugs or documented gaps in the protocol, not normal
/// operating conditions. The library never retries internally and never
/// mutates ring/queue state before returning one of these.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum PCoreError {
    /// A caller-supplied `type_id` was non-positive. `0` and negative values
    /// (other than the reserved padding id `-1`) are not valid application
    /// type ids.
    #[error("type id {0} is not a valid application type id (must be positive)")]
    InvalidTypeId(i32),

    /// A requested payload length exceeds [`max_payload_length`](crate::framing::max_payload_length).
    #[error("payload length {requested} exceeds the ring's maximum of {max}")]
    PayloadTooLarge { requested: i32, max: i32 },

    /// A requested length was negative.
    #[error("length {0} is negative")]
    NegativeLength(i32),

    /// A capacity argument was not a power of two.
    #[error("capacity {0} must be a power of two")]
    NonPowerOfTwoCapacity(usize),

    /// A `null`/absent element was offered to an object queue.
    #[error("object queues do not accept a null element")]
    NullElement,

    /// `publish`/`abandon` was called with an offset that did not come from
    /// a matching `claim`.
    #[error("offset {0} was not returned by a prior claim")]
    InvalidClaimOffset(i32),

    /// `controlled_poll` was invoked on the MPMC ring with a handler that
    /// returned `ControlAction::Abort`, which the MPMC variant does not
    /// support (spec.md §4.4, §9).
    #[error("controlled_poll ABORT is not supported on the MPMC ring buffer")]
    UnsupportedAbort,
}

/// The three outcomes a `controlled_poll` handler may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Consume the current record and keep polling.
    Continue,
    /// Consume the current record and stop polling.
    Break,
    /// Stop polling without consuming the current record; it remains first
    /// in line for the next `poll`/`controlled_poll`.
    Abort,
}
