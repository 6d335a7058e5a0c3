//! Sequence number generation.
//!
//! SMPP sequence numbers correlate requests with responses. They must
//! increase monotonically within 1..=0x7FFFFFFF and wrap back to 1; a
//! process sharing a session id space across hosts can plug in a
//! distributed implementation.

use std::sync::atomic::{AtomicU32, Ordering};

pub const MIN_SEQUENCE_NUMBER: u32 = 0x0000_0001;
pub const MAX_SEQUENCE_NUMBER: u32 = 0x7FFF_FFFF;

pub trait SequenceGenerator: Send + Sync {
    /// The next sequence number in 1..=0x7FFFFFFF.
    fn next_sequence(&self) -> u32;
}

/// Lock-free in-process generator starting at 1.
pub struct AtomicSequence {
    current: AtomicU32,
}

impl AtomicSequence {
    pub fn new() -> Self {
        Self {
            current: AtomicU32::new(0),
        }
    }
}

impl Default for AtomicSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceGenerator for AtomicSequence {
    fn next_sequence(&self) -> u32 {
        let previous = self
            .current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                if n >= MAX_SEQUENCE_NUMBER {
                    Some(MIN_SEQUENCE_NUMBER)
                } else {
                    Some(n + 1)
                }
            })
            .unwrap_or(0);

        if previous >= MAX_SEQUENCE_NUMBER {
            MIN_SEQUENCE_NUMBER
        } else {
            previous + 1
        }
    }
}
