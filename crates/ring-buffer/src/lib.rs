//! Fixed-Capacity Ring Buffer
//!
//! Bounded history storage where pushing into a full buffer evicts the
//! oldest entry. Used for rolling per-eye threshold histories.

mod buffer;

pub use buffer::RingBuffer;

use thiserror::Error;

/// Ring buffer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingBufferError {
    #[error("Ring buffer capacity must be at least 1")]
    ZeroCapacity,
}
