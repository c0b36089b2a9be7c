// SPDX-License-Identifier: LGPL-3.0-only
//! Error types for the core data structures.

use crate::arena::SlotIndex;

/// Errors that can occur in the arena and the hash index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The backing buffer could not be grown.
    #[error("Failed to allocate storage for {requested} slots")]
    AllocationFailed {
        /// Total slot count that was requested.
        requested: usize,
    },

    /// The element is live but not linked into the chain for its own hash.
    #[error("Slot {0} is not linked into its hash chain")]
    NotFound(SlotIndex),

    /// The index does not refer to a live element.
    #[error("Slot {0} does not hold a live element")]
    InvalidIndex(SlotIndex),
}
