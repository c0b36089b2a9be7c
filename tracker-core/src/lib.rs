// SPDX-License-Identifier: LGPL-3.0-only
#![warn(missing_docs)]

//! Core data structures for tracker => See the `tracker` crate.
//!
//! Contains the index-stable arena and the chained hash index the icon caches
//! are built on.

/// Contains the [IndexStableArena](arena::IndexStableArena) and its [SlotIndex](arena::SlotIndex) handles.
pub mod arena;

/// Contains the error type shared by the core data structures.
pub mod error;

/// Contains the [OpenHashIndex](hash::OpenHashIndex) and hashing helpers.
pub mod hash;

pub use arena::{IndexStableArena, SlotIndex};
pub use error::CoreError;
pub use hash::{hash_string, HashedElement, OpenHashIndex};
