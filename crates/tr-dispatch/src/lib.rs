//! `tr-dispatch` - Dispatch keys for tensor-runtime-core.
//!
//! This crate provides:
//! - `DispatchKey` and `BackendComponent` with their (functionality, backend)
//!   decomposition
//! - `DispatchKeySet`, a bit-packed set of keys in one `u64`
//! - Decoding a key set into runtime keys and into a flat dispatch table index

pub mod error;
pub mod iter;
pub mod key;
pub mod keyset;

pub use error::{DispatchKeyError, Result};
pub use iter::Iter;
pub use key::{
    BackendComponent, DispatchKey, FULL_BACKEND_MASK, NUM_BACKENDS, NUM_FUNCTIONALITY_KEYS,
    NUM_PER_BACKEND_FUNCTIONALITY_KEYS, NUM_RUNTIME_ENTRIES,
};
pub use keyset::{offsets_and_masks, DispatchKeySet, FunctionalityOffsetAndMask};
