//! `tr-intrusive` - Intrusive reference counting for tensor-runtime-core.
//!
//! This crate provides:
//! - `TargetCounts` / `IntrusiveTarget`: counters embedded in the owned object
//!   plus a one-shot release hook
//! - `StrongRef`: owning handle, `WeakRef`: observer with atomic upgrade
//! - `raw`: release/reclaim of raw pointers for C boundaries
//! - `BorrowView`: borrow-or-own wrapper that avoids count churn

mod borrow;
pub mod raw;
mod strong;
mod target;
mod weak;

#[cfg(test)]
mod testing;

pub use borrow::BorrowView;
pub use strong::{make_owned, StrongRef, Upcast};
pub use target::{IntrusiveTarget, TargetCounts};
pub use weak::WeakRef;
