//! `tr-util` - Shared primitives for tensor-runtime-core.
//!
//! This crate provides:
//! - Bit-mask and find-first-set helpers over `u32`/`u64`
//! - The fail-fast contract check used by every other crate

pub mod bits;
mod check;

pub use check::contract_violation;
