//! `tr-device` - Devices, memory and storage for tensor-runtime-core.
//!
//! This crate provides:
//! - `Device` / `DeviceType` with `name[:index]` parsing
//! - `ScalarType` and the `Element` codec trait (including `half::f16`)
//! - An `Allocator` trait, the aligned `CpuAllocator` and a priority-based
//!   `AllocatorRegistry`
//! - `DeviceGuard`, an RAII current-device switch backed by a
//!   `DeviceGuardRegistry`
//! - `RuntimeContext` tying configuration and registries together
//! - `Storage`, a shared byte buffer built on `tr_intrusive::StrongRef`
//! - `SizesAndStrides`, per-dimension view metadata stored inline for small
//!   ranks

pub mod allocator;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod guard;
pub mod scalar_type;
pub mod sizes_strides;
pub mod storage;

// Re-export primary types at the crate root for convenience.
pub use allocator::{Allocator, AllocatorRegistry, CpuAllocator, DataPtr};
pub use config::RuntimeConfig;
pub use context::RuntimeContext;
pub use device::{Device, DeviceIndex, DeviceType};
pub use error::{DeviceError, Result};
pub use guard::{CpuGuardImpl, DeviceGuard, DeviceGuardImpl, DeviceGuardRegistry};
pub use scalar_type::{Element, ScalarType};
pub use sizes_strides::{SizesAndStrides, INLINE_DIMS};
pub use storage::{Storage, StorageImpl, WeakStorage};
