use thiserror::Error;

use crate::device::{DeviceIndex, DeviceType};
use crate::scalar_type::ScalarType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device string is empty")]
    EmptyDeviceString,
    #[error("invalid device string: '{0}'")]
    InvalidDeviceString(String),
    #[error("invalid device name: '{0}'. Available device names are: cpu, cuda")]
    InvalidDeviceName(String),
    #[error("invalid device index: '{index}' in device string: '{device}'")]
    InvalidDeviceIndex { index: String, device: String },
    #[error("device index must be -1 or non-negative, got {0}")]
    NegativeDeviceIndex(DeviceIndex),
    #[error("CPU device index must be -1 or zero, got {0}")]
    InvalidCpuIndex(DeviceIndex),
    #[error("allocator for {0} is not set")]
    AllocatorNotSet(DeviceType),
    #[error("failed to allocate {nbytes} bytes with alignment {alignment}")]
    AllocationFailed { nbytes: usize, alignment: usize },
    #[error("no device guard registered for {0}")]
    GuardNotRegistered(DeviceType),
    #[error("device guard type mismatch: expected {expected}, got {got}")]
    GuardTypeMismatch { expected: DeviceType, got: DeviceType },
    #[error("storage is not resizable")]
    NotResizable,
    #[error("resizable storage requires an allocator")]
    MissingAllocator,
    #[error("{nbytes} bytes do not hold a whole number of {scalar_type} elements")]
    ElementSizeMismatch { nbytes: usize, scalar_type: ScalarType },
    #[error("element count mismatch: storage holds {expected}, got {got}")]
    ElementCountMismatch { expected: usize, got: usize },
    #[error("invalid runtime config: {0}")]
    InvalidConfig(String),
    #[error("no runtime context is installed")]
    ContextNotInstalled,
}

pub type Result<T> = std::result::Result<T, DeviceError>;
