use tr_device::{DeviceType, RuntimeConfig};

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TRStatus {
    Ok = 0,
    ErrorInvalidArgument = 1,
    ErrorNotRegistered = 2,
    ErrorOutOfMemory = 3,
    ErrorInvalidState = 4,
    ErrorInternal = 5,
}

/// Device type selector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TRDeviceType {
    Cpu = 0,
    Cuda = 1,
}

impl From<TRDeviceType> for DeviceType {
    fn from(t: TRDeviceType) -> Self {
        match t {
            TRDeviceType::Cpu => DeviceType::CPU,
            TRDeviceType::Cuda => DeviceType::CUDA,
        }
    }
}

impl From<DeviceType> for TRDeviceType {
    fn from(t: DeviceType) -> Self {
        match t {
            DeviceType::CPU => TRDeviceType::Cpu,
            DeviceType::CUDA => TRDeviceType::Cuda,
        }
    }
}

/// Parameters for creating a runtime context.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct TRRuntimeParams {
    pub cpu_alignment: usize,
    pub zero_fill: bool,
    pub default_allocator_priority: u8,
}

impl Default for TRRuntimeParams {
    fn default() -> Self {
        let config = RuntimeConfig::default();
        Self {
            cpu_alignment: config.cpu_alignment,
            zero_fill: config.zero_fill,
            default_allocator_priority: config.default_allocator_priority,
        }
    }
}

impl From<&TRRuntimeParams> for RuntimeConfig {
    fn from(params: &TRRuntimeParams) -> Self {
        RuntimeConfig::default()
            .with_cpu_alignment(params.cpu_alignment)
            .with_zero_fill(params.zero_fill)
            .with_default_allocator_priority(params.default_allocator_priority)
    }
}

/// Opaque handle to a shared storage. Each handle owns one strong reference.
pub struct TRStorage {
    _private: [u8; 0],
}

/// Opaque handle to a weak storage reference. Each handle owns one weak
/// reference.
pub struct TRWeakStorage {
    _private: [u8; 0],
}
