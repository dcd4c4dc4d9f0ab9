use crate::error::{DeviceError, Result};

/// Runtime-wide settings for allocation and registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Alignment of CPU allocations in bytes; a power of two.
    pub cpu_alignment: usize,
    /// Whether fresh CPU allocations are zeroed.
    pub zero_fill: bool,
    /// Priority the built-in allocators are registered with.
    pub default_allocator_priority: u8,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cpu_alignment: 64,
            zero_fill: true,
            default_allocator_priority: 0,
        }
    }
}

impl RuntimeConfig {
    pub fn with_cpu_alignment(mut self, alignment: usize) -> Self {
        self.cpu_alignment = alignment;
        self
    }

    pub fn with_zero_fill(mut self, zero_fill: bool) -> Self {
        self.zero_fill = zero_fill;
        self
    }

    pub fn with_default_allocator_priority(mut self, priority: u8) -> Self {
        self.default_allocator_priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.cpu_alignment.is_power_of_two() {
            return Err(DeviceError::InvalidConfig(format!(
                "cpu_alignment must be a power of two, got {}",
                self.cpu_alignment
            )));
        }
        Ok(())
    }
}
