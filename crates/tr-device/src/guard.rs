use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tr_util::tr_check;

use crate::device::{Device, DeviceIndex, DeviceType};
use crate::error::{DeviceError, Result};

/// Per-device-type control over the thread's current device.
pub trait DeviceGuardImpl: Send + Sync + fmt::Debug {
    fn device_type(&self) -> DeviceType;

    /// Make `device` current and return the device that was current before.
    fn exchange_device(&self, device: Device) -> Device;

    fn get_device(&self) -> Device;

    fn set_device(&self, device: Device);

    /// Like `set_device` but must not fail; used when restoring on drop.
    fn unchecked_set_device(&self, device: Device);
}

/// The host has exactly one device, so switching is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuGuardImpl;

impl DeviceGuardImpl for CpuGuardImpl {
    fn device_type(&self) -> DeviceType {
        DeviceType::CPU
    }

    fn exchange_device(&self, device: Device) -> Device {
        tr_check!(device.is_cpu(), "CpuGuardImpl cannot switch to {}", device);
        Device::cpu()
    }

    fn get_device(&self) -> Device {
        Device::cpu()
    }

    fn set_device(&self, device: Device) {
        tr_check!(device.is_cpu(), "CpuGuardImpl cannot switch to {}", device);
    }

    fn unchecked_set_device(&self, _device: Device) {}
}

/// Guard implementations looked up by device type ordinal.
pub struct DeviceGuardRegistry {
    impls: RwLock<[Option<Arc<dyn DeviceGuardImpl>>; DeviceType::COUNT]>,
}

impl DeviceGuardRegistry {
    pub fn new() -> Self {
        Self {
            impls: RwLock::new(Default::default()),
        }
    }

    /// Register `guard_impl` under its own device type, replacing any earlier
    /// registration.
    pub fn register(&self, guard_impl: Arc<dyn DeviceGuardImpl>) {
        let device_type = guard_impl.device_type();
        tracing::debug!(%device_type, "device guard registered");
        self.impls.write()[device_type.ordinal()] = Some(guard_impl);
    }

    pub fn get(&self, device_type: DeviceType) -> Result<Arc<dyn DeviceGuardImpl>> {
        self.impls.read()[device_type.ordinal()]
            .clone()
            .ok_or(DeviceError::GuardNotRegistered(device_type))
    }

    pub fn contains(&self, device_type: DeviceType) -> bool {
        self.impls.read()[device_type.ordinal()].is_some()
    }
}

impl Default for DeviceGuardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeviceGuardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let impls = self.impls.read();
        f.debug_list()
            .entries(impls.iter().flatten().map(|g| g.device_type()))
            .finish()
    }
}

/// Switches the current device for its lifetime and restores the original
/// device when dropped.
///
/// A device with index -1 leaves the current device alone.
pub struct DeviceGuard {
    guard_impl: Arc<dyn DeviceGuardImpl>,
    original_device: Device,
    current_device: Device,
}

impl DeviceGuard {
    pub fn new(device: Device, registry: &DeviceGuardRegistry) -> Result<Self> {
        let guard_impl = registry.get(device.device_type())?;
        Self::with_impl(device, guard_impl)
    }

    /// # Errors
    /// `guard_impl` must handle `device`'s type.
    pub fn with_impl(device: Device, guard_impl: Arc<dyn DeviceGuardImpl>) -> Result<Self> {
        if guard_impl.device_type() != device.device_type() {
            return Err(DeviceError::GuardTypeMismatch {
                expected: device.device_type(),
                got: guard_impl.device_type(),
            });
        }
        let (original_device, current_device) = if device.has_index() {
            (guard_impl.exchange_device(device), device)
        } else {
            let current = guard_impl.get_device();
            (current, current)
        };
        tracing::trace!(%original_device, %current_device, "device guard entered");
        Ok(Self {
            guard_impl,
            original_device,
            current_device,
        })
    }

    /// Switch to `device`. A different device type first restores the
    /// original device of the old type and then guards the new type.
    pub fn reset_device(&mut self, device: Device, registry: &DeviceGuardRegistry) -> Result<()> {
        if !device.has_index() {
            return Ok(());
        }
        if device.device_type() == self.original_device.device_type() {
            self.guard_impl.set_device(device);
            self.current_device = device;
            return Ok(());
        }

        let new_impl = registry.get(device.device_type())?;
        self.guard_impl.set_device(self.original_device);
        self.original_device = new_impl.exchange_device(device);
        self.guard_impl = new_impl;
        self.current_device = device;
        Ok(())
    }

    /// Switch to another index of the original device type.
    pub fn set_index(&mut self, index: DeviceIndex) -> Result<()> {
        let device = Device::new(self.original_device.device_type(), index)?;
        if device.has_index() {
            self.guard_impl.set_device(device);
            self.current_device = device;
        }
        Ok(())
    }

    pub fn original_device(&self) -> Device {
        self.original_device
    }

    pub fn current_device(&self) -> Device {
        self.current_device
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.guard_impl.unchecked_set_device(self.original_device);
    }
}

impl fmt::Debug for DeviceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceGuard")
            .field("original_device", &self.original_device)
            .field("current_device", &self.current_device)
            .finish()
    }
}
