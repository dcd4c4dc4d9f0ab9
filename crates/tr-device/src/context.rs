use std::sync::Arc;

use parking_lot::RwLock;

use crate::allocator::{Allocator, AllocatorRegistry, CpuAllocator};
use crate::config::RuntimeConfig;
use crate::device::{Device, DeviceType};
use crate::error::{DeviceError, Result};
use crate::guard::{CpuGuardImpl, DeviceGuard, DeviceGuardRegistry};
use crate::storage::Storage;

static CURRENT: RwLock<Option<Arc<RuntimeContext>>> = parking_lot::const_rwlock(None);

/// Owns the configuration and the allocator and device guard registries.
///
/// A context can be used directly or installed as the process-wide current
/// context with [`install`].
#[derive(Debug)]
pub struct RuntimeContext {
    config: RuntimeConfig,
    allocators: AllocatorRegistry,
    guards: DeviceGuardRegistry,
}

impl RuntimeContext {
    /// Build a context with the CPU allocator and CPU device guard registered.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let allocators = AllocatorRegistry::new();
        allocators.set_allocator(
            DeviceType::CPU,
            Arc::new(CpuAllocator::from_config(&config)),
            config.default_allocator_priority,
        );
        let guards = DeviceGuardRegistry::new();
        guards.register(Arc::new(CpuGuardImpl));
        Ok(Self {
            config,
            allocators,
            guards,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn allocators(&self) -> &AllocatorRegistry {
        &self.allocators
    }

    pub fn guards(&self) -> &DeviceGuardRegistry {
        &self.guards
    }

    pub fn allocator(&self, device_type: DeviceType) -> Result<Arc<dyn Allocator>> {
        self.allocators.get_allocator(device_type)
    }

    pub fn device_guard(&self, device: Device) -> Result<DeviceGuard> {
        DeviceGuard::new(device, &self.guards)
    }

    /// Allocate a resizable storage of `nbytes` on `device_type`.
    pub fn new_storage(&self, device_type: DeviceType, nbytes: usize) -> Result<Storage> {
        Storage::new(nbytes, self.allocator(device_type)?, true)
    }
}

/// Make `ctx` the current context, replacing any previous one.
pub fn install(ctx: RuntimeContext) -> Arc<RuntimeContext> {
    let ctx = Arc::new(ctx);
    let previous = CURRENT.write().replace(Arc::clone(&ctx));
    tracing::debug!(replaced = previous.is_some(), "runtime context installed");
    ctx
}

pub fn current() -> Result<Arc<RuntimeContext>> {
    CURRENT.read().clone().ok_or(DeviceError::ContextNotInstalled)
}

/// Uninstall the current context. Holders of the returned `Arc` keep it alive.
pub fn teardown() -> Option<Arc<RuntimeContext>> {
    let previous = CURRENT.write().take();
    if previous.is_some() {
        tracing::debug!("runtime context torn down");
    }
    previous
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::tests::FakeCudaGuardImpl;

    #[test]
    fn test_new_registers_cpu() {
        let ctx = RuntimeContext::new(RuntimeConfig::default()).unwrap();
        assert_eq!(ctx.allocator(DeviceType::CPU).unwrap().name(), "cpu");
        assert!(ctx.guards().contains(DeviceType::CPU));
        assert_eq!(
            ctx.allocator(DeviceType::CUDA).unwrap_err(),
            DeviceError::AllocatorNotSet(DeviceType::CUDA)
        );
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = RuntimeConfig::default().with_cpu_alignment(3);
        assert!(matches!(
            RuntimeContext::new(config),
            Err(DeviceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_reaches_allocator() {
        let ctx = RuntimeContext::new(
            RuntimeConfig::default()
                .with_cpu_alignment(256)
                .with_default_allocator_priority(7),
        )
        .unwrap();
        assert_eq!(ctx.allocators().priority(DeviceType::CPU), 7);
        let storage = ctx.new_storage(DeviceType::CPU, 32).unwrap();
        assert_eq!(storage.nbytes(), 32);
        storage.with_bytes(|b| assert_eq!(b.as_ptr() as usize % 256, 0));
    }

    #[test]
    fn test_device_guard_through_context() {
        let ctx = RuntimeContext::new(RuntimeConfig::default()).unwrap();
        assert!(ctx.device_guard(Device::cpu()).is_ok());
        assert!(ctx
            .device_guard(Device::new(DeviceType::CUDA, 0).unwrap())
            .is_err());

        ctx.guards().register(Arc::new(FakeCudaGuardImpl::default()));
        let guard = ctx
            .device_guard(Device::new(DeviceType::CUDA, 1).unwrap())
            .unwrap();
        assert_eq!(guard.current_device().index(), 1);
    }

    // The only test touching the process-wide slot.
    #[test]
    fn test_install_current_teardown() {
        teardown();
        assert_eq!(current().unwrap_err(), DeviceError::ContextNotInstalled);

        let installed = install(RuntimeContext::new(RuntimeConfig::default()).unwrap());
        let cur = current().unwrap();
        assert!(Arc::ptr_eq(&installed, &cur));

        let replacement =
            install(RuntimeContext::new(RuntimeConfig::default().with_zero_fill(false)).unwrap());
        assert!(!current().unwrap().config().zero_fill);

        let removed = teardown().unwrap();
        assert!(Arc::ptr_eq(&removed, &replacement));
        assert!(current().is_err());
        assert!(teardown().is_none());
    }
}
