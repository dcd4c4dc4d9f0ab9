use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::RwLock;
use tr_util::tr_check;

use crate::config::RuntimeConfig;
use crate::device::{Device, DeviceType};
use crate::error::{DeviceError, Result};

/// Fill pattern for allocations that are not zeroed, so reads of
/// never-written memory stand out.
pub const JUNK_BYTE: u8 = 0xA5;

/// An owned block of device memory.
///
/// Frees the block when dropped. A zero-length `DataPtr` holds no block.
pub struct DataPtr {
    ptr: Option<NonNull<u8>>,
    layout: Layout,
    device: Device,
}

// SAFETY: the block is uniquely owned and only reachable through `&self` /
// `&mut self`.
unsafe impl Send for DataPtr {}
unsafe impl Sync for DataPtr {}

impl DataPtr {
    /// A pointer that holds nothing.
    pub fn empty(device: Device) -> Self {
        Self {
            ptr: None,
            layout: Layout::new::<u8>(),
            device,
        }
    }

    fn allocate(nbytes: usize, alignment: usize, zeroed: bool, device: Device) -> Result<Self> {
        if nbytes == 0 {
            return Ok(Self::empty(device));
        }
        let layout = Layout::from_size_align(nbytes, alignment)
            .map_err(|_| DeviceError::AllocationFailed { nbytes, alignment })?;
        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe {
            if zeroed {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };
        let ptr = NonNull::new(raw).ok_or(DeviceError::AllocationFailed { nbytes, alignment })?;
        if !zeroed {
            // SAFETY: fresh block of `nbytes` writable bytes.
            unsafe { std::ptr::write_bytes(ptr.as_ptr(), JUNK_BYTE, nbytes) };
        }
        Ok(Self {
            ptr: Some(ptr),
            layout,
            device,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn len(&self) -> usize {
        match self.ptr {
            Some(_) => self.layout.size(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.map_or(std::ptr::null(), |p| p.as_ptr() as *const u8)
    }

    pub fn as_slice(&self) -> &[u8] {
        match self.ptr {
            // SAFETY: every block is initialized on allocation.
            Some(p) => unsafe { std::slice::from_raw_parts(p.as_ptr(), self.layout.size()) },
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.ptr {
            // SAFETY: unique access through `&mut self`.
            Some(p) => unsafe { std::slice::from_raw_parts_mut(p.as_ptr(), self.layout.size()) },
            None => &mut [],
        }
    }
}

impl Drop for DataPtr {
    fn drop(&mut self) {
        if let Some(p) = self.ptr.take() {
            // SAFETY: allocated in `DataPtr::allocate` with this layout.
            unsafe { alloc::dealloc(p.as_ptr(), self.layout) };
        }
    }
}

impl fmt::Debug for DataPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPtr")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len())
            .field("device", &self.device)
            .finish()
    }
}

/// Source of device memory.
pub trait Allocator: Send + Sync + fmt::Debug {
    /// Returns the name of this allocator (e.g., "cpu").
    fn name(&self) -> &str;

    fn device_type(&self) -> DeviceType;

    /// Allocate `nbytes` bytes. Zero bytes yields an empty `DataPtr`.
    fn allocate(&self, nbytes: usize) -> Result<DataPtr>;

    /// Copy `src` into `dest`; both have the same length.
    fn copy_data(&self, dest: &mut [u8], src: &[u8]) {
        tr_check!(
            dest.len() == src.len(),
            "copy_data length mismatch: dest {} src {}",
            dest.len(),
            src.len()
        );
        dest.copy_from_slice(src);
    }

    /// Allocate a new block and copy `src` into it.
    fn clone_data(&self, src: &[u8]) -> Result<DataPtr> {
        let mut data = self.allocate(src.len())?;
        self.copy_data(data.as_mut_slice(), src);
        Ok(data)
    }
}

/// Host memory allocator.
#[derive(Debug, Clone)]
pub struct CpuAllocator {
    alignment: usize,
    zero_fill: bool,
}

impl CpuAllocator {
    pub fn new() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            alignment: config.cpu_alignment,
            zero_fill: config.zero_fill,
        }
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }
}

impl Default for CpuAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for CpuAllocator {
    fn name(&self) -> &str {
        "cpu"
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::CPU
    }

    fn allocate(&self, nbytes: usize) -> Result<DataPtr> {
        let data = DataPtr::allocate(nbytes, self.alignment, self.zero_fill, Device::cpu())?;
        tracing::trace!(nbytes, alignment = self.alignment, "cpu allocation");
        Ok(data)
    }
}

struct AllocatorSlot {
    allocator: Arc<dyn Allocator>,
    priority: u8,
}

/// One allocator per device type, replaced only by equal or higher priority.
pub struct AllocatorRegistry {
    slots: RwLock<[Option<AllocatorSlot>; DeviceType::COUNT]>,
}

impl AllocatorRegistry {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Default::default()),
        }
    }

    /// Install `allocator` for `device_type` unless the current one was
    /// registered with a higher priority. Returns whether it was installed.
    pub fn set_allocator(
        &self,
        device_type: DeviceType,
        allocator: Arc<dyn Allocator>,
        priority: u8,
    ) -> bool {
        let mut slots = self.slots.write();
        let slot = &mut slots[device_type.ordinal()];
        let current = slot.as_ref().map_or(0, |s| s.priority);
        if priority < current {
            tracing::debug!(
                %device_type,
                priority,
                current,
                "allocator registration ignored"
            );
            return false;
        }
        tracing::debug!(%device_type, name = allocator.name(), priority, "allocator registered");
        *slot = Some(AllocatorSlot {
            allocator,
            priority,
        });
        true
    }

    pub fn get_allocator(&self, device_type: DeviceType) -> Result<Arc<dyn Allocator>> {
        self.slots.read()[device_type.ordinal()]
            .as_ref()
            .map(|s| Arc::clone(&s.allocator))
            .ok_or(DeviceError::AllocatorNotSet(device_type))
    }

    /// Priority of the installed allocator, 0 when none is set.
    pub fn priority(&self, device_type: DeviceType) -> u8 {
        self.slots.read()[device_type.ordinal()]
            .as_ref()
            .map_or(0, |s| s.priority)
    }
}

impl Default for AllocatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AllocatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        let mut list = f.debug_list();
        for (ordinal, slot) in slots.iter().enumerate() {
            if let (Some(slot), Some(t)) = (slot, DeviceType::from_ordinal(ordinal)) {
                list.entry(&format_args!(
                    "{}: {} (priority {})",
                    t,
                    slot.allocator.name(),
                    slot.priority
                ));
            }
        }
        list.finish()
    }
}
