use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tr_intrusive::{make_owned, IntrusiveTarget, StrongRef, TargetCounts, WeakRef};

use crate::allocator::{Allocator, DataPtr};
use crate::device::Device;
use crate::error::{DeviceError, Result};
use crate::scalar_type::Element;

struct StorageState {
    data_ptr: DataPtr,
    nbytes: usize,
    resizable: bool,
}

/// The reference-counted header behind a [`Storage`].
///
/// Releasing the last strong reference frees the data block right away; the
/// header itself lives on while weak references observe it.
pub struct StorageImpl {
    counts: TargetCounts,
    device: Device,
    state: Mutex<StorageState>,
    allocator: Option<Arc<dyn Allocator>>,
}

impl StorageImpl {
    fn new(
        data_ptr: DataPtr,
        allocator: Option<Arc<dyn Allocator>>,
        resizable: bool,
    ) -> Result<Self> {
        if resizable && allocator.is_none() {
            return Err(DeviceError::MissingAllocator);
        }
        Ok(Self {
            counts: TargetCounts::new(),
            device: data_ptr.device(),
            state: Mutex::new(StorageState {
                nbytes: data_ptr.len(),
                data_ptr,
                resizable,
            }),
            allocator,
        })
    }

    pub fn nbytes(&self) -> usize {
        self.state.lock().nbytes
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn resizable(&self) -> bool {
        self.state.lock().resizable
    }

    pub fn allocator(&self) -> Option<&Arc<dyn Allocator>> {
        self.allocator.as_ref()
    }
}

impl IntrusiveTarget for StorageImpl {
    fn counts(&self) -> &TargetCounts {
        &self.counts
    }

    fn release_resources(&self) {
        let mut state = self.state.lock();
        let freed = std::mem::replace(&mut state.data_ptr, DataPtr::empty(self.device));
        tracing::trace!(nbytes = freed.len(), device = %self.device, "storage released");
    }
}

impl fmt::Debug for StorageImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StorageImpl")
            .field("device", &self.device)
            .field("nbytes", &state.nbytes)
            .field("resizable", &state.resizable)
            .finish()
    }
}

/// A shared, untyped byte buffer on one device.
///
/// Cloning a `Storage` shares the buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Storage {
    inner: StrongRef<StorageImpl>,
}

impl Storage {
    /// Allocate `nbytes` with `allocator`.
    pub fn new(nbytes: usize, allocator: Arc<dyn Allocator>, resizable: bool) -> Result<Self> {
        let data_ptr = allocator.allocate(nbytes)?;
        Self::from_data_ptr(data_ptr, Some(allocator), resizable)
    }

    /// Wrap an existing block.
    ///
    /// # Errors
    /// A resizable storage needs an allocator.
    pub fn from_data_ptr(
        data_ptr: DataPtr,
        allocator: Option<Arc<dyn Allocator>>,
        resizable: bool,
    ) -> Result<Self> {
        let storage_impl = StorageImpl::new(data_ptr, allocator, resizable)?;
        Ok(Self {
            inner: make_owned(storage_impl),
        })
    }

    pub fn from_ref(inner: StrongRef<StorageImpl>) -> Self {
        Self { inner }
    }

    pub fn into_ref(self) -> StrongRef<StorageImpl> {
        self.inner
    }

    pub fn as_strong_ref(&self) -> &StrongRef<StorageImpl> {
        &self.inner
    }

    pub fn nbytes(&self) -> usize {
        self.inner.nbytes()
    }

    pub fn device(&self) -> Device {
        self.inner.device()
    }

    pub fn resizable(&self) -> bool {
        self.inner.resizable()
    }

    /// # Errors
    /// Only storages with an allocator can become resizable.
    pub fn set_resizable(&self, resizable: bool) -> Result<()> {
        if resizable && self.inner.allocator().is_none() {
            return Err(DeviceError::MissingAllocator);
        }
        self.inner.state.lock().resizable = resizable;
        Ok(())
    }

    pub fn use_count(&self) -> u32 {
        self.inner.strong_count()
    }

    pub fn is_alias_of(&self, other: &Storage) -> bool {
        StrongRef::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakStorage {
        WeakStorage {
            inner: self.inner.downgrade(),
        }
    }

    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let state = self.inner.state.lock();
        f(state.data_ptr.as_slice())
    }

    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut state = self.inner.state.lock();
        f(state.data_ptr.as_mut_slice())
    }

    /// Overwrite the whole buffer with `src`.
    ///
    /// # Errors
    /// `src` must cover the buffer exactly.
    pub fn copy_from_elements<E: Element>(&self, src: &[E]) -> Result<()> {
        let size = E::SCALAR_TYPE.element_size();
        let count = self.element_count::<E>()?;
        if count != src.len() {
            return Err(DeviceError::ElementCountMismatch {
                expected: count,
                got: src.len(),
            });
        }
        self.with_bytes_mut(|bytes| {
            for (chunk, value) in bytes.chunks_exact_mut(size).zip(src) {
                value.write_ne(chunk);
            }
        });
        Ok(())
    }

    pub fn to_elements<E: Element>(&self) -> Result<Vec<E>> {
        let size = E::SCALAR_TYPE.element_size();
        self.element_count::<E>()?;
        Ok(self.with_bytes(|bytes| bytes.chunks_exact(size).map(E::read_ne).collect()))
    }

    fn element_count<E: Element>(&self) -> Result<usize> {
        let size = E::SCALAR_TYPE.element_size();
        let nbytes = self.nbytes();
        if nbytes % size != 0 {
            return Err(DeviceError::ElementSizeMismatch {
                nbytes,
                scalar_type: E::SCALAR_TYPE,
            });
        }
        Ok(nbytes / size)
    }

    /// Swap in a new block and return the old one. The byte size follows the
    /// new block.
    pub fn set_data_ptr(&self, data_ptr: DataPtr) -> DataPtr {
        let mut state = self.inner.state.lock();
        state.nbytes = data_ptr.len();
        std::mem::replace(&mut state.data_ptr, data_ptr)
    }

    /// Reallocate to `nbytes`, keeping the common prefix of the old contents.
    ///
    /// # Errors
    /// The storage must be resizable.
    pub fn resize(&self, nbytes: usize) -> Result<()> {
        let mut state = self.inner.state.lock();
        if !state.resizable {
            return Err(DeviceError::NotResizable);
        }
        let allocator = self
            .inner
            .allocator()
            .ok_or(DeviceError::MissingAllocator)?;
        let mut data_ptr = allocator.allocate(nbytes)?;
        let keep = nbytes.min(state.nbytes);
        if keep > 0 {
            allocator.copy_data(
                &mut data_ptr.as_mut_slice()[..keep],
                &state.data_ptr.as_slice()[..keep],
            );
        }
        tracing::trace!(from = state.nbytes, to = nbytes, "storage resized");
        state.data_ptr = data_ptr;
        state.nbytes = nbytes;
        Ok(())
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

/// A weak reference to a [`Storage`].
#[derive(Clone, PartialEq, Eq)]
pub struct WeakStorage {
    inner: WeakRef<StorageImpl>,
}

impl WeakStorage {
    pub fn from_ref(inner: WeakRef<StorageImpl>) -> Self {
        Self { inner }
    }

    pub fn into_ref(self) -> WeakRef<StorageImpl> {
        self.inner
    }

    pub fn upgrade(&self) -> Option<Storage> {
        self.inner.lock().map(Storage::from_ref)
    }

    pub fn expired(&self) -> bool {
        self.inner.expired()
    }

    pub fn use_count(&self) -> u32 {
        self.inner.use_count()
    }
}

impl fmt::Debug for WeakStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStorage")
            .field("use_count", &self.use_count())
            .finish()
    }
}
