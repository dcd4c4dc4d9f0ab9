//! `tr-ffi` - C ABI for tensor-runtime-core.
//!
//! Storage handles cross the boundary as raw pointers that each own one
//! strong (or weak) reference, converted with `tr_intrusive::raw`.

mod context;
mod error;
mod types;

pub use context::*;
pub use error::*;
pub use types::*;

use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;

use tr_device::{Device, Storage, StorageImpl, WeakStorage};
use tr_dispatch::DispatchKeySet;
use tr_intrusive::raw::{self, DefaultNull};

/// Execute a closure that returns a `TRStatus`, catching any panics
/// (including contract violations) and converting them into
/// `TRStatus::ErrorInternal`.
fn catch_panic<F: FnOnce() -> TRStatus>(f: F) -> TRStatus {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "internal panic".to_string());
            set_last_error(msg);
            TRStatus::ErrorInternal
        }
    }
}

fn storage_ptr(storage: *mut TRStorage) -> Option<NonNull<StorageImpl>> {
    NonNull::new(storage.cast::<StorageImpl>())
}

fn weak_storage_ptr(weak: *mut TRWeakStorage) -> Option<NonNull<StorageImpl>> {
    NonNull::new(weak.cast::<StorageImpl>())
}

/// View the storage behind a handle without touching its counts. The handle
/// keeps its strong unit.
///
/// # Safety
/// `ptr` must be a live handle from this library.
unsafe fn borrow_storage(ptr: NonNull<StorageImpl>) -> ManuallyDrop<Storage> {
    ManuallyDrop::new(Storage::from_ref(raw::reclaim(ptr)))
}

/// Hand a storage to C, transferring its strong reference.
fn export_storage(storage: Storage) -> *mut TRStorage {
    raw::release(storage.into_ref()).as_ptr().cast::<TRStorage>()
}

/// Create a new runtime context.
///
/// On success, writes a heap-allocated `TRContext` pointer into `*ctx_out`.
/// The caller must later call `tr_context_destroy` to free the context.
#[no_mangle]
pub unsafe extern "C" fn tr_context_create(
    params: TRRuntimeParams,
    ctx_out: *mut *mut TRContext,
) -> TRStatus {
    catch_panic(|| {
        if ctx_out.is_null() {
            set_last_error("ctx_out is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let ctx = match TRContext::new((&params).into()) {
            Ok(c) => c,
            Err(e) => return device_error(e),
        };
        unsafe {
            *ctx_out = Box::into_raw(Box::new(ctx));
        }
        TRStatus::Ok
    })
}

/// Destroy a context previously created by `tr_context_create`.
///
/// Storages created from the context stay valid. Passing a null pointer is a
/// no-op.
#[no_mangle]
pub unsafe extern "C" fn tr_context_destroy(ctx: *mut TRContext) -> TRStatus {
    if ctx.is_null() {
        return TRStatus::Ok;
    }
    drop(Box::from_raw(ctx));
    TRStatus::Ok
}

/// Allocate a resizable storage of `nbytes` on `device_type`.
///
/// The caller owns the returned handle and must pass it to
/// `tr_storage_release`.
#[no_mangle]
pub unsafe extern "C" fn tr_storage_create(
    ctx: *const TRContext,
    device_type: TRDeviceType,
    nbytes: usize,
    storage_out: *mut *mut TRStorage,
) -> TRStatus {
    catch_panic(|| {
        if ctx.is_null() || storage_out.is_null() {
            set_last_error("null argument".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let ctx = unsafe { &*ctx };
        let storage = match ctx.runtime.new_storage(device_type.into(), nbytes) {
            Ok(s) => s,
            Err(e) => return device_error(e),
        };
        unsafe {
            *storage_out = export_storage(storage);
        }
        TRStatus::Ok
    })
}

/// Create another handle to the same storage.
#[no_mangle]
pub unsafe extern "C" fn tr_storage_retain(
    storage: *mut TRStorage,
    storage_out: *mut *mut TRStorage,
) -> TRStatus {
    catch_panic(|| {
        let Some(ptr) = storage_ptr(storage) else {
            set_last_error("storage is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        };
        if storage_out.is_null() {
            set_last_error("storage_out is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let storage = unsafe { borrow_storage(ptr) };
        unsafe {
            *storage_out = export_storage(Storage::clone(&storage));
        }
        TRStatus::Ok
    })
}

/// Release a storage handle. Passing a null pointer is a no-op.
#[no_mangle]
pub unsafe extern "C" fn tr_storage_release(storage: *mut TRStorage) -> TRStatus {
    catch_panic(|| {
        let ptr = storage.cast::<StorageImpl>();
        drop(unsafe { raw::reclaim_nullable::<StorageImpl, DefaultNull<StorageImpl>>(ptr) });
        TRStatus::Ok
    })
}

#[no_mangle]
pub unsafe extern "C" fn tr_storage_nbytes(
    storage: *mut TRStorage,
    nbytes_out: *mut usize,
) -> TRStatus {
    catch_panic(|| {
        let Some(ptr) = storage_ptr(storage) else {
            set_last_error("storage is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        };
        if nbytes_out.is_null() {
            set_last_error("nbytes_out is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let storage = unsafe { borrow_storage(ptr) };
        unsafe {
            *nbytes_out = storage.nbytes();
        }
        TRStatus::Ok
    })
}

/// Number of live handles (strong references) to the storage.
#[no_mangle]
pub unsafe extern "C" fn tr_storage_use_count(
    storage: *mut TRStorage,
    count_out: *mut u32,
) -> TRStatus {
    catch_panic(|| {
        let Some(ptr) = storage_ptr(storage) else {
            set_last_error("storage is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        };
        if count_out.is_null() {
            set_last_error("count_out is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let storage = unsafe { borrow_storage(ptr) };
        unsafe {
            *count_out = storage.use_count();
        }
        TRStatus::Ok
    })
}

/// Copy `len` bytes from `src` into the start of the storage.
#[no_mangle]
pub unsafe extern "C" fn tr_storage_write(
    storage: *mut TRStorage,
    src: *const u8,
    len: usize,
) -> TRStatus {
    catch_panic(|| {
        let Some(ptr) = storage_ptr(storage) else {
            set_last_error("storage is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        };
        if src.is_null() && len > 0 {
            set_last_error("src is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let storage = unsafe { borrow_storage(ptr) };
        if len > storage.nbytes() {
            set_last_error(format!(
                "write of {} bytes exceeds storage of {} bytes",
                len,
                storage.nbytes()
            ));
            return TRStatus::ErrorInvalidArgument;
        }
        if len > 0 {
            let src = unsafe { std::slice::from_raw_parts(src, len) };
            storage.with_bytes_mut(|bytes| bytes[..len].copy_from_slice(src));
        }
        TRStatus::Ok
    })
}

/// Copy `len` bytes from the start of the storage into `dst`.
#[no_mangle]
pub unsafe extern "C" fn tr_storage_read(
    storage: *mut TRStorage,
    dst: *mut u8,
    len: usize,
) -> TRStatus {
    catch_panic(|| {
        let Some(ptr) = storage_ptr(storage) else {
            set_last_error("storage is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        };
        if dst.is_null() && len > 0 {
            set_last_error("dst is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let storage = unsafe { borrow_storage(ptr) };
        if len > storage.nbytes() {
            set_last_error(format!(
                "read of {} bytes exceeds storage of {} bytes",
                len,
                storage.nbytes()
            ));
            return TRStatus::ErrorInvalidArgument;
        }
        if len > 0 {
            let dst = unsafe { std::slice::from_raw_parts_mut(dst, len) };
            storage.with_bytes(|bytes| dst.copy_from_slice(&bytes[..len]));
        }
        TRStatus::Ok
    })
}

/// Create a weak handle observing `storage`.
///
/// The caller must pass it to `tr_weak_storage_release`.
#[no_mangle]
pub unsafe extern "C" fn tr_weak_storage_downgrade(
    storage: *mut TRStorage,
    weak_out: *mut *mut TRWeakStorage,
) -> TRStatus {
    catch_panic(|| {
        let Some(ptr) = storage_ptr(storage) else {
            set_last_error("storage is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        };
        if weak_out.is_null() {
            set_last_error("weak_out is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let weak = unsafe { borrow_storage(ptr) }.downgrade();
        unsafe {
            *weak_out = raw::release_weak(weak.into_ref())
                .as_ptr()
                .cast::<TRWeakStorage>();
        }
        TRStatus::Ok
    })
}

/// Try to obtain a strong handle from a weak one.
///
/// Writes null into `*storage_out` when the storage has already been
/// released.
#[no_mangle]
pub unsafe extern "C" fn tr_weak_storage_lock(
    weak: *mut TRWeakStorage,
    storage_out: *mut *mut TRStorage,
) -> TRStatus {
    catch_panic(|| {
        let Some(ptr) = weak_storage_ptr(weak) else {
            set_last_error("weak is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        };
        if storage_out.is_null() {
            set_last_error("storage_out is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let weak = WeakStorage::from_ref(unsafe { raw::reclaim_weak_copy(ptr) });
        let locked = weak.upgrade().map(Storage::into_ref);
        unsafe {
            *storage_out = raw::release_or_null::<StorageImpl, DefaultNull<StorageImpl>>(locked)
                .cast::<TRStorage>();
        }
        TRStatus::Ok
    })
}

/// Release a weak handle. Passing a null pointer is a no-op.
#[no_mangle]
pub unsafe extern "C" fn tr_weak_storage_release(weak: *mut TRWeakStorage) -> TRStatus {
    catch_panic(|| {
        if let Some(ptr) = weak_storage_ptr(weak) {
            drop(unsafe { raw::reclaim_weak(ptr) });
        }
        TRStatus::Ok
    })
}

/// Parse a device string such as `"cuda:1"`.
///
/// Writes the device type and index (-1 when absent).
#[no_mangle]
pub unsafe extern "C" fn tr_device_parse(
    device: *const c_char,
    type_out: *mut TRDeviceType,
    index_out: *mut i8,
) -> TRStatus {
    catch_panic(|| {
        if device.is_null() || type_out.is_null() || index_out.is_null() {
            set_last_error("null argument".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let device_str = match unsafe { CStr::from_ptr(device) }.to_str() {
            Ok(s) => s,
            Err(e) => {
                set_last_error(format!("invalid device string: {}", e));
                return TRStatus::ErrorInvalidArgument;
            }
        };
        let parsed: Device = match device_str.parse() {
            Ok(d) => d,
            Err(e) => return device_error(e),
        };
        unsafe {
            *type_out = parsed.device_type().into();
            *index_out = parsed.index();
        }
        TRStatus::Ok
    })
}

/// Compute the dispatch table slot for a raw key set representation.
#[no_mangle]
pub unsafe extern "C" fn tr_dispatch_table_index(repr: u64, index_out: *mut usize) -> TRStatus {
    catch_panic(|| {
        if index_out.is_null() {
            set_last_error("index_out is null".to_string());
            return TRStatus::ErrorInvalidArgument;
        }
        let index = match DispatchKeySet::from_raw_checked(repr)
            .and_then(DispatchKeySet::try_dispatch_table_index)
        {
            Ok(i) => i,
            Err(e) => return dispatch_error(e),
        };
        unsafe {
            *index_out = index;
        }
        TRStatus::Ok
    })
}

/// Retrieve the last error message, or null if there is none.
///
/// The caller must free the returned string with `tr_free_string`.
#[no_mangle]
pub extern "C" fn tr_last_error() -> *const c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null(),
    }
}

/// Free a string previously returned by `tr_last_error`.
#[no_mangle]
pub unsafe extern "C" fn tr_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
