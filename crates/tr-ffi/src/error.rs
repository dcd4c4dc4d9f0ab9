use std::cell::RefCell;
use std::ffi::CString;

use tr_device::DeviceError;
use tr_dispatch::DispatchKeyError;

use crate::types::TRStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `tr_last_error`.
pub fn set_last_error(msg: String) {
    tracing::debug!(error = %msg, "ffi call failed");
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Record `err` and return the status it maps to.
pub fn device_error(err: DeviceError) -> TRStatus {
    let status = match err {
        DeviceError::AllocatorNotSet(_) | DeviceError::GuardNotRegistered(_) => {
            TRStatus::ErrorNotRegistered
        }
        DeviceError::AllocationFailed { .. } => TRStatus::ErrorOutOfMemory,
        DeviceError::NotResizable | DeviceError::ContextNotInstalled => {
            TRStatus::ErrorInvalidState
        }
        _ => TRStatus::ErrorInvalidArgument,
    };
    set_last_error(err.to_string());
    status
}

pub fn dispatch_error(err: DispatchKeyError) -> TRStatus {
    set_last_error(err.to_string());
    TRStatus::ErrorInvalidArgument
}
