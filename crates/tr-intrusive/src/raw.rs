//! Converting references to and from raw pointers.
//!
//! These are for handing objects across a C boundary. Each `release*` call
//! gives up ownership of one count unit without touching the counters; the
//! matching `reclaim*` call adopts it back.

use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};

use tr_util::tr_check;

use crate::strong::StrongRef;
use crate::target::IntrusiveTarget;
use crate::weak::WeakRef;

/// Detach the pointer from a strong reference, leaking its strong unit to
/// the caller.
pub fn release<T: ?Sized + IntrusiveTarget>(strong: StrongRef<T>) -> NonNull<T> {
    ManuallyDrop::new(strong).ptr
}

/// Adopt a pointer produced by [`release`].
///
/// # Safety
/// `ptr` must come from [`release`] (directly or through a copy of its
/// value) and the caller must own the strong unit being adopted.
///
/// # Panics
/// The target must have a strong owner, or at least a weak one keeping the
/// allocation alive.
pub unsafe fn reclaim<T: ?Sized + IntrusiveTarget>(ptr: NonNull<T>) -> StrongRef<T> {
    let counts = ptr.as_ref().counts();
    let strong = counts.strong();
    let weak = counts.weak();
    tr_check!(
        strong > 0 || weak > 0,
        "StrongRef: can only reclaim pointers that are owned by someone (strong: {}, weak: {})",
        strong,
        weak
    );
    StrongRef::from_inner(ptr)
}

/// Create a new strong reference from a released pointer while the released
/// unit stays with its current owner.
///
/// # Safety
/// Same as [`reclaim`], except the caller keeps its unit.
pub unsafe fn reclaim_copy<T: ?Sized + IntrusiveTarget>(ptr: NonNull<T>) -> StrongRef<T> {
    let borrowed = ManuallyDrop::new(reclaim(ptr));
    StrongRef::clone(&borrowed)
}

pub fn release_weak<T: ?Sized + IntrusiveTarget>(weak: WeakRef<T>) -> NonNull<T> {
    ManuallyDrop::new(weak).ptr
}

/// Adopt a pointer produced by [`release_weak`].
///
/// # Safety
/// `ptr` must come from [`release_weak`] and the caller must own the weak
/// unit being adopted.
///
/// # Panics
/// The weak count must include a unit besides the one the strong side holds,
/// or the object must be expired with its allocation still alive.
pub unsafe fn reclaim_weak<T: ?Sized + IntrusiveTarget>(ptr: NonNull<T>) -> WeakRef<T> {
    let counts = ptr.as_ref().counts();
    let strong = counts.strong();
    let weak = counts.weak();
    tr_check!(
        weak > 1 || (strong == 0 && weak > 0),
        "WeakRef: can only reclaim pointers that are weakly owned by someone \
         (strong: {}, weak: {})",
        strong,
        weak
    );
    WeakRef::from_inner(ptr)
}

/// # Safety
/// Same as [`reclaim_weak`], except the caller keeps its unit.
pub unsafe fn reclaim_weak_copy<T: ?Sized + IntrusiveTarget>(ptr: NonNull<T>) -> WeakRef<T> {
    let borrowed = ManuallyDrop::new(reclaim_weak(ptr));
    WeakRef::clone(&borrowed)
}

/// The raw value that stands for "no object" on the other side of a boundary.
pub trait NullSentinel<T> {
    fn singleton() -> *mut T;
}

/// Uses the null pointer.
pub struct DefaultNull<T>(PhantomData<fn() -> T>);

impl<T> NullSentinel<T> for DefaultNull<T> {
    fn singleton() -> *mut T {
        ptr::null_mut()
    }
}

/// [`release`], mapping `None` to the sentinel.
pub fn release_or_null<T, N>(strong: Option<StrongRef<T>>) -> *mut T
where
    T: IntrusiveTarget,
    N: NullSentinel<T>,
{
    match strong {
        Some(strong) => release(strong).as_ptr(),
        None => N::singleton(),
    }
}

/// [`reclaim`], mapping the sentinel (and null) to `None`.
///
/// # Safety
/// Unless it is the sentinel or null, `ptr` must satisfy [`reclaim`].
pub unsafe fn reclaim_nullable<T, N>(ptr: *mut T) -> Option<StrongRef<T>>
where
    T: IntrusiveTarget,
    N: NullSentinel<T>,
{
    if ptr == N::singleton() {
        return None;
    }
    NonNull::new(ptr).map(|p| reclaim(p))
}
