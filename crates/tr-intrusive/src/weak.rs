use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

use tr_util::tr_check;

use crate::strong::{StrongRef, Upcast};
use crate::target::{IntrusiveTarget, TargetCounts};

/// A non-owning observer of an intrusively counted object.
///
/// A weak reference keeps the allocation alive but not the object's
/// resources: once the last [`StrongRef`] is gone the release hook has run and
/// [`lock`](WeakRef::lock) returns `None`.
pub struct WeakRef<T: ?Sized + IntrusiveTarget> {
    pub(crate) ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

unsafe impl<T: ?Sized + IntrusiveTarget + Send + Sync> Send for WeakRef<T> {}
unsafe impl<T: ?Sized + IntrusiveTarget + Send + Sync> Sync for WeakRef<T> {}

impl<T: ?Sized + IntrusiveTarget> WeakRef<T> {
    pub fn new(strong: &StrongRef<T>) -> Self {
        strong.counts().weak.fetch_add(1, Ordering::AcqRel);
        Self {
            ptr: strong.ptr,
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// `ptr` must come from a `WeakRef` and the caller transfers one weak unit
    /// to the result.
    pub(crate) unsafe fn from_inner(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    pub(crate) fn counts(&self) -> &TargetCounts {
        // SAFETY: a weak unit keeps the allocation alive; only the counters
        // are read through it.
        unsafe { self.ptr.as_ref() }.counts()
    }

    /// Number of strong references still alive.
    pub fn use_count(&self) -> u32 {
        self.counts().strong()
    }

    pub fn weak_count(&self) -> u32 {
        self.counts().weak()
    }

    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Try to obtain a strong reference.
    ///
    /// Only increments the strong count from a nonzero value, so an object
    /// whose release hook has started is never revived.
    pub fn lock(&self) -> Option<StrongRef<T>> {
        if self.expired() {
            return None;
        }
        let strong = &self.counts().strong;
        let mut current = strong.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return None;
            }
            match strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                // SAFETY: the unit just added belongs to the new reference.
                Ok(_) => return Some(unsafe { StrongRef::from_inner(self.ptr) }),
                Err(observed) => current = observed,
            }
        }
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        std::ptr::addr_eq(a.ptr.as_ptr(), b.ptr.as_ptr())
    }

    pub fn upcast<U>(self) -> WeakRef<U>
    where
        U: ?Sized + IntrusiveTarget,
        T: Upcast<U>,
    {
        let this = ManuallyDrop::new(self);
        WeakRef {
            ptr: T::upcast(this.ptr),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + IntrusiveTarget> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        let new_count = self.counts().weak.fetch_add(1, Ordering::AcqRel) + 1;
        tr_check!(
            new_count != 1,
            "WeakRef: cannot increase weakcount after it reached zero."
        );
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + IntrusiveTarget> Drop for WeakRef<T> {
    fn drop(&mut self) {
        if self.counts().weak.fetch_sub(1, Ordering::AcqRel) == 1 {
            // SAFETY: the allocation came from `Box` and this was the last
            // unit of any kind.
            unsafe { drop(Box::from_raw(self.ptr.as_ptr())) };
        }
    }
}

impl<T: ?Sized + IntrusiveTarget> PartialEq for WeakRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized + IntrusiveTarget> Eq for WeakRef<T> {}

impl<T: ?Sized + IntrusiveTarget> PartialOrd for WeakRef<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized + IntrusiveTarget> Ord for WeakRef<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ptr.cast::<u8>().cmp(&other.ptr.cast::<u8>())
    }
}

impl<T: ?Sized + IntrusiveTarget> Hash for WeakRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.cast::<u8>().hash(state);
    }
}

impl<T: ?Sized + IntrusiveTarget> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRef")
            .field("ptr", &self.ptr.cast::<u8>())
            .field("use_count", &self.use_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make_owned;
    use crate::testing::{LifeLog, Tracked};

    #[test]
    fn test_downgrade_counts() {
        let log = LifeLog::default();
        let strong = make_owned(Tracked::new(1, &log));
        let weak = strong.downgrade();
        assert_eq!(strong.weak_count(), 2);
        assert_eq!(weak.use_count(), 1);
        assert!(!weak.expired());
        let weak2 = weak.clone();
        assert_eq!(weak2.weak_count(), 3);
        drop(weak2);
        assert_eq!(strong.weak_count(), 2);
    }

    #[test]
    fn test_lock_while_alive() {
        let log = LifeLog::default();
        let strong = make_owned(Tracked::new(5, &log));
        let weak = WeakRef::new(&strong);
        let locked = weak.lock().expect("target is alive");
        assert_eq!(locked.value, 5);
        assert_eq!(strong.strong_count(), 2);
        assert!(StrongRef::ptr_eq(&locked, &strong));
    }

    #[test]
    fn test_last_strong_drop_under_weak() {
        let log = LifeLog::default();
        let strong = make_owned(Tracked::new(1, &log));
        let weak = strong.downgrade();
        drop(strong);

        assert!(weak.expired());
        assert!(weak.lock().is_none());
        assert_eq!(log.released(), 1);
        // the weak unit keeps the allocation
        assert_eq!(log.dropped(), 0);
        assert_eq!(weak.weak_count(), 1);

        drop(weak);
        assert_eq!(log.released(), 1);
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn test_release_hook_fires_without_weak() {
        let log = LifeLog::default();
        drop(make_owned(Tracked::new(1, &log)));
        assert_eq!(log.released(), 1);
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn test_weak_outlives_clones() {
        let log = LifeLog::default();
        let weak = {
            let strong = make_owned(Tracked::new(1, &log));
            let weak = strong.downgrade();
            let _copies = [weak.clone(), weak.clone()];
            weak
        };
        assert!(weak.expired());
        assert_eq!(weak.weak_count(), 1);
        assert_eq!(log.dropped(), 0);
    }

    #[test]
    fn test_equality_by_address() {
        let log = LifeLog::default();
        let a = make_owned(Tracked::new(1, &log));
        let b = make_owned(Tracked::new(1, &log));
        assert_eq!(a.downgrade(), a.downgrade());
        assert_ne!(a.downgrade(), b.downgrade());
    }
}
