use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

use tr_util::tr_check;

use crate::target::{IntrusiveTarget, TargetCounts};
use crate::weak::WeakRef;

/// Reinterprets a pointer to `Self` as a pointer to `U` in the same
/// allocation, typically an unsizing coercion to a trait object.
///
/// # Safety
/// The returned pointer must address the allocation `ptr` came from, it must
/// be valid to free through `Box<U>`, and `U::counts` must return the same
/// counters as `Self::counts`. Implement it with [`intrusive_upcast!`], which
/// only ever performs the compiler's unsizing coercion.
///
/// [`intrusive_upcast!`]: crate::intrusive_upcast
pub unsafe trait Upcast<U: ?Sized> {
    fn upcast(ptr: NonNull<Self>) -> NonNull<U>;
}

/// Declare that references to a concrete target may be viewed as references
/// to a trait object it implements.
///
/// ```
/// use tr_intrusive::{intrusive_upcast, make_owned, IntrusiveTarget, StrongRef, TargetCounts};
///
/// trait Shape: IntrusiveTarget {
///     fn area(&self) -> f64;
/// }
///
/// struct Square {
///     counts: TargetCounts,
///     side: f64,
/// }
///
/// impl IntrusiveTarget for Square {
///     fn counts(&self) -> &TargetCounts {
///         &self.counts
///     }
/// }
///
/// impl Shape for Square {
///     fn area(&self) -> f64 {
///         self.side * self.side
///     }
/// }
///
/// intrusive_upcast!(Square => dyn Shape);
///
/// let square = make_owned(Square { counts: TargetCounts::new(), side: 2.0 });
/// let shape: StrongRef<dyn Shape> = square.upcast();
/// assert_eq!(shape.area(), 4.0);
/// ```
#[macro_export]
macro_rules! intrusive_upcast {
    ($src:ty => $($dst:ty),+ $(,)?) => {
        $(
            unsafe impl $crate::Upcast<$dst> for $src {
                fn upcast(ptr: ::core::ptr::NonNull<Self>) -> ::core::ptr::NonNull<$dst> {
                    ptr
                }
            }
        )+
    };
}

/// An owning reference to a heap object with embedded counters.
///
/// Cloning bumps the strong count. Dropping the last strong reference calls
/// [`IntrusiveTarget::release_resources`] and frees the object unless a
/// [`WeakRef`] still observes it.
pub struct StrongRef<T: ?Sized + IntrusiveTarget> {
    pub(crate) ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

unsafe impl<T: ?Sized + IntrusiveTarget + Send + Sync> Send for StrongRef<T> {}
unsafe impl<T: ?Sized + IntrusiveTarget + Send + Sync> Sync for StrongRef<T> {}

/// Move `value` to the heap and return the first strong reference to it.
///
/// # Panics
/// The target's counters must still be zero, i.e. it has never been owned.
pub fn make_owned<T: IntrusiveTarget>(value: T) -> StrongRef<T> {
    let counts = value.counts();
    tr_check!(
        counts.strong() == 0 && counts.weak() == 0,
        "StrongRef: newly-created target had non-zero refcounts (strong: {}, weak: {})",
        counts.strong(),
        counts.weak()
    );
    // Nothing else can see the object yet.
    counts.strong.store(1, Ordering::Relaxed);
    counts.weak.store(1, Ordering::Relaxed);

    let ptr = NonNull::from(Box::leak(Box::new(value)));
    StrongRef {
        ptr,
        _marker: PhantomData,
    }
}

impl<T: IntrusiveTarget> StrongRef<T> {
    pub fn new(value: T) -> Self {
        make_owned(value)
    }
}

impl<T: ?Sized + IntrusiveTarget> StrongRef<T> {
    /// # Safety
    /// `ptr` must come from a `StrongRef` and the caller transfers one strong
    /// unit to the result.
    pub(crate) unsafe fn from_inner(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    pub(crate) fn counts(&self) -> &TargetCounts {
        (**self).counts()
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        std::ptr::addr_eq(a.ptr.as_ptr(), b.ptr.as_ptr())
    }

    pub fn strong_count(&self) -> u32 {
        self.counts().strong()
    }

    /// Weak count as stored, including the unit held on behalf of all strong
    /// references.
    pub fn weak_count(&self) -> u32 {
        self.counts().weak()
    }

    /// True when this is the only strong reference and no weak observer exists.
    pub fn is_unique(&self) -> bool {
        self.strong_count() == 1 && self.weak_count() == 1
    }

    pub fn downgrade(&self) -> WeakRef<T> {
        WeakRef::new(self)
    }

    /// View this reference as a reference to a type `T` can be viewed as,
    /// usually a trait object. Counts are untouched.
    pub fn upcast<U>(self) -> StrongRef<U>
    where
        U: ?Sized + IntrusiveTarget,
        T: Upcast<U>,
    {
        let this = ManuallyDrop::new(self);
        StrongRef {
            ptr: T::upcast(this.ptr),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + IntrusiveTarget> Clone for StrongRef<T> {
    fn clone(&self) -> Self {
        let new_count = self.counts().strong.fetch_add(1, Ordering::AcqRel) + 1;
        tr_check!(
            new_count != 1,
            "StrongRef: cannot increase refcount after it reached zero."
        );
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + IntrusiveTarget> Drop for StrongRef<T> {
    fn drop(&mut self) {
        let counts = self.counts();
        if counts.strong.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        // With strong at zero no new weak reference can appear, so a weak
        // count of 1 means the strong side holds the only unit left.
        let mut should_delete = counts.weak.load(Ordering::Acquire) == 1;
        tracing::trace!(should_delete, "releasing resources of intrusive target");
        (**self).release_resources();
        if !should_delete {
            should_delete = self.counts().weak.fetch_sub(1, Ordering::AcqRel) == 1;
        }
        if should_delete {
            // SAFETY: the allocation came from `Box` in `make_owned` and no
            // strong or weak reference is left.
            unsafe { drop(Box::from_raw(self.ptr.as_ptr())) };
        }
    }
}

impl<T: ?Sized + IntrusiveTarget> Deref for StrongRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: a live strong reference keeps the object alive.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized + IntrusiveTarget> AsRef<T> for StrongRef<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized + IntrusiveTarget> PartialEq for StrongRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized + IntrusiveTarget> Eq for StrongRef<T> {}

impl<T: ?Sized + IntrusiveTarget> PartialOrd for StrongRef<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized + IntrusiveTarget> Ord for StrongRef<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ptr.cast::<u8>().cmp(&other.ptr.cast::<u8>())
    }
}

impl<T: ?Sized + IntrusiveTarget> Hash for StrongRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.cast::<u8>().hash(state);
    }
}

impl<T: ?Sized + IntrusiveTarget + fmt::Debug> fmt::Debug for StrongRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + IntrusiveTarget> fmt::Pointer for StrongRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LifeLog, Tracked};
    use std::collections::HashSet;

    trait Named: IntrusiveTarget {
        fn name(&self) -> String;
    }

    impl Named for Tracked {
        fn name(&self) -> String {
            format!("tracked-{}", self.value)
        }
    }

    intrusive_upcast!(Tracked => dyn Named);

    #[test]
    fn test_make_owned_counts() {
        let log = LifeLog::default();
        let r = make_owned(Tracked::new(7, &log));
        assert_eq!(r.strong_count(), 1);
        assert_eq!(r.weak_count(), 1);
        assert!(r.is_unique());
        assert_eq!(r.value, 7);
    }

    #[test]
    #[should_panic(expected = "newly-created target had non-zero refcounts")]
    fn test_make_owned_rejects_owned_target() {
        let log = LifeLog::default();
        let target = Tracked::new(1, &log);
        target.counts.weak.store(1, Ordering::Relaxed);
        let _ = make_owned(target);
    }

    #[test]
    #[should_panic(expected = "cannot increase refcount after it reached zero")]
    fn test_clone_after_release_panics() {
        let log = LifeLog::default();
        let r = make_owned(Tracked::new(1, &log));
        // The leaked weak unit keeps the allocation valid after the last
        // strong reference is gone.
        let _observer = ManuallyDrop::new(r.downgrade());
        let stale = ManuallyDrop::new(unsafe { StrongRef::from_inner(r.ptr) });
        drop(r);
        assert_eq!(log.released(), 1);
        let _ = StrongRef::clone(&stale);
    }

    #[test]
    fn test_debug_shows_target() {
        let log = LifeLog::default();
        let r = make_owned(Tracked::new(7, &log));
        let text = format!("{:?}", r);
        assert!(text.contains("value: 7"));
        assert!(text.contains("strong: 1"));
    }

    #[test]
    fn test_clone_and_drop() {
        let log = LifeLog::default();
        let r = make_owned(Tracked::new(1, &log));
        let copies: Vec<_> = (0..5).map(|_| r.clone()).collect();
        assert_eq!(r.strong_count(), 6);
        assert!(!r.is_unique());
        drop(copies);
        assert_eq!(r.strong_count(), 1);
        assert_eq!(log.released(), 0);
        drop(r);
        assert_eq!(log.released(), 1);
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn test_last_copy_may_be_any_copy() {
        let log = LifeLog::default();
        let r = make_owned(Tracked::new(1, &log));
        let copy = r.clone();
        drop(r);
        assert_eq!(copy.strong_count(), 1);
        assert_eq!(log.dropped(), 0);
        drop(copy);
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn test_identity() {
        let log = LifeLog::default();
        let a = make_owned(Tracked::new(1, &log));
        let b = make_owned(Tracked::new(1, &log));
        let a2 = a.clone();
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(a.as_ptr(), a2.as_ptr());

        let set: HashSet<_> = [a.clone(), a2.clone(), b.clone()].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(a.cmp(&b) != std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_upcast_shares_counts() {
        let log = LifeLog::default();
        let concrete = make_owned(Tracked::new(3, &log));
        let keep = concrete.clone();
        let named: StrongRef<dyn Named> = concrete.upcast();
        assert_eq!(named.name(), "tracked-3");
        assert_eq!(named.strong_count(), 2);
        assert!(std::ptr::addr_eq(named.as_ptr(), keep.as_ptr()));

        drop(keep);
        assert_eq!(log.dropped(), 0);
        drop(named);
        assert_eq!(log.released(), 1);
        assert_eq!(log.dropped(), 1);
    }
}
