use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Strong and weak counters embedded in a reference-counted object.
///
/// Both counters start at zero. `make_owned` moves them to 1/1 exactly once;
/// from then on every `StrongRef` holds one strong unit and all strong
/// references together hold one weak unit, so the allocation is freed only
/// after both reach zero.
pub struct TargetCounts {
    pub(crate) strong: AtomicU32,
    pub(crate) weak: AtomicU32,
}

impl TargetCounts {
    pub const fn new() -> Self {
        Self {
            strong: AtomicU32::new(0),
            weak: AtomicU32::new(0),
        }
    }

    pub fn strong(&self) -> u32 {
        self.strong.load(Ordering::Acquire)
    }

    pub fn weak(&self) -> u32 {
        self.weak.load(Ordering::Acquire)
    }
}

impl Default for TargetCounts {
    fn default() -> Self {
        Self::new()
    }
}

/// A copy of an object is a new, unowned object: its counters restart at 0.
impl Clone for TargetCounts {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for TargetCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetCounts")
            .field("strong", &self.strong())
            .field("weak", &self.weak())
            .finish()
    }
}

impl Drop for TargetCounts {
    fn drop(&mut self) {
        let strong = *self.strong.get_mut();
        let weak = *self.weak.get_mut();
        debug_assert!(
            strong == 0,
            "tried to destroy an intrusive target that still has strong references: {strong}"
        );
        debug_assert!(
            weak <= 1,
            "tried to destroy an intrusive target that still has weak references: {weak}"
        );
    }
}

/// An object that carries its own reference counts.
///
/// ```
/// use tr_intrusive::{make_owned, IntrusiveTarget, TargetCounts};
///
/// struct Buffer {
///     counts: TargetCounts,
///     len: usize,
/// }
///
/// impl IntrusiveTarget for Buffer {
///     fn counts(&self) -> &TargetCounts {
///         &self.counts
///     }
/// }
///
/// let buf = make_owned(Buffer { counts: TargetCounts::new(), len: 16 });
/// assert_eq!(buf.len, 16);
/// assert_eq!(buf.strong_count(), 1);
/// ```
pub trait IntrusiveTarget {
    fn counts(&self) -> &TargetCounts;

    /// Called once when the last strong reference goes away, before the
    /// object is freed and possibly long before, if weak references are still
    /// alive. Implementations drop heavy payloads and break reference cycles
    /// here. The object must stay safe to drop afterwards.
    fn release_resources(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_counts_are_zero() {
        let counts = TargetCounts::new();
        assert_eq!(counts.strong(), 0);
        assert_eq!(counts.weak(), 0);
    }

    #[test]
    fn test_clone_resets_counts() {
        let counts = TargetCounts::new();
        counts.strong.store(3, Ordering::Relaxed);
        counts.weak.store(2, Ordering::Relaxed);
        let copy = counts.clone();
        assert_eq!(copy.strong(), 0);
        assert_eq!(copy.weak(), 0);
        counts.strong.store(0, Ordering::Relaxed);
        counts.weak.store(0, Ordering::Relaxed);
    }

    #[test]
    fn test_debug() {
        assert_eq!(
            format!("{:?}", TargetCounts::default()),
            "TargetCounts { strong: 0, weak: 0 }"
        );
    }
}
