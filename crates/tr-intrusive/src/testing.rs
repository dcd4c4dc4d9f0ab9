use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::target::{IntrusiveTarget, TargetCounts};

/// Counts release hook calls and drops of the `Tracked` objects sharing it.
#[derive(Clone, Default)]
pub(crate) struct LifeLog {
    released: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl LifeLog {
    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub(crate) struct Tracked {
    pub(crate) counts: TargetCounts,
    pub(crate) value: i32,
    log: LifeLog,
}

impl Tracked {
    pub(crate) fn new(value: i32, log: &LifeLog) -> Self {
        Self {
            counts: TargetCounts::new(),
            value,
            log: log.clone(),
        }
    }
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("value", &self.value)
            .field("counts", &self.counts)
            .finish()
    }
}

impl IntrusiveTarget for Tracked {
    fn counts(&self) -> &TargetCounts {
        &self.counts
    }

    fn release_resources(&self) {
        self.log.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.log.dropped.fetch_add(1, Ordering::SeqCst);
    }
}
