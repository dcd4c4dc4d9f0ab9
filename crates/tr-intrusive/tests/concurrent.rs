use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tr_intrusive::{make_owned, IntrusiveTarget, TargetCounts, WeakRef};

struct Node {
    counts: TargetCounts,
    released: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl Node {
    fn new(released: &Arc<AtomicUsize>, dropped: &Arc<AtomicUsize>) -> Self {
        Self {
            counts: TargetCounts::new(),
            released: Arc::clone(released),
            dropped: Arc::clone(dropped),
        }
    }
}

impl IntrusiveTarget for Node {
    fn counts(&self) -> &TargetCounts {
        &self.counts
    }

    fn release_resources(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

const THREADS: usize = 8;
const ROUNDS: usize = 1000;

#[test]
fn test_concurrent_clone_drop() {
    let released = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));
    let root = make_owned(Node::new(&released, &dropped));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let local = root.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let copy = local.clone();
                    drop(copy);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(root.strong_count(), 1);
    drop(root);
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lock_races_last_drop() {
    for _ in 0..100 {
        let released = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        let strong = make_owned(Node::new(&released, &dropped));
        let weak: WeakRef<Node> = strong.downgrade();
        let barrier = Arc::new(Barrier::new(THREADS + 1));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let weak = weak.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut locked = 0;
                    for _ in 0..ROUNDS {
                        if let Some(s) = weak.lock() {
                            assert!(s.strong_count() >= 1);
                            locked += 1;
                        }
                    }
                    locked
                })
            })
            .collect();

        barrier.wait();
        drop(strong);
        for h in handles {
            h.join().unwrap();
        }

        // no lock may revive the object after its hook ran
        assert!(weak.expired());
        assert!(weak.lock().is_none());
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(dropped.load(Ordering::SeqCst), 0);
        drop(weak);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_concurrent_weak_drop_with_last_strong() {
    for _ in 0..200 {
        let released = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        let strong = make_owned(Node::new(&released, &dropped));
        let weak = strong.downgrade();
        let barrier = Arc::new(Barrier::new(2));

        let b = Arc::clone(&barrier);
        let handle = thread::spawn(move || {
            b.wait();
            drop(weak);
        });
        barrier.wait();
        drop(strong);
        handle.join().unwrap();

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }
}
