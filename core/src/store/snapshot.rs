use std::sync::{Arc, Mutex, RwLock};

use crate::prelude::{RetentionPolicy, Timestamped};

/// Bounded collection published as immutable snapshots.
///
/// Writers build the next collection off to the side and swap it in; readers
/// clone an `Arc` and never observe a half-applied update. The read lock is
/// only held for the pointer copy.
pub struct SnapshotStore<T> {
    current: RwLock<Arc<Vec<T>>>,
    writer: Mutex<()>,
    policy: RetentionPolicy,
}

impl<T: Clone + Timestamped> SnapshotStore<T> {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            current: RwLock::new(Arc::new(Vec::new())),
            writer: Mutex::new(()),
            policy: policy.normalized(),
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Current snapshot, oldest entry first.
    pub fn list(&self) -> Arc<Vec<T>> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    /// Applies `edit` to a copy of the current snapshot, enforces the
    /// retention policy relative to `now` and publishes the result.
    /// Returns the edit's output and the number of evicted entries.
    pub fn update<R>(&self, now: Option<f64>, edit: impl FnOnce(&mut Vec<T>) -> R) -> (R, usize) {
        let _writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut next: Vec<T> = self.list().as_ref().clone();
        let output = edit(&mut next);
        let before = next.len();

        if let (Some(ttl), Some(now)) = (self.policy.ttl_seconds, now) {
            next.retain(|item| now - item.timestamp() <= ttl);
        }
        if next.len() > self.policy.capacity {
            let overflow = next.len() - self.policy.capacity;
            next.drain(..overflow);
        }
        let evicted = before - next.len();

        let published = Arc::new(next);
        match self.current.write() {
            Ok(mut guard) => *guard = published,
            Err(poisoned) => *poisoned.into_inner() = published,
        }
        (output, evicted)
    }

    /// Appends one entry, evicting oldest-first past capacity.
    pub fn push(&self, item: T) -> usize {
        self.update(None, |items| items.push(item)).1
    }

    /// Drops entries older than the TTL relative to `now`.
    pub fn prune_expired(&self, now: f64) -> usize {
        self.update(Some(now), |_| ()).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry(f64);

    impl Timestamped for Entry {
        fn timestamp(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let store = SnapshotStore::new(RetentionPolicy::with_capacity(3));
        for ts in 0..5 {
            store.push(Entry(ts as f64));
        }
        assert_eq!(*store.list(), vec![Entry(2.0), Entry(3.0), Entry(4.0)]);
    }

    #[test]
    fn ttl_prunes_relative_to_now() {
        let store = SnapshotStore::new(RetentionPolicy::with_capacity(10).with_ttl(5.0));
        for ts in [1.0, 4.0, 8.0] {
            store.push(Entry(ts));
        }
        assert_eq!(store.prune_expired(10.0), 2);
        assert_eq!(*store.list(), vec![Entry(8.0)]);
    }

    #[test]
    fn held_snapshot_is_unaffected_by_later_writes() {
        let store = SnapshotStore::new(RetentionPolicy::with_capacity(2));
        store.push(Entry(1.0));
        let before = store.list();
        store.push(Entry(2.0));
        store.push(Entry(3.0));
        assert_eq!(*before, vec![Entry(1.0)]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_readers_only_see_whole_snapshots() {
        let store = Arc::new(SnapshotStore::new(RetentionPolicy::with_capacity(64)));
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for round in 0..200 {
                    store.update(None, |items| {
                        items.clear();
                        items.extend((0..8).map(|_| Entry(round as f64)));
                    });
                }
            })
        };
        for _ in 0..200 {
            let snapshot = store.list();
            assert!(snapshot.len() == 0 || snapshot.len() == 8);
            if let Some(first) = snapshot.first() {
                assert!(snapshot.iter().all(|entry| entry == first));
            }
        }
        writer.join().unwrap();
    }
}
