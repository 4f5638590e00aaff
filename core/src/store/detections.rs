use std::sync::Arc;

use crate::interface::CorrelatedEvent;
use crate::prelude::RetentionPolicy;
use crate::store::snapshot::SnapshotStore;

/// Recent correlated detections, newest last.
pub struct DetectionStore {
    inner: SnapshotStore<CorrelatedEvent>,
}

impl DetectionStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            inner: SnapshotStore::new(policy),
        }
    }

    pub fn record(&self, event: CorrelatedEvent) -> usize {
        self.inner.push(event)
    }

    pub fn list(&self) -> Arc<Vec<CorrelatedEvent>> {
        self.inner.list()
    }

    /// The `limit` most recent events, oldest first.
    pub fn latest(&self, limit: usize) -> Vec<CorrelatedEvent> {
        let snapshot = self.inner.list();
        let skip = snapshot.len().saturating_sub(limit);
        snapshot[skip..].to_vec()
    }

    pub fn prune_expired(&self, now: f64) -> usize {
        self.inner.prune_expired(now)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.policy().capacity
    }
}
