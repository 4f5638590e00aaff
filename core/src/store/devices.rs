use std::sync::Arc;

use crate::interface::DeviceSighting;
use crate::prelude::RetentionPolicy;
use crate::store::snapshot::SnapshotStore;

/// Outcome of a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub stale: usize,
    pub evicted: usize,
}

/// Latest sighting per MAC address.
pub struct DeviceStore {
    inner: SnapshotStore<DeviceSighting>,
}

impl DeviceStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            inner: SnapshotStore::new(policy),
        }
    }

    /// Merges a batch into the store in one snapshot swap, then prunes
    /// entries older than the TTL relative to `now`.
    ///
    /// A sighting replaces the stored one for its MAC unless it is older; a
    /// replaced MAC moves to the newest position.
    pub fn upsert_batch(&self, batch: Vec<DeviceSighting>, now: f64) -> UpsertSummary {
        let (mut summary, evicted) = self.inner.update(Some(now), |devices| {
            let mut summary = UpsertSummary::default();
            for sighting in batch {
                match devices.iter().position(|d| d.mac == sighting.mac) {
                    Some(idx) if devices[idx].last_seen > sighting.last_seen => summary.stale += 1,
                    Some(idx) => {
                        devices.remove(idx);
                        devices.push(sighting);
                        summary.updated += 1;
                    }
                    None => {
                        devices.push(sighting);
                        summary.inserted += 1;
                    }
                }
            }
            summary
        });
        summary.evicted = evicted;
        summary
    }

    pub fn upsert(&self, sighting: DeviceSighting, now: f64) -> UpsertSummary {
        self.upsert_batch(vec![sighting], now)
    }

    pub fn get(&self, mac: &str) -> Option<DeviceSighting> {
        self.inner.list().iter().find(|d| d.mac == mac).cloned()
    }

    pub fn list(&self) -> Arc<Vec<DeviceSighting>> {
        self.inner.list()
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
}
