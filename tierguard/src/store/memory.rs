use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Error;
use crate::store::{IncrementOutcome, UsageStore};
use crate::tier::ResourceType;
use crate::window::{UsageWindow, WindowBounds};

#[derive(Debug, Clone, Copy)]
struct Slot {
    start_ts: i64,
    count: u32,
}

impl Slot {
    fn fresh(window: &WindowBounds) -> Self {
        Self {
            start_ts: window.start.timestamp(),
            count: 0,
        }
    }
}

/// In-process usage store backed by a sharded concurrent map.
///
/// Suitable for tests and single-node deployments. The conditional
/// increment runs while holding the map entry's shard lock, so the
/// admission bound holds under concurrent evaluations.
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    slots: DashMap<(String, ResourceType), Slot>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (subject, resource) rows currently held.
    pub fn entry_count(&self) -> usize {
        self.slots.len()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn get_or_init(
        &self,
        subject: &str,
        resource: ResourceType,
        window: &WindowBounds,
    ) -> Result<UsageWindow, Error> {
        let mut entry = self
            .slots
            .entry((subject.to_string(), resource))
            .or_insert_with(|| Slot::fresh(window));
        if entry.start_ts != window.start.timestamp() {
            // Stored window expired: supersede with a zero-count window.
            *entry = Slot::fresh(window);
        }
        Ok(UsageWindow {
            subject_id: subject.to_string(),
            resource,
            window_start: window.start,
            window_end: window.end,
            count: entry.count,
        })
    }

    async fn increment_if_below(
        &self,
        subject: &str,
        resource: ResourceType,
        window: &WindowBounds,
        limit: u32,
    ) -> Result<IncrementOutcome, Error> {
        let mut entry = self
            .slots
            .entry((subject.to_string(), resource))
            .or_insert_with(|| Slot::fresh(window));
        if entry.start_ts != window.start.timestamp() {
            *entry = Slot::fresh(window);
        }
        if entry.count < limit {
            entry.count += 1;
            Ok(IncrementOutcome {
                success: true,
                new_count: entry.count,
            })
        } else {
            Ok(IncrementOutcome {
                success: false,
                new_count: entry.count,
            })
        }
    }
}
