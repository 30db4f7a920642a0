pub mod memory;
pub mod redis;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::tier::ResourceType;
use crate::window::{UsageWindow, WindowBounds};

/// Result of an atomic conditional increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementOutcome {
    /// False when the counter was already at the limit (a concurrent
    /// request may have consumed the last slot).
    pub success: bool,
    /// The counter after the operation: the incremented value on success,
    /// the at-limit value otherwise.
    pub new_count: u32,
}

/// Persistence abstraction for usage counters.
///
/// The usage row per (subject, resource) is owned by this trait's
/// implementation and mutated exclusively through these two operations.
/// Window rollover is handled here, lazily: when the stored window's start
/// differs from the caller's freshly computed one, the row is superseded
/// by a zero-count window at the new boundaries.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Return the active window for (subject, resource), creating or
    /// superseding it with `count = 0` when `window.start` does not match
    /// the stored one.
    async fn get_or_init(
        &self,
        subject: &str,
        resource: ResourceType,
        window: &WindowBounds,
    ) -> Result<UsageWindow, Error>;

    /// Atomically increment the counter if it is below `limit`.
    ///
    /// This is the linchpin against admission overshoot: it must be a
    /// single compare-and-increment at the store, never a read-then-write
    /// round trip from the caller's side.
    async fn increment_if_below(
        &self,
        subject: &str,
        resource: ResourceType,
        window: &WindowBounds,
        limit: u32,
    ) -> Result<IncrementOutcome, Error>;
}
