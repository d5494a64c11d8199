// SPDX-License-Identifier: GPL-3.0-only

//! Collaborator seams of the control core
//!
//! The storage stack, the device notification mechanism, and the control
//! surface transport are external; the core reaches them only through these
//! traits.

use std::pin::Pin;

use futures::Stream;
use futures::future::BoxFuture;
use unlock_types::{BlockTarget, DeviceEvent};

use crate::error::Result;

/// Stream of device arrivals and departures. Dropping the stream cancels the
/// underlying subscription.
pub type DeviceEventStream = Pin<Box<dyn Stream<Item = DeviceEvent> + Send>>;

/// Accessor for the vendor write-protection flag.
///
/// Exactly one flag location exists per target: the disk's own flag for a
/// disk target, the partition's flag for a partition target. Concurrent
/// access to the same target is serialized by the implementation; `TargetGone`
/// is the only defined failure for a still-valid request.
pub trait WriteProtectStore: Send + Sync {
    /// True if the target is currently write-protected.
    fn read_protected(&self, target: BlockTarget) -> BoxFuture<'_, Result<bool>>;

    /// Set or clear write-protection.
    fn set_protected(&self, target: BlockTarget, protected: bool) -> BoxFuture<'_, Result<()>>;
}

/// Enumeration source: the full set of currently attached targets.
pub trait TargetEnumerator: Send + Sync {
    /// Every attached disk and partition exactly once, each disk immediately
    /// followed by its own partitions.
    fn enumerate(&self) -> BoxFuture<'_, Result<Vec<BlockTarget>>>;
}

/// Notification source for device hot-plug.
pub trait DeviceEvents: Send + Sync {
    fn subscribe(&self) -> BoxFuture<'_, Result<DeviceEventStream>>;
}

/// Transport attachment point for control endpoints.
///
/// `attach` runs after the endpoint is registered and makes it reachable
/// under the target's own node name. `detach` is best-effort and tolerates an
/// already-gone object.
pub trait ControlSurface: Send + Sync {
    fn attach(&self, target: BlockTarget) -> BoxFuture<'_, Result<()>>;
    fn detach(&self, target: BlockTarget) -> BoxFuture<'_, Result<()>>;
}
