//! Device hot-plug events

use serde::{Deserialize, Serialize};

use crate::BlockTarget;

/// A device arrival or departure, as delivered by the notification source.
///
/// Partitions arrive and depart as their own events; an event never implies
/// anything about sibling or child targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// The target appeared and should gain a control endpoint.
    Added(BlockTarget),

    /// The target disappeared and its control endpoint should be removed.
    Removed(BlockTarget),
}
