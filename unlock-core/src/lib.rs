// SPDX-License-Identifier: GPL-3.0-only

//! Registration/lifecycle engine for per-device write-protection control
//! endpoints.
//!
//! The core discovers every attached disk and partition through a
//! [`TargetEnumerator`], installs one [`ControlEndpoint`] per target on a
//! [`ControlSurface`], keeps the set synchronized with hot-plug events from a
//! [`DeviceEvents`] source, and serializes flag access through a
//! [`WriteProtectStore`]. All four collaborators are external; this crate
//! contains no platform bindings.

pub mod backend;
pub mod endpoint;
pub mod error;
pub mod registry;

pub use backend::{
    ControlSurface, DeviceEventStream, DeviceEvents, TargetEnumerator, WriteProtectStore,
};
pub use endpoint::ControlEndpoint;
pub use error::{ControlError, Result};
pub use registry::Registry;

// Re-export the shared model types
pub use unlock_types::{BlockTarget, DeviceEvent};
