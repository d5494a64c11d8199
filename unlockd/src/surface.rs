// SPDX-License-Identifier: GPL-3.0-only

//! D-Bus control surface
//!
//! Each registered target is served as its own object at a flat path under
//! the service root; a partition object is a sibling of its disk, never
//! nested under it. The object delegates to the registry, which owns the
//! endpoint lifecycle.

use std::sync::{Arc, OnceLock, Weak};

use futures::future::BoxFuture;
use unlock_core::{ControlError, ControlSurface, Registry, Result};
use unlock_types::BlockTarget;
use zbus::interface;

pub(crate) const TARGETS_PATH: &str = "/org/unlockd/Service/targets";

/// One D-Bus object per registered target.
struct EndpointObject {
    registry: Arc<Registry>,
    target: BlockTarget,
}

#[interface(name = "org.unlockd.Service.Endpoint")]
impl EndpointObject {
    /// Current value: "1\n" when unlocked, "0\n" when write-protected.
    async fn read(&self) -> zbus::fdo::Result<String> {
        self.registry
            .read_value(&self.target)
            .await
            .map_err(fdo_error)
    }

    /// Accepts "0" (lock) or "1" (unlock); returns the bytes consumed.
    async fn write(&self, value: &str) -> zbus::fdo::Result<u64> {
        let consumed = self
            .registry
            .write_value(&self.target, value)
            .await
            .map_err(fdo_error)?;
        Ok(consumed as u64)
    }
}

/// Serves and removes endpoint objects as the registry installs and drops
/// endpoints.
pub(crate) struct DbusSurface {
    connection: zbus::Connection,
    registry: OnceLock<Weak<Registry>>,
}

impl DbusSurface {
    pub(crate) fn new(connection: zbus::Connection) -> Self {
        Self {
            connection,
            registry: OnceLock::new(),
        }
    }

    /// Late-bind the registry; the surface is constructed before it.
    pub(crate) fn bind(&self, registry: &Arc<Registry>) {
        let _ = self.registry.set(Arc::downgrade(registry));
    }

    fn registry(&self) -> Result<Arc<Registry>> {
        self.registry
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| ControlError::Backend("registry not bound".into()))
    }

    fn object_path(target: &BlockTarget) -> String {
        format!("{TARGETS_PATH}/{}", object_path_component(&target.node_name()))
    }
}

impl ControlSurface for DbusSurface {
    fn attach(&self, target: BlockTarget) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let registry = self.registry()?;
            let path = Self::object_path(&target);
            self.connection
                .object_server()
                .at(path.as_str(), EndpointObject { registry, target })
                .await
                .map_err(|e| ControlError::Backend(e.to_string()))?;
            Ok(())
        })
    }

    fn detach(&self, target: BlockTarget) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let path = Self::object_path(&target);
            self.connection
                .object_server()
                .remove::<EndpointObject, _>(path.as_str())
                .await
                .map_err(|e| ControlError::Backend(e.to_string()))?;
            Ok(())
        })
    }
}

/// Escape a device node name into a D-Bus path component, UDisks2-style:
/// every byte outside `[A-Za-z0-9]` becomes `_xx` hex.
fn object_path_component(node: &str) -> String {
    let mut out = String::with_capacity(node.len());
    for byte in node.bytes() {
        if byte.is_ascii_alphanumeric() {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

fn fdo_error(err: ControlError) -> zbus::fdo::Error {
    match err {
        ControlError::InvalidArgument(msg) => zbus::fdo::Error::InvalidArgs(msg),
        ControlError::TargetGone(node) => {
            zbus::fdo::Error::UnknownObject(format!("target is gone: {node}"))
        }
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths_are_flat_and_escaped() {
        assert_eq!(
            DbusSurface::object_path(&BlockTarget::disk("sda")),
            "/org/unlockd/Service/targets/sda"
        );
        assert_eq!(
            DbusSurface::object_path(&BlockTarget::partition("sda", 1)),
            "/org/unlockd/Service/targets/sda1"
        );
        assert_eq!(
            DbusSurface::object_path(&BlockTarget::disk("dm-0")),
            "/org/unlockd/Service/targets/dm_2d0"
        );
    }

    #[test]
    fn invalid_argument_maps_to_invalid_args() {
        let err = fdo_error(ControlError::InvalidArgument("value out of range: 7".into()));
        assert!(matches!(err, zbus::fdo::Error::InvalidArgs(_)));

        let err = fdo_error(ControlError::TargetGone("sdb".into()));
        assert!(matches!(err, zbus::fdo::Error::UnknownObject(_)));
    }
}
