// SPDX-License-Identifier: GPL-3.0-only

//! Sysfs-backed flag store
//!
//! The vendor write-protection flag is exposed as a one-digit sysfs
//! attribute: `/sys/block/<disk>/ubnt_readonly` for a whole disk,
//! `/sys/block/<disk>/<node>/ubnt_readonly` for a partition. Exactly one
//! location is consulted per target.

use std::io::ErrorKind;
use std::path::PathBuf;

use futures::future::BoxFuture;
use unlock_core::{ControlError, Result, WriteProtectStore};
use unlock_types::BlockTarget;

/// Default sysfs location of the per-device directories.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/block";

const FLAG_ATTRIBUTE: &str = "ubnt_readonly";

/// Flag store reading and writing the vendor attribute under a sysfs root.
pub struct SysfsFlagStore {
    root: PathBuf,
}

impl SysfsFlagStore {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_SYSFS_ROOT)
    }

    /// Use an alternate root directory (tests).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn attribute_path(&self, target: &BlockTarget) -> PathBuf {
        let mut path = self.root.join(target.disk_name());
        if target.is_partition() {
            path.push(target.node_name());
        }
        path.push(FLAG_ATTRIBUTE);
        path
    }

    async fn read_flag(&self, target: &BlockTarget) -> Result<bool> {
        let path = self.attribute_path(target);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| attribute_error(e, target))?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(ControlError::Backend(format!(
                "unexpected flag value {:?} in {}",
                other,
                path.display()
            ))),
        }
    }

    async fn write_flag(&self, target: &BlockTarget, protected: bool) -> Result<()> {
        let path = self.attribute_path(target);
        tokio::fs::write(&path, if protected { "1\n" } else { "0\n" })
            .await
            .map_err(|e| attribute_error(e, target))
    }
}

impl Default for SysfsFlagStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteProtectStore for SysfsFlagStore {
    fn read_protected(&self, target: BlockTarget) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { self.read_flag(&target).await })
    }

    fn set_protected(&self, target: BlockTarget, protected: bool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.write_flag(&target, protected).await })
    }
}

/// A missing attribute means the device is no longer present.
fn attribute_error(err: std::io::Error, target: &BlockTarget) -> ControlError {
    if err.kind() == ErrorKind::NotFound {
        ControlError::TargetGone(target.node_name())
    } else {
        ControlError::Io(err)
    }
}
