// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use unlock_core::Registry;
use zbus::interface;

/// Main unlockd service interface
pub(crate) struct UnlockService {
    version: String,
    registry: Arc<Registry>,
}

impl UnlockService {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            registry,
        }
    }
}

#[interface(name = "org.unlockd.Service")]
impl UnlockService {
    /// Get service version
    #[zbus(property)]
    async fn version(&self) -> &str {
        &self.version
    }

    /// List the targets that currently have a control endpoint.
    ///
    /// Returns a JSON-serialized array, sorted by node name.
    async fn list_targets(&self) -> zbus::fdo::Result<String> {
        let mut targets = self.registry.targets();
        targets.sort_by_key(|target| target.node_name());

        serde_json::to_string(&targets).map_err(|e| {
            tracing::error!("Failed to serialize targets: {e}");
            zbus::fdo::Error::Failed(format!("Serialization error: {e}"))
        })
    }
}
