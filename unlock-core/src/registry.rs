// SPDX-License-Identifier: GPL-3.0-only

//! Endpoint registry and lifecycle
//!
//! The registry owns the process-wide set of live control endpoints. It
//! installs one per target at startup, keeps the set synchronized with
//! hot-plug events while running, and drains it at shutdown. The endpoint
//! map is the only mutable shared state the core owns; its lock is never
//! held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::task::JoinHandle;
use unlock_types::{BlockTarget, DeviceEvent};

use crate::backend::{ControlSurface, DeviceEvents, TargetEnumerator, WriteProtectStore};
use crate::endpoint::ControlEndpoint;
use crate::error::{ControlError, Result};

/// Lifecycle manager for the per-target control endpoints.
pub struct Registry {
    store: Arc<dyn WriteProtectStore>,
    surface: Arc<dyn ControlSurface>,
    endpoints: Mutex<HashMap<BlockTarget, Arc<ControlEndpoint>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Registry {
    pub fn new(store: Arc<dyn WriteProtectStore>, surface: Arc<dyn ControlSurface>) -> Self {
        Self {
            store,
            surface,
            endpoints: Mutex::new(HashMap::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Install an endpoint for every currently attached target, then start
    /// watching for hot-plug events.
    ///
    /// Per-target registration failures are logged and skipped; only a
    /// failure of the enumeration or notification source itself is returned.
    pub async fn initialize(
        self: &Arc<Self>,
        enumerator: &dyn TargetEnumerator,
        events: &dyn DeviceEvents,
    ) -> Result<()> {
        for target in enumerator.enumerate().await? {
            self.register(target).await;
        }

        let mut stream = events.subscribe().await?;
        let registry = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                registry.apply_event(event).await;
            }
        });
        if let Some(old) = self.watcher.lock().unwrap().replace(task) {
            old.abort();
        }

        Ok(())
    }

    /// Tear everything down: stop the watcher first so no registration can
    /// race teardown, then detach and drop every endpoint. Unconditional.
    pub async fn shutdown(&self) {
        if let Some(task) = self.watcher.lock().unwrap().take() {
            task.abort();
        }

        let drained: Vec<BlockTarget> = {
            let mut endpoints = self.endpoints.lock().unwrap();
            endpoints.drain().map(|(target, _)| target).collect()
        };
        for target in drained {
            if let Err(e) = self.surface.detach(target.clone()).await {
                tracing::warn!("Could not detach endpoint for {target}: {e}");
            }
        }
    }

    /// Create and install the endpoint for `target`. Registering an
    /// already-registered target is a no-op. Returns true if a new endpoint
    /// was installed.
    pub async fn register(&self, target: BlockTarget) -> bool {
        let endpoint = Arc::new(ControlEndpoint::new(
            target.clone(),
            Arc::clone(&self.store),
        ));

        {
            let mut endpoints = self.endpoints.lock().unwrap();
            if endpoints.contains_key(&target) {
                tracing::warn!("Endpoint for {target} already registered");
                return false;
            }
            endpoints.insert(target.clone(), endpoint);
        }

        if target.is_partition() {
            tracing::info!("Adding entry to partition: {target}");
        } else {
            tracing::info!("Adding entry to disk: {target}");
        }

        if let Err(e) = self.surface.attach(target.clone()).await {
            tracing::warn!("Failed to attach control endpoint for {target}: {e}");
            self.endpoints.lock().unwrap().remove(&target);
            return false;
        }

        true
    }

    /// Remove the endpoint for `target`, if any. Returns true if one was
    /// removed.
    pub async fn unregister(&self, target: &BlockTarget) -> bool {
        if self.endpoints.lock().unwrap().remove(target).is_none() {
            return false;
        }
        if let Err(e) = self.surface.detach(target.clone()).await {
            tracing::warn!("Could not detach endpoint for {target}: {e}");
        }
        true
    }

    /// Apply one hot-plug event: arrivals install endpoints through the same
    /// path as enumeration, departures remove exactly the named target.
    pub async fn apply_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Added(target) => {
                self.register(target).await;
            }
            DeviceEvent::Removed(target) => {
                if self.unregister(&target).await {
                    tracing::info!("Removed endpoint for departed {target}");
                }
            }
        }
    }

    /// Read through the endpoint registered for `target`.
    pub async fn read_value(&self, target: &BlockTarget) -> Result<String> {
        let endpoint = self.endpoint(target)?;
        match endpoint.read().await {
            Err(e @ ControlError::TargetGone(_)) => {
                self.reap(target).await;
                Err(e)
            }
            other => other,
        }
    }

    /// Write through the endpoint registered for `target`.
    pub async fn write_value(&self, target: &BlockTarget, buf: &str) -> Result<usize> {
        let endpoint = self.endpoint(target)?;
        match endpoint.write(buf).await {
            Err(e @ ControlError::TargetGone(_)) => {
                self.reap(target).await;
                Err(e)
            }
            other => other,
        }
    }

    /// Currently registered targets.
    pub fn targets(&self) -> Vec<BlockTarget> {
        self.endpoints.lock().unwrap().keys().cloned().collect()
    }

    pub fn is_registered(&self, target: &BlockTarget) -> bool {
        self.endpoints.lock().unwrap().contains_key(target)
    }

    fn endpoint(&self, target: &BlockTarget) -> Result<Arc<ControlEndpoint>> {
        self.endpoints
            .lock()
            .unwrap()
            .get(target)
            .cloned()
            .ok_or_else(|| ControlError::TargetGone(target.node_name()))
    }

    /// The target vanished underneath its endpoint; tear the stale endpoint
    /// down so the transport stops exposing it.
    async fn reap(&self, target: &BlockTarget) {
        tracing::warn!("Target {target} is gone; removing its endpoint");
        self.unregister(target).await;
    }
}
