// SPDX-License-Identifier: GPL-3.0-only

//! unlockd - per-block-device write-protection control daemon
//!
//! Installs one control endpoint for every attached disk and partition,
//! keeps the set synchronized under device hot-plug, and exposes each
//! endpoint on the D-Bus system bus.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};
use unlock_core::{ControlSurface, Registry, WriteProtectStore};
use unlock_udisks::{SysfsFlagStore, UdisksSource};
use zbus::connection::Builder as ConnectionBuilder;

mod service;
mod surface;

use service::UnlockService;
use surface::DbusSurface;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to journald/stderr
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("unlockd=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting unlockd v{}", env!("CARGO_PKG_VERSION"));

    // The vendor flag lives in sysfs; writing it requires root.
    if unsafe { libc::geteuid() } != 0 {
        tracing::error!("unlockd must run as root");
        anyhow::bail!("daemon must run with root privileges");
    }

    let connection = ConnectionBuilder::system()?
        .name("org.unlockd.Service")?
        .build()
        .await?;

    let surface = Arc::new(DbusSurface::new(connection.clone()));
    let store = Arc::new(SysfsFlagStore::new());
    let registry = Arc::new(Registry::new(
        store as Arc<dyn WriteProtectStore>,
        Arc::clone(&surface) as Arc<dyn ControlSurface>,
    ));
    surface.bind(&registry);

    connection
        .object_server()
        .at(
            "/org/unlockd/Service",
            UnlockService::new(Arc::clone(&registry)),
        )
        .await?;

    let source = UdisksSource::with_connection(connection.clone());
    registry.initialize(&source, &source).await?;

    tracing::info!("Service registered on D-Bus system bus");
    tracing::info!("  - org.unlockd.Service at /org/unlockd/Service");
    tracing::info!(
        "  - control endpoints under {} ({} targets)",
        surface::TARGETS_PATH,
        registry.targets().len()
    );
    tracing::info!("Disk hotplug monitoring enabled");

    tracing::info!("Service ready, waiting for requests...");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Stopping...");

    registry.shutdown().await;
    Ok(())
}
