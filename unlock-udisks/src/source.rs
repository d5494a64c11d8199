// SPDX-License-Identifier: GPL-3.0-only

//! Target discovery and hot-plug events via UDisks2
//!
//! Enumeration walks the Manager's block-device list: objects carrying a
//! partition table reference are partitions, the rest are whole disks.
//! Hot-plug events come from the ObjectManager `InterfacesAdded` /
//! `InterfacesRemoved` signals, filtered to the Block interface.

use std::collections::HashMap;

use anyhow::Result;
use futures::StreamExt;
use futures::future::BoxFuture;
use udisks2::{block::BlockProxy, partition::PartitionProxy};
use unlock_core::{ControlError, DeviceEventStream, DeviceEvents, TargetEnumerator};
use unlock_types::{BlockTarget, DeviceEvent};
use zbus::Connection;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::bytestring::{decode_c_string_bytes, decode_object_path_component};

const UDISKS_SERVICE: &str = "org.freedesktop.UDisks2";
const BLOCK_INTERFACE: &str = "org.freedesktop.UDisks2.Block";
const BLOCK_PATH_PREFIX: &str = "/org/freedesktop/UDisks2/block_devices/";

#[zbus::proxy(
    interface = "org.freedesktop.UDisks2.Manager",
    default_service = "org.freedesktop.UDisks2",
    default_path = "/org/freedesktop/UDisks2/Manager"
)]
trait UDisks2Manager {
    fn get_block_devices(
        &self,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<Vec<OwnedObjectPath>>;
}

/// Enumeration and notification source backed by the UDisks2 daemon.
pub struct UdisksSource {
    connection: Connection,
}

impl UdisksSource {
    /// Connect to the system bus.
    pub async fn new() -> unlock_core::Result<Self> {
        let connection = Connection::system()
            .await
            .map_err(|e| ControlError::Backend(e.to_string()))?;
        Ok(Self::with_connection(connection))
    }

    /// Reuse an existing bus connection.
    pub fn with_connection(connection: Connection) -> Self {
        Self { connection }
    }
}

impl TargetEnumerator for UdisksSource {
    fn enumerate(&self) -> BoxFuture<'_, unlock_core::Result<Vec<BlockTarget>>> {
        Box::pin(async move {
            enumerate_targets(&self.connection)
                .await
                .map_err(|e| ControlError::Backend(e.to_string()))
        })
    }
}

impl DeviceEvents for UdisksSource {
    fn subscribe(&self) -> BoxFuture<'_, unlock_core::Result<DeviceEventStream>> {
        Box::pin(async move {
            subscribe_events(&self.connection)
                .await
                .map_err(|e| ControlError::Backend(e.to_string()))
        })
    }
}

async fn enumerate_targets(connection: &Connection) -> Result<Vec<BlockTarget>> {
    let manager_proxy = UDisks2ManagerProxy::new(connection).await?;
    let block_paths = manager_proxy.get_block_devices(HashMap::new()).await?;

    let mut node_by_path: HashMap<OwnedObjectPath, String> = HashMap::new();
    let mut disk_paths: Vec<OwnedObjectPath> = Vec::new();
    // (table object, partition number) per partition block
    let mut partition_info: Vec<(OwnedObjectPath, u32)> = Vec::new();

    for path in block_paths {
        let block_proxy = match BlockProxy::builder(connection).path(&path)?.build().await {
            Ok(p) => p,
            Err(e) => {
                tracing::info!("Could not get block device: {}", e);
                continue;
            }
        };

        let device = decode_c_string_bytes(&block_proxy.device().await?);
        let node = device.rsplit('/').next().unwrap_or(&device).to_string();
        if node.is_empty() {
            continue;
        }
        node_by_path.insert(path.clone(), node);

        if let Ok(partition_proxy) = PartitionProxy::builder(connection).path(&path)?.build().await
            && let Ok(table) = partition_proxy.table().await
        {
            let number = partition_proxy.number().await.unwrap_or(0);
            partition_info.push((table, number));
            continue;
        }
        disk_paths.push(path);
    }

    let mut disks: Vec<(OwnedObjectPath, String)> = disk_paths
        .into_iter()
        .filter_map(|path| {
            let node = node_by_path.get(&path)?.clone();
            Some((path, node))
        })
        .collect();
    disks.sort_by(|a, b| a.1.cmp(&b.1));

    let mut targets = Vec::new();
    for (disk_path, disk_node) in &disks {
        targets.push(BlockTarget::disk(disk_node.clone()));

        let mut numbers: Vec<u32> = partition_info
            .iter()
            .filter(|(table, number)| table == disk_path && *number > 0)
            .map(|(_, number)| *number)
            .collect();
        numbers.sort_unstable();
        for number in numbers {
            targets.push(BlockTarget::partition(disk_node.clone(), number));
        }
    }

    Ok(targets)
}

async fn subscribe_events(connection: &Connection) -> Result<DeviceEventStream> {
    let obj_manager = zbus::Proxy::new(
        connection,
        UDISKS_SERVICE,
        "/org/freedesktop/UDisks2",
        "org.freedesktop.DBus.ObjectManager",
    )
    .await?;

    let added_stream = obj_manager.receive_signal("InterfacesAdded").await?;
    let removed_stream = obj_manager.receive_signal("InterfacesRemoved").await?;

    let added = added_stream.filter_map(|signal| {
        let event = match signal.body().deserialize::<(
            OwnedObjectPath,
            HashMap<String, HashMap<String, OwnedValue>>,
        )>() {
            Ok((path, interfaces)) if interfaces.contains_key(BLOCK_INTERFACE) => {
                block_target_for_path(&path).map(DeviceEvent::Added)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::error!("Failed to parse InterfacesAdded signal: {}", e);
                None
            }
        };
        futures::future::ready(event)
    });

    let removed = removed_stream.filter_map(|signal| {
        let event = match signal
            .body()
            .deserialize::<(OwnedObjectPath, Vec<String>)>()
        {
            Ok((path, interfaces)) if interfaces.iter().any(|i| i == BLOCK_INTERFACE) => {
                block_target_for_path(&path).map(DeviceEvent::Removed)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::error!("Failed to parse InterfacesRemoved signal: {}", e);
                None
            }
        };
        futures::future::ready(event)
    });

    Ok(Box::pin(futures::stream::select(added, removed)))
}

fn block_target_for_path(path: &OwnedObjectPath) -> Option<BlockTarget> {
    let component = path.as_str().strip_prefix(BLOCK_PATH_PREFIX)?;
    if component.is_empty() || component.contains('/') {
        return None;
    }
    Some(BlockTarget::from_node_name(&decode_object_path_component(
        component,
    )))
}
