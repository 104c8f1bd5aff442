use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::id::{unique_id, IdSource, RandomIds};
use super::{SnapshotError, SnapshotResult, Tags, VolumeInfo, VolumeSnapshotter, VOLUME_ID_PATH};
use crate::config::{self, ConfigMap};
use crate::unstructured;

/// Volume type recorded for volumes first seen as a snapshot source.
pub const ORIGINAL_VOLUME_TYPE: &str = "originalVolumeType";
/// IOPS recorded for volumes first seen as a snapshot source.
pub const DEFAULT_IOPS: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRecord {
    pub volume_type: String,
    pub az: String,
    pub iops: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub volume_id: String,
    pub az: String,
    pub tags: Tags,
}

struct Registry {
    ids: Box<dyn IdSource>,
    volumes: HashMap<String, VolumeRecord>,
    snapshots: HashMap<String, SnapshotRecord>,
}

impl Registry {
    fn seed_volume(&mut self, volume_id: &str, az: &str) {
        self.volumes
            .entry(volume_id.to_string())
            .or_insert_with(|| VolumeRecord {
                volume_type: ORIGINAL_VOLUME_TYPE.to_string(),
                az: az.to_string(),
                iops: Some(DEFAULT_IOPS),
            });
    }
}

/// In-memory snapshotter for host path volumes.
pub struct HostPathSnapshotter {
    config: ConfigMap,
    registry: Mutex<Registry>,
}

impl HostPathSnapshotter {
    pub fn new() -> Self {
        Self::with_id_source(RandomIds::new())
    }

    pub fn with_id_source(ids: impl IdSource + 'static) -> Self {
        Self {
            config: ConfigMap::new(),
            registry: Mutex::new(Registry {
                ids: Box::new(ids),
                volumes: HashMap::new(),
                snapshots: HashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    pub fn snapshot_count(&self) -> usize {
        self.lock().snapshots.len()
    }

    pub fn snapshot(&self, snapshot_id: &str) -> Option<SnapshotRecord> {
        self.lock().snapshots.get(snapshot_id).cloned()
    }

    pub fn volume(&self, volume_id: &str) -> Option<VolumeRecord> {
        self.lock().volumes.get(volume_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Every update is a single insert or remove.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for HostPathSnapshotter {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeSnapshotter for HostPathSnapshotter {
    fn init(&mut self, config: &ConfigMap) -> SnapshotResult<()> {
        config::validate_volume_snapshotter_config_keys(config)?;
        self.config = config.clone();
        tracing::info!(keys = config.len(), "volume snapshotter initialized");
        Ok(())
    }

    fn create_volume_from_snapshot(
        &self,
        snapshot_id: &str,
        volume_type: &str,
        volume_az: &str,
        iops: Option<i64>,
    ) -> SnapshotResult<String> {
        let mut registry = self.lock();
        let Registry { ids, volumes, .. } = &mut *registry;
        let volume_id = unique_id(ids.as_mut(), snapshot_id, "vol", |id| volumes.contains_key(id));
        volumes.insert(
            volume_id.clone(),
            VolumeRecord {
                volume_type: volume_type.to_string(),
                az: volume_az.to_string(),
                iops,
            },
        );

        tracing::info!(
            snapshot_id,
            volume_type,
            volume_az,
            iops,
            volume_id = %volume_id,
            "created volume from snapshot"
        );
        Ok(volume_id)
    }

    fn get_volume_info(&self, volume_id: &str, volume_az: &str) -> SnapshotResult<VolumeInfo> {
        tracing::debug!(volume_id, volume_az, "get volume info");
        let registry = self.lock();
        let volume = registry
            .volumes
            .get(volume_id)
            .ok_or_else(|| SnapshotError::VolumeNotFound {
                volume_id: volume_id.to_string(),
            })?;
        Ok(VolumeInfo {
            volume_type: volume.volume_type.clone(),
            iops: volume.iops,
        })
    }

    fn create_snapshot(
        &self,
        volume_id: &str,
        volume_az: &str,
        tags: &Tags,
    ) -> SnapshotResult<String> {
        let mut registry = self.lock();
        let snapshot_id = {
            let Registry { ids, snapshots, .. } = &mut *registry;
            unique_id(ids.as_mut(), volume_id, "snap", |id| snapshots.contains_key(id))
        };

        registry.seed_volume(volume_id, volume_az);
        registry.snapshots.insert(
            snapshot_id.clone(),
            SnapshotRecord {
                volume_id: volume_id.to_string(),
                az: volume_az.to_string(),
                tags: tags.clone(),
            },
        );

        tracing::info!(
            volume_id,
            volume_az,
            tags = tags.len(),
            snapshot_id = %snapshot_id,
            "created snapshot"
        );
        Ok(snapshot_id)
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> SnapshotResult<()> {
        let removed = self.lock().snapshots.remove(snapshot_id);
        if let Some(snapshot) = removed {
            tracing::info!(
                snapshot_id,
                volume_id = %snapshot.volume_id,
                az = %snapshot.az,
                "deleted snapshot"
            );
        } else {
            tracing::debug!(snapshot_id, "snapshot already gone");
        }
        Ok(())
    }

    fn get_volume_id(&self, pv: &Value) -> SnapshotResult<String> {
        let volume_id = unstructured::get_string(pv, VOLUME_ID_PATH)?.to_string();

        // Seed the record so a later get_volume_info succeeds.
        self.lock().seed_volume(&volume_id, "");
        tracing::debug!(volume_id = %volume_id, "resolved volume id");
        Ok(volume_id)
    }

    fn set_volume_id(&self, mut pv: Value, volume_id: &str) -> SnapshotResult<Value> {
        unstructured::get_map(&pv, "spec.hostPath")?;
        unstructured::set_value(&mut pv, VOLUME_ID_PATH, Value::String(volume_id.to_string()))?;
        tracing::debug!(volume_id, "set volume id");
        Ok(pv)
    }
}
