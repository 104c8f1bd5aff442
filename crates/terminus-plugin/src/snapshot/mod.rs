//! Volume snapshotter plugin.
//!
//! Terminus volumes are host paths, so there is nothing to snapshot at the
//! storage layer. [`HostPathSnapshotter`] keeps in-memory volume and
//! snapshot registries so the backup host sees a consistent view during one
//! process lifetime.

pub mod hostpath;
pub mod id;

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigError, ConfigMap};
use crate::unstructured::UnstructuredError;

pub use hostpath::{HostPathSnapshotter, SnapshotRecord, VolumeRecord};
pub use id::{IdSource, RandomIds};

/// Field of a persistent volume holding its volume ID.
pub const VOLUME_ID_PATH: &str = "spec.hostPath.path";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("volume {volume_id} not found")]
    VolumeNotFound { volume_id: String },

    #[error("persistent volume has no volume ID: {0}")]
    MissingField(#[from] UnstructuredError),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl SnapshotError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::VolumeNotFound { .. })
    }
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Volume details returned by [`VolumeSnapshotter::get_volume_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub volume_type: String,
    pub iops: Option<i64>,
}

pub type Tags = BTreeMap<String, String>;

pub trait VolumeSnapshotter: Send + Sync {
    fn init(&mut self, config: &ConfigMap) -> SnapshotResult<()>;

    /// Register a volume restored from `snapshot_id` and return its ID.
    fn create_volume_from_snapshot(
        &self,
        snapshot_id: &str,
        volume_type: &str,
        volume_az: &str,
        iops: Option<i64>,
    ) -> SnapshotResult<String>;

    fn get_volume_info(&self, volume_id: &str, volume_az: &str) -> SnapshotResult<VolumeInfo>;

    /// Record a snapshot of `volume_id` and return its ID.
    fn create_snapshot(&self, volume_id: &str, volume_az: &str, tags: &Tags)
        -> SnapshotResult<String>;

    /// Forget a snapshot. Unknown IDs are ignored.
    fn delete_snapshot(&self, snapshot_id: &str) -> SnapshotResult<()>;

    /// Volume ID of a persistent volume object.
    fn get_volume_id(&self, pv: &Value) -> SnapshotResult<String>;

    /// Point a persistent volume object at `volume_id`.
    fn set_volume_id(&self, pv: Value, volume_id: &str) -> SnapshotResult<Value>;
}
