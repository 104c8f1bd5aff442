//! Velero plugins for Terminus.
//!
//! - [`store`]: object store backed by a local directory tree, with backup
//!   archives rewritten on download by [`archive`]
//! - [`snapshot`]: in-memory volume snapshotter for host path volumes
//! - [`restore`]: restore item action
//! - [`registry`]: plugin names exposed to the host

pub mod archive;
pub mod config;
pub mod registry;
pub mod restore;
pub mod snapshot;
pub mod store;
pub mod unstructured;

// Convenience re-exports
pub use archive::{
    check_and_convert_volume_id, ArchiveRewriter, NewlineMode, RewriteError, RewriteRules,
    Rewritten,
};
pub use config::{ConfigError, ConfigMap, PluginConfig};
pub use registry::{Plugin, PluginKind, PluginRegistry, RegistryError};
pub use restore::{RestoreItemAction, TerminusRestoreAction};
pub use snapshot::{HostPathSnapshotter, SnapshotError, VolumeSnapshotter};
pub use store::{LocalObjectStore, ObjectStore, StoreError};

// Re-export bytes for CLI convenience
pub use bytes::Bytes;
