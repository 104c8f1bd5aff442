//! Host-visible plugin names and their constructors.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::PluginConfig;
use crate::restore::{RestoreItemAction, TerminusRestoreAction};
use crate::snapshot::{HostPathSnapshotter, VolumeSnapshotter};
use crate::store::{LocalObjectStore, ObjectStore, StoreError};

pub const OBJECT_STORE_PLUGIN: &str = "terminus.io/object-store";
pub const VOLUME_SNAPSHOTTER_PLUGIN: &str = "terminus.io/volume-snapshotter";
pub const RESTORE_ITEM_ACTION_PLUGIN: &str = "terminus.io/restore-item-action";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    ObjectStore,
    VolumeSnapshotter,
    RestoreItemAction,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectStore => write!(f, "ObjectStore"),
            Self::VolumeSnapshotter => write!(f, "VolumeSnapshotter"),
            Self::RestoreItemAction => write!(f, "RestoreItemAction"),
        }
    }
}

/// A constructed plugin instance.
pub enum Plugin {
    ObjectStore(Box<dyn ObjectStore>),
    VolumeSnapshotter(Box<dyn VolumeSnapshotter>),
    RestoreItemAction(Box<dyn RestoreItemAction>),
}

impl Plugin {
    pub fn kind(&self) -> PluginKind {
        match self {
            Self::ObjectStore(_) => PluginKind::ObjectStore,
            Self::VolumeSnapshotter(_) => PluginKind::VolumeSnapshotter,
            Self::RestoreItemAction(_) => PluginKind::RestoreItemAction,
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Plugin").field(&self.kind()).finish()
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("plugin {name} is already registered")]
    Duplicate { name: String },

    #[error("no plugin named {name}")]
    Unknown { name: String },

    #[error("plugin {name} is registered as {expected} but built a {actual}")]
    KindMismatch {
        name: String,
        expected: PluginKind,
        actual: PluginKind,
    },

    #[error("failed to build plugin {name}: {source}")]
    Build {
        name: String,
        #[source]
        source: StoreError,
    },
}

pub type Factory = Box<dyn Fn(&PluginConfig) -> Result<Plugin, StoreError> + Send + Sync>;

struct Entry {
    kind: PluginKind,
    factory: Factory,
}

/// Plugin names mapped to constructors, in name order.
#[derive(Default)]
pub struct PluginRegistry {
    entries: BTreeMap<String, Entry>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three Terminus plugins.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: [(&str, PluginKind, Factory); 3] = [
            (
                OBJECT_STORE_PLUGIN,
                PluginKind::ObjectStore,
                Box::new(|cfg: &PluginConfig| {
                    Ok(Plugin::ObjectStore(Box::new(LocalObjectStore::from_config(cfg)?)))
                }),
            ),
            (
                VOLUME_SNAPSHOTTER_PLUGIN,
                PluginKind::VolumeSnapshotter,
                Box::new(|_: &PluginConfig| Ok(Plugin::VolumeSnapshotter(Box::new(HostPathSnapshotter::new())))),
            ),
            (
                RESTORE_ITEM_ACTION_PLUGIN,
                PluginKind::RestoreItemAction,
                Box::new(|_: &PluginConfig| Ok(Plugin::RestoreItemAction(Box::new(TerminusRestoreAction::new())))),
            ),
        ];
        for (name, kind, factory) in defaults {
            registry.entries.insert(name.to_string(), Entry { kind, factory });
        }
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        kind: PluginKind,
        factory: Factory,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        tracing::debug!(name = %name, %kind, "registered plugin");
        self.entries.insert(name, Entry { kind, factory });
        Ok(())
    }

    /// Registered names and kinds, sorted by name.
    pub fn plugins(&self) -> impl Iterator<Item = (&str, PluginKind)> + '_ {
        self.entries.iter().map(|(name, e)| (name.as_str(), e.kind))
    }

    pub fn kind_of(&self, name: &str) -> Option<PluginKind> {
        self.entries.get(name).map(|e| e.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the plugin registered as `name`.
    pub fn create(&self, name: &str, config: &PluginConfig) -> Result<Plugin, RegistryError> {
        let entry = self.entries.get(name).ok_or_else(|| RegistryError::Unknown {
            name: name.to_string(),
        })?;
        let plugin = (entry.factory)(config).map_err(|source| RegistryError::Build {
            name: name.to_string(),
            source,
        })?;
        if plugin.kind() != entry.kind {
            return Err(RegistryError::KindMismatch {
                name: name.to_string(),
                expected: entry.kind,
                actual: plugin.kind(),
            });
        }
        tracing::info!(name, kind = %entry.kind, "created plugin");
        Ok(plugin)
    }
}
