//! Plugin configuration.
//!
//! Two sources feed the plugins:
//!
//! - [`PluginConfig`]: process-level settings (store root, scratch
//!   workspace, rewrite behaviour) from defaults, an optional YAML file and
//!   `TERMINUS_*` environment variables, in that order of precedence.
//! - The per-location config map the host passes to each plugin's `init`,
//!   checked with [`validate_config_keys`].

use std::collections::{BTreeSet, HashMap};
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::{NewlineMode, DEFAULT_WORKSPACE};

/// Default directory backups are stored under.
pub const DEFAULT_ROOT: &str = "/var/lib/velero-plugin-for-terminus";

pub const ENV_ROOT: &str = "TERMINUS_BACKUP_ROOT";
pub const ENV_WORKSPACE: &str = "TERMINUS_RESTORE_WORKSPACE";
pub const ENV_REWRITE_ARCHIVES: &str = "TERMINUS_REWRITE_ARCHIVES";
pub const ENV_NEWLINE_MODE: &str = "TERMINUS_NEWLINE_MODE";

/// Config map key naming the bucket.
pub const BUCKET_KEY: &str = "bucket";
/// Config map key naming the prefix inside the bucket.
pub const PREFIX_KEY: &str = "prefix";
/// Config map key carrying a CA bundle.
pub const CA_CERT_KEY: &str = "caCert";
/// Config map key naming a credentials file.
pub const CREDENTIALS_FILE_KEY: &str = "credentialsFile";

/// Config map as handed to a plugin's `init`.
pub type ConfigMap = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config has invalid keys {invalid:?}; valid keys are {valid:?}")]
    InvalidKeys {
        invalid: Vec<String>,
        valid: Vec<String>,
    },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Reject any key of `config` not listed in `valid`. Invalid keys are
/// reported sorted.
pub fn validate_config_keys(config: &ConfigMap, valid: &[&str]) -> Result<(), ConfigError> {
    let invalid: BTreeSet<&String> = config
        .keys()
        .filter(|k| !valid.contains(&k.as_str()))
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    Err(ConfigError::InvalidKeys {
        invalid: invalid.into_iter().cloned().collect(),
        valid: valid.iter().map(|s| s.to_string()).collect(),
    })
}

/// Object store config keys.
pub fn validate_object_store_config_keys(config: &ConfigMap) -> Result<(), ConfigError> {
    validate_config_keys(
        config,
        &[BUCKET_KEY, PREFIX_KEY, CA_CERT_KEY, CREDENTIALS_FILE_KEY],
    )
}

/// Volume snapshotter config keys.
pub fn validate_volume_snapshotter_config_keys(config: &ConfigMap) -> Result<(), ConfigError> {
    validate_config_keys(config, &[CREDENTIALS_FILE_KEY])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PluginConfig {
    /// Directory buckets live under.
    pub root: PathBuf,
    /// Base directory for archive rewrite scratch space.
    pub workspace: PathBuf,
    /// Rewrite backup content archives on download.
    pub rewrite_backup_archives: bool,
    /// Line ending policy for rewritten files.
    pub newline_mode: NewlineMode,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            workspace: PathBuf::from(DEFAULT_WORKSPACE),
            rewrite_backup_archives: true,
            newline_mode: NewlineMode::default(),
        }
    }
}

impl PluginConfig {
    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// YAML file overridden by the environment.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg: Self = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Apply `TERMINUS_*` overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = var(ENV_ROOT) {
            self.root = PathBuf::from(v);
        }
        if let Some(v) = var(ENV_WORKSPACE) {
            self.workspace = PathBuf::from(v);
        }
        if let Some(v) = var(ENV_REWRITE_ARCHIVES) {
            self.rewrite_backup_archives = parse_bool(ENV_REWRITE_ARCHIVES, &v)?;
        }
        if let Some(v) = var(ENV_NEWLINE_MODE) {
            self.newline_mode = v.parse().map_err(|reason| ConfigError::InvalidValue {
                key: ENV_NEWLINE_MODE.to_string(),
                reason,
            })?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_validate_accepts_known_keys() {
        let cfg = map(&[("bucket", "velero"), ("prefix", "cluster-a")]);
        assert!(validate_object_store_config_keys(&cfg).is_ok());
        assert!(validate_volume_snapshotter_config_keys(&ConfigMap::new()).is_ok());
    }

    #[test]
    fn test_validate_reports_sorted_invalid_keys() {
        let cfg = map(&[("zone", "a"), ("bucket", "velero"), ("region", "b")]);
        match validate_object_store_config_keys(&cfg) {
            Err(ConfigError::InvalidKeys { invalid, .. }) => {
                assert_eq!(invalid, vec!["region".to_string(), "zone".to_string()]);
            }
            other => panic!("expected InvalidKeys, got {other:?}"),
        }
        assert!(validate_volume_snapshotter_config_keys(&map(&[("bucket", "x")])).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars = map(&[
            (ENV_ROOT, "/srv/backups"),
            (ENV_REWRITE_ARCHIVES, "off"),
            (ENV_NEWLINE_MODE, "preserve"),
        ]);
        let mut cfg = PluginConfig::default();
        cfg.apply_vars(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/srv/backups"));
        assert_eq!(cfg.workspace, PathBuf::from(DEFAULT_WORKSPACE));
        assert!(!cfg.rewrite_backup_archives);
        assert_eq!(cfg.newline_mode, NewlineMode::Preserve);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut cfg = PluginConfig::default();
        let err = cfg
            .apply_vars(|k| (k == ENV_REWRITE_ARCHIVES).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_REWRITE_ARCHIVES));
    }

    #[test]
    fn test_yaml_file_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin.yaml");
        std::fs::write(&path, "root: /mnt/backups\nnewline_mode: preserve\n").unwrap();
        let cfg: PluginConfig =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/mnt/backups"));
        assert_eq!(cfg.newline_mode, NewlineMode::Preserve);
        assert!(cfg.rewrite_backup_archives);
    }

    #[test]
    fn test_yaml_file_missing() {
        let err = PluginConfig::from_yaml_file("/nonexistent/plugin.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
