//! Mapping between `(bucket, key)` pairs and locations below the store root.
//!
//! # Layout
//!
//! ```text
//! {root}/{bucket}/{key}
//! {root}/velero/backups/daily-1/daily-1.tar.gz
//! {root}/velero/backups/daily-1/velero-backup.json
//! ```
//!
//! Keys are slash-separated. Empty segments, `.` and `..` are rejected so a
//! key can never address anything outside its bucket.

use std::path::PathBuf;

use object_store::path::Path;

use super::{StoreError, StoreResult};

/// Top-level directory Velero writes backups under.
pub const BACKUPS_DIR: &str = "backups";
/// Suffix of a backup's content archive.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// A validated object address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    bucket: String,
    key: String,
}

impl ObjectKey {
    pub fn new(bucket: &str, key: &str) -> StoreResult<Self> {
        validate_bucket(bucket)?;
        let key = key.trim_matches('/');
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key is empty".to_string(),
            });
        }
        // Validate segments up front so errors name the caller's key.
        Path::parse(key).map_err(|e| StoreError::InvalidKey {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Location relative to the store root.
    pub fn location(&self) -> Path {
        Path::from_iter([self.bucket.as_str()].into_iter().chain(self.key.split('/')))
    }

    /// Absolute filesystem path of the object.
    pub fn local_path(&self, root: &std::path::Path) -> PathBuf {
        let mut path = root.join(&self.bucket);
        path.extend(self.key.split('/'));
        path
    }

    /// Backup content archives (`backups/<name>/<name>.tar.gz`) are the
    /// objects the restore path rewrites.
    pub fn is_backup_archive(&self) -> bool {
        let mut parts = self.key.split('/');
        matches!(
            (parts.next(), parts.next(), parts.next(), parts.next()),
            (Some(BACKUPS_DIR), Some(_), Some(file), None) if file.ends_with(ARCHIVE_SUFFIX)
        )
    }
}

/// Location to list when looking for keys starting with `prefix`: the bucket
/// plus every complete segment of the prefix.
pub fn listing_root(bucket: &str, prefix: &str) -> StoreResult<Path> {
    validate_bucket(bucket)?;
    let dir = match prefix.rfind('/') {
        Some(pos) => &prefix[..pos],
        None => "",
    };
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        return Ok(Path::from_iter([bucket]));
    }
    Path::parse(dir).map_err(|e| StoreError::InvalidKey {
        key: prefix.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Path::from_iter([bucket].into_iter().chain(dir.split('/'))))
}

/// Key of `location` inside `bucket`, or `None` if it lies elsewhere.
pub fn key_in_bucket(bucket: &str, location: &Path) -> Option<String> {
    let mut parts = location.parts();
    let first = parts.next()?;
    if first.as_ref() != bucket {
        return None;
    }
    let rest: Vec<String> = parts.map(|p| p.as_ref().to_string()).collect();
    if rest.is_empty() {
        None
    } else {
        Some(rest.join("/"))
    }
}

/// The common prefix `key` rolls up into: `prefix` plus everything up to and
/// including the first `delimiter` after it. `None` if `key` has no
/// delimiter past `prefix` (it is a plain object at that level).
pub fn common_prefix(key: &str, prefix: &str, delimiter: &str) -> Option<String> {
    let rest = key.strip_prefix(prefix)?;
    if delimiter.is_empty() {
        return None;
    }
    let end = rest.find(delimiter)? + delimiter.len();
    Some(format!("{}{}", prefix, &rest[..end]))
}

fn validate_bucket(bucket: &str) -> StoreResult<()> {
    if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
        return Err(StoreError::InvalidKey {
            key: bucket.to_string(),
            reason: "bucket must be a single non-empty path segment".to_string(),
        });
    }
    Ok(())
}
