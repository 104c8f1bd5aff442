//! Backup archive rewriting.
//!
//! Velero backup contents are a gzip-compressed tar. Volumes backed up from
//! older clusters spell the CSI handle field `volumeId`; restoring them
//! requires `VolumeId`. [`ArchiveRewriter`] fixes that in place:
//!
//! 1. spool the input into a private scratch directory,
//! 2. extract the tar under it,
//! 3. walk the tree and pick regular files whose path contains the marker,
//! 4. substitute the token line by line,
//! 5. repack every original entry, in order, into a new gzip tar,
//! 6. delete the scratch directory.
//!
//! # Scratch layout
//!
//! ```text
//! {workspace}/restore-XXXXXX/input.tar.gz   # spooled input (removed after extraction)
//! {workspace}/restore-XXXXXX/tree/...       # extracted entries
//! ```

pub mod error;
pub mod lines;
pub mod rewrite;
mod tar_read;
mod tar_write;

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::{RewriteError, RewriteResult, Stage};
pub use lines::rewrite_lines;
pub use rewrite::{ArchiveRewriter, Rewritten};

/// Path fragment identifying cluster-scoped PersistentVolume manifests.
pub const PERSISTENT_VOLUMES_MARKER: &str = "resources/persistentvolumes/cluster";
/// Field spelling found in legacy backups.
pub const LEGACY_VOLUME_ID: &str = "volumeId";
/// Field spelling expected on restore.
pub const VOLUME_ID: &str = "VolumeId";
/// Default base directory for scratch workspaces.
pub const DEFAULT_WORKSPACE: &str = "/tmp/velero-restore";

/// Line ending policy for rewritten files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewlineMode {
    /// Terminate every line with `\n` (CRLF folded), including the last one.
    #[default]
    Terminate,
    /// Keep original line endings byte-for-byte.
    Preserve,
}

impl std::str::FromStr for NewlineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminate" => Ok(Self::Terminate),
            "preserve" => Ok(Self::Preserve),
            other => Err(format!(
                "unknown newline mode '{other}' (expected 'terminate' or 'preserve')"
            )),
        }
    }
}

/// What to rewrite and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRules {
    /// Only files whose archive path contains this fragment are scanned.
    pub marker: String,
    /// Literal token to look for.
    pub from: String,
    /// Replacement for every occurrence of `from` on a matching line.
    pub to: String,
    #[serde(default)]
    pub newline: NewlineMode,
}

impl RewriteRules {
    /// `volumeId` -> `VolumeId` in cluster-scoped PersistentVolume manifests.
    pub fn persistent_volumes() -> Self {
        Self {
            marker: PERSISTENT_VOLUMES_MARKER.to_string(),
            from: LEGACY_VOLUME_ID.to_string(),
            to: VOLUME_ID.to_string(),
            newline: NewlineMode::default(),
        }
    }

    pub fn with_newline(mut self, newline: NewlineMode) -> Self {
        self.newline = newline;
        self
    }
}

impl Default for RewriteRules {
    fn default() -> Self {
        Self::persistent_volumes()
    }
}

/// Convert `volumeId` to `VolumeId` in the PersistentVolume manifests of a
/// backup archive, using `workspace` for scratch space.
pub fn check_and_convert_volume_id<R: Read>(
    input: R,
    workspace: impl AsRef<Path>,
) -> RewriteResult<Vec<u8>> {
    let rewriter =
        ArchiveRewriter::new(workspace.as_ref(), RewriteRules::persistent_volumes())?;
    Ok(rewriter.rewrite(input)?.archive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newline_mode_parse() {
        assert_eq!("Preserve".parse::<NewlineMode>(), Ok(NewlineMode::Preserve));
        assert_eq!("terminate".parse::<NewlineMode>(), Ok(NewlineMode::Terminate));
        assert!("crlf".parse::<NewlineMode>().is_err());
    }

    #[test]
    fn test_default_rules() {
        let rules = RewriteRules::default();
        assert_eq!(rules.marker, PERSISTENT_VOLUMES_MARKER);
        assert_eq!(rules.from, "volumeId");
        assert_eq!(rules.to, "VolumeId");
        assert_eq!(rules.newline, NewlineMode::Terminate);
        assert!(!rules.to.contains(&rules.from));
    }
}
