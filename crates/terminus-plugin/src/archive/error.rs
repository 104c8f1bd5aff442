//! Error types for the archive rewrite pipeline.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for rewrite operations.
pub type RewriteResult<T> = Result<T, RewriteError>;

/// Pipeline stage an invocation was in when it failed.
///
/// A rewrite runs `Extracting -> Scanning -> Rewriting -> Repacking` and
/// stops at the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Scanning,
    Rewriting,
    Repacking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extracting => "extracting",
            Stage::Scanning => "scanning",
            Stage::Rewriting => "rewriting",
            Stage::Repacking => "repacking",
        };
        f.write_str(name)
    }
}

/// Errors produced by [`ArchiveRewriter`](super::ArchiveRewriter).
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The input is not a valid gzip-compressed tar stream.
    #[error("malformed archive while {stage}: {message}")]
    Malformed {
        stage: Stage,
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Reading or writing the scratch workspace failed.
    #[error("I/O error while {stage} at {}: {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source token could not be compiled into a matcher.
    #[error("invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl RewriteError {
    pub(crate) fn io(stage: Stage, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            stage,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(stage: Stage, source: io::Error) -> Self {
        Self::Malformed {
            stage,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn malformed_msg(stage: Stage, message: impl Into<String>) -> Self {
        Self::Malformed {
            stage,
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if the input archive itself was invalid.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// The stage the pipeline was in, if the error came from a stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Malformed { stage, .. } | Self::Io { stage, .. } => Some(*stage),
            Self::Pattern(_) => None,
        }
    }
}
