//! The extract / scan / rewrite / repack pipeline.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use regex::bytes::Regex;
use walkdir::WalkDir;

use super::error::{RewriteError, RewriteResult, Stage};
use super::lines::{rewrite_lines, token_pattern};
use super::tar_read::{EntryBody, EntryRecord};
use super::{tar_read, tar_write, RewriteRules};

const SCRATCH_PREFIX: &str = "restore-";
const SPOOL_NAME: &str = "input.tar.gz";
const TREE_NAME: &str = "tree";

/// Result of a successful rewrite.
#[derive(Debug, Clone)]
pub struct Rewritten {
    /// The repacked gzip tar.
    pub archive: Vec<u8>,
    /// Number of archive entries carried over.
    pub entries: usize,
    /// Qualifying files whose content changed.
    pub files_rewritten: usize,
    /// Lines in which the token was replaced.
    pub lines_rewritten: usize,
}

/// Rewrites a token inside selected files of a gzip tar stream.
///
/// Each call works in its own uniquely named directory under the workspace
/// base and only touches absolute paths below it, so one rewriter can be
/// shared across threads. The scratch directory is removed on every exit
/// path.
#[derive(Debug, Clone)]
pub struct ArchiveRewriter {
    workspace: PathBuf,
    rules: RewriteRules,
    pattern: Regex,
}

impl ArchiveRewriter {
    /// A relative `workspace` is resolved once here, so later calls do not
    /// depend on the process working directory.
    pub fn new(workspace: impl Into<PathBuf>, rules: RewriteRules) -> RewriteResult<Self> {
        let pattern = token_pattern(&rules.from)?;
        let workspace = workspace.into();
        let workspace = std::path::absolute(&workspace)
            .map_err(|e| RewriteError::io(Stage::Extracting, &workspace, e))?;
        Ok(Self {
            workspace,
            rules,
            pattern,
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn rules(&self) -> &RewriteRules {
        &self.rules
    }

    /// Run the pipeline over `input`.
    ///
    /// Fails with [`RewriteError::Malformed`] if the input is not a gzip
    /// tar and with [`RewriteError::Io`] if the workspace cannot be written.
    /// No output is produced on failure.
    pub fn rewrite<R: Read>(&self, mut input: R) -> RewriteResult<Rewritten> {
        fs::create_dir_all(&self.workspace)
            .map_err(|e| RewriteError::io(Stage::Extracting, &self.workspace, e))?;
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.workspace)
            .map_err(|e| RewriteError::io(Stage::Extracting, &self.workspace, e))?;

        tracing::info!(
            workspace = %scratch.path().display(),
            marker = %self.rules.marker,
            "rewriting archive"
        );

        let spool = scratch.path().join(SPOOL_NAME);
        let tree = scratch.path().join(TREE_NAME);

        {
            let mut out =
                File::create(&spool).map_err(|e| RewriteError::io(Stage::Extracting, &spool, e))?;
            io::copy(&mut input, &mut out)
                .map_err(|e| RewriteError::io(Stage::Extracting, &spool, e))?;
        }
        fs::create_dir_all(&tree).map_err(|e| RewriteError::io(Stage::Extracting, &tree, e))?;

        let mut records = tar_read::extract(&spool, &tree)?;
        fs::remove_file(&spool).map_err(|e| RewriteError::io(Stage::Extracting, &spool, e))?;

        let targets = self.scan(&tree)?;
        tracing::debug!(entries = records.len(), targets = targets.len(), "scanned archive");

        let mut files_rewritten = 0;
        let mut lines_rewritten = 0;
        for target in &targets {
            let changed = self.rewrite_file(target)?;
            if changed > 0 {
                files_rewritten += 1;
                lines_rewritten += changed;
            }
        }
        for changed in self.rewrite_shadowed(&mut records) {
            files_rewritten += 1;
            lines_rewritten += changed;
        }

        let archive = tar_write::repack(&records, &tree)?;

        let scratch_path = scratch.path().to_path_buf();
        scratch
            .close()
            .map_err(|e| RewriteError::io(Stage::Repacking, &scratch_path, e))?;

        tracing::info!(
            entries = records.len(),
            files = records.iter().filter(|r| r.is_file()).count(),
            files_rewritten,
            lines_rewritten,
            "archive rewritten"
        );

        Ok(Rewritten {
            archive,
            entries: records.len(),
            files_rewritten,
            lines_rewritten,
        })
    }

    /// Regular files below `tree` whose archive-relative path contains the
    /// marker, in lexical order.
    fn scan(&self, tree: &Path) -> RewriteResult<Vec<PathBuf>> {
        let mut targets = Vec::new();
        for entry in WalkDir::new(tree).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(tree).to_path_buf();
                RewriteError::io(Stage::Scanning, path, io::Error::from(e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(tree) else {
                continue;
            };
            if archive_path(relative).contains(&self.rules.marker) {
                targets.push(entry.into_path());
            }
        }
        Ok(targets)
    }

    /// Rewrite one extracted file in place. Returns the number of matching lines.
    fn rewrite_file(&self, path: &Path) -> RewriteResult<usize> {
        let content = fs::read(path).map_err(|e| RewriteError::io(Stage::Rewriting, path, e))?;
        let (output, matched) = rewrite_lines(
            &content,
            &self.pattern,
            self.rules.to.as_bytes(),
            self.rules.newline,
        );
        if output != content {
            fs::write(path, &output).map_err(|e| RewriteError::io(Stage::Rewriting, path, e))?;
            tracing::debug!(path = %path.display(), lines = matched, "rewrote file");
        }
        Ok(matched)
    }

    /// Rewrite earlier copies of qualifying files that a later entry with the
    /// same path replaced on disk. Yields the matched line count of each copy
    /// that contained the token.
    fn rewrite_shadowed(&self, records: &mut [EntryRecord]) -> Vec<usize> {
        let mut changed = Vec::new();
        for record in records {
            let EntryBody::Shadowed(data) = &mut record.body else {
                continue;
            };
            if !archive_path(&record.path).contains(&self.rules.marker) {
                continue;
            }
            let (output, matched) =
                rewrite_lines(data, &self.pattern, self.rules.to.as_bytes(), self.rules.newline);
            if matched > 0 {
                changed.push(matched);
            }
            *data = output;
        }
        changed
    }
}

/// Slash-separated form of a relative path, matching tar entry names.
fn archive_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
