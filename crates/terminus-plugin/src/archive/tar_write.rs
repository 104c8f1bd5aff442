use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder;

use super::error::{RewriteError, RewriteResult, Stage};
use super::tar_read::{EntryBody, EntryRecord};

pub(crate) fn create_tar<W: Write>(writer: W) -> Builder<GzEncoder<W>> {
    let encoder = GzEncoder::new(writer, Compression::default());
    let mut tar = Builder::new(encoder);
    tar.follow_symlinks(false);
    tar
}

/// Replay the entry manifest into a new gzip tar. Headers are reused so
/// mode, ownership and mtimes survive; regular files take their size and
/// content from the extraction tree.
pub(crate) fn repack(records: &[EntryRecord], tree: &Path) -> RewriteResult<Vec<u8>> {
    const STAGE: Stage = Stage::Repacking;

    let mut tar = create_tar(Vec::new());

    for record in records {
        let mut header = record.header.clone();
        match &record.body {
            EntryBody::OnDisk => {
                let src = tree.join(&record.path);
                let file = File::open(&src).map_err(|e| RewriteError::io(STAGE, &src, e))?;
                let len = file
                    .metadata()
                    .map_err(|e| RewriteError::io(STAGE, &src, e))?
                    .len();
                header.set_size(len);
                tar.append_data(&mut header, &record.path, file)
                    .map_err(|e| RewriteError::io(STAGE, &src, e))?;
            }
            EntryBody::Link(target) => {
                tar.append_link(&mut header, &record.path, target)
                    .map_err(|e| RewriteError::io(STAGE, &record.path, e))?;
            }
            EntryBody::Shadowed(data) | EntryBody::Inline(data) => {
                header.set_size(data.len() as u64);
                tar.append_data(&mut header, &record.path, data.as_slice())
                    .map_err(|e| RewriteError::io(STAGE, &record.path, e))?;
            }
        }
    }

    finish(tar).map_err(|e| RewriteError::io(STAGE, tree, e))
}

fn finish(tar: Builder<GzEncoder<Vec<u8>>>) -> io::Result<Vec<u8>> {
    tar.into_inner()?.finish()
}
