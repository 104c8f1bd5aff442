use std::cell::Cell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use flate2::read::MultiGzDecoder;
use tar::{EntryType, Header};

use super::error::{RewriteError, RewriteResult, Stage};

/// Many systems can deliver spurious interrupts during `read()`.
/// Retry only `Interrupted` for a bounded number of attempts.
const EINTR_RETRY_LIMIT: usize = 16;

/// Reader over the decompressed stream that remembers whether the decode
/// side failed, so extraction errors can be split into "bad archive" and
/// "bad workspace".
pub(crate) struct DecodeReader<R> {
    inner: R,
    failed: Rc<Cell<bool>>,
}

impl<R: Read> DecodeReader<R> {
    pub(crate) fn new(inner: R, failed: Rc<Cell<bool>>) -> Self {
        Self { inner, failed }
    }
}

impl<R: Read> Read for DecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut retries = 0;
        loop {
            match self.inner.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    retries += 1;
                    if retries >= EINTR_RETRY_LIMIT {
                        self.failed.set(true);
                        return Err(io::Error::new(
                            io::ErrorKind::Interrupted,
                            format!(
                                "persistent EINTR: interrupted {} consecutive times",
                                EINTR_RETRY_LIMIT
                            ),
                        ));
                    }
                }
                Err(e) => {
                    self.failed.set(true);
                    return Err(e);
                }
                ok => return ok,
            }
        }
    }
}

/// How an entry's payload is carried from extraction to repacking.
#[derive(Debug)]
pub(crate) enum EntryBody {
    /// Regular file; the current content lives in the extraction tree.
    OnDisk,
    /// Regular file whose path a later entry reused. Its own bytes are
    /// held here because the tree only keeps the last copy.
    Shadowed(Vec<u8>),
    /// Symlink or hard link target.
    Link(PathBuf),
    /// Payload kept in memory (pax global headers and other special entries).
    Inline(Vec<u8>),
}

/// One archive member as observed during extraction.
#[derive(Debug)]
pub(crate) struct EntryRecord {
    pub(crate) header: Header,
    pub(crate) path: PathBuf,
    pub(crate) body: EntryBody,
}

impl EntryRecord {
    pub(crate) fn is_file(&self) -> bool {
        matches!(self.body, EntryBody::OnDisk | EntryBody::Shadowed(_))
    }
}

/// Unpack a gzip tar from `archive_path` under `tree`, returning the entry
/// manifest in archive order.
pub(crate) fn extract(archive_path: &Path, tree: &Path) -> RewriteResult<Vec<EntryRecord>> {
    const STAGE: Stage = Stage::Extracting;

    let file = File::open(archive_path).map_err(|e| RewriteError::io(STAGE, archive_path, e))?;
    let failed = Rc::new(Cell::new(false));
    let reader = DecodeReader::new(MultiGzDecoder::new(file), Rc::clone(&failed));
    let mut archive = tar::Archive::new(reader);

    let mut records: Vec<EntryRecord> = Vec::new();
    let mut on_disk: HashMap<PathBuf, usize> = HashMap::new();
    let entries = archive
        .entries()
        .map_err(|e| RewriteError::malformed(STAGE, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| RewriteError::malformed(STAGE, e))?;
        let path = entry
            .path()
            .map_err(|e| RewriteError::malformed(STAGE, e))?
            .into_owned();
        ensure_contained(&path)?;

        let header = entry.header().clone();
        let entry_type = header.entry_type();
        let dest = tree.join(&path);

        let body = if entry_type.is_dir() {
            fs::create_dir_all(&dest).map_err(|e| RewriteError::io(STAGE, &dest, e))?;
            EntryBody::Inline(Vec::new())
        } else if entry_type.is_file() || entry_type == EntryType::Continuous {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| RewriteError::io(STAGE, parent, e))?;
            }
            if let Some(&earlier) = on_disk.get(&dest) {
                let data = fs::read(&dest).map_err(|e| RewriteError::io(STAGE, &dest, e))?;
                records[earlier].body = EntryBody::Shadowed(data);
            }
            let mut out = File::create(&dest).map_err(|e| RewriteError::io(STAGE, &dest, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| classify(&failed, &dest, e))?;
            on_disk.insert(dest.clone(), records.len());
            EntryBody::OnDisk
        } else if entry_type.is_symlink() || entry_type.is_hard_link() {
            let target = entry
                .link_name()
                .map_err(|e| RewriteError::malformed(STAGE, e))?
                .ok_or_else(|| {
                    RewriteError::malformed_msg(
                        STAGE,
                        format!("link entry without target: {}", path.display()),
                    )
                })?
                .into_owned();
            EntryBody::Link(target)
        } else {
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| RewriteError::malformed(STAGE, e))?;
            EntryBody::Inline(data)
        };

        records.push(EntryRecord { header, path, body });
    }

    Ok(records)
}

/// Decode failures mean the archive is bad; anything else is the workspace.
fn classify(failed: &Cell<bool>, dest: &Path, err: io::Error) -> RewriteError {
    if failed.get() {
        RewriteError::malformed(Stage::Extracting, err)
    } else {
        RewriteError::io(Stage::Extracting, dest, err)
    }
}

/// Reject entry paths that would land outside the extraction root.
fn ensure_contained(path: &Path) -> RewriteResult<()> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(RewriteError::malformed_msg(
                    Stage::Extracting,
                    format!("entry path escapes archive root: {}", path.display()),
                ));
            }
        }
    }
    Ok(())
}
