//! Directory-backed registry of indexed files.
//!
//! A file id maps to `<data_dir>/<id>.gbx`. Each file is opened once and kept
//! behind its own [`RangeCache`], so repeated queries against the same file
//! only read the parts of the index they have not seen. Open files are held in
//! a bounded `moka` cache; evicting one drops its handle and cached records.

use crate::cache::RangeCache;
use crate::file::FILE_EXTENSION;
use crate::source::{IndexedFileSource, IntervalRecord};
use crate::types::{FileInfo, Range, ReferenceInfo, Resolution};
use crate::{Error, Result};
use moka::sync::Cache;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

pub type SharedCache = Arc<Mutex<RangeCache<IndexedFileSource>>>;

pub struct Catalog {
    data_dir: PathBuf,
    open: Cache<String, SharedCache>,
}

impl Catalog {
    pub fn new(data_dir: PathBuf, max_open_files: u64) -> Self {
        Self {
            data_dir,
            open: Cache::builder().max_capacity(max_open_files).build(),
        }
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    fn make_file_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(Error::InvalidInput(format!("invalid file id {:?}", id)));
        }
        Ok(self.data_dir.join(format!("{}.{}", id, FILE_EXTENSION)))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.make_file_path(id).map(|p| p.is_file()).unwrap_or(false)
    }

    /// The cache for `id`, opening the file on first use.
    pub fn open(&self, id: &str) -> Result<SharedCache> {
        let path = self.make_file_path(id)?;
        if !path.is_file() {
            return Err(Error::NotFound(id.to_string()));
        }

        self.open
            .try_get_with(id.to_string(), || {
                tracing::debug!("opening {} from {:?}", id, path);
                let source = IndexedFileSource::open(&path)?;
                Ok::<_, Error>(Arc::new(Mutex::new(RangeCache::new(source))))
            })
            .map_err(unshare)
    }

    /// Records overlapping `range` on `reference`, served through the file's
    /// range cache.
    pub fn get_records(
        &self,
        id: &str,
        reference: &str,
        range: Range,
        resolution: Resolution,
    ) -> Result<Vec<IntervalRecord>> {
        let cache = self.open(id)?;
        let mut cache = cache.lock();
        cache.get_records(reference, range, resolution)
    }

    pub fn file_info(&self, id: &str) -> Result<FileInfo> {
        let path = self.make_file_path(id)?;
        let metadata = std::fs::metadata(&path).map_err(|_| Error::NotFound(id.to_string()))?;

        let cache = self.open(id)?;
        let cache = cache.lock();
        let file = cache.source().file();
        let references = file
            .references()
            .filter_map(|name| {
                file.tree(name).map(|tree| ReferenceInfo {
                    name: name.to_string(),
                    range: tree.root().range,
                    record_count: tree.record_count(),
                    bin_count: tree.len(),
                })
            })
            .collect();

        Ok(FileInfo {
            id: id.to_string(),
            file_type: file.file_type(),
            fields: file.schema().fields().to_vec(),
            size: metadata.len(),
            references,
        })
    }

    /// Drop the open handle for `id`, e.g. after the file was rewritten.
    pub fn evict(&self, id: &str) {
        self.open.invalidate(id);
    }
}

/// Initialisation errors are shared between all callers waiting on the same
/// key; rebuild an owned error that keeps the variant's HTTP meaning.
fn unshare(error: Arc<Error>) -> Error {
    match error.as_ref() {
        Error::NotFound(m) => Error::NotFound(m.clone()),
        Error::InvalidInput(m) => Error::InvalidInput(m.clone()),
        Error::Corrupt(m) => Error::Corrupt(m.clone()),
        Error::Truncated(m) => Error::Truncated(m.clone()),
        other => Error::Internal(other.to_string()),
    }
}
