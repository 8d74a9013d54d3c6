use super::{FileHeader, FileType};
use crate::codec::RecordSchema;
use crate::getter::{get_records, get_records_in_bin};
use crate::index::{IntervalSearchTree, NodeId, read_nodes};
use crate::source::IntervalRecord;
use crate::types::Range;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Read side of an indexed file: header, one tree per reference, and the
/// handle used for record seeks.
///
/// Trees are immutable once loaded. The handle is owned, so concurrent
/// queries need one `IndexedFile` each or external serialization.
pub struct IndexedFile<R> {
    reader: R,
    header: FileHeader,
    schema: RecordSchema,
    trees: HashMap<String, IntervalSearchTree>,
}

impl IndexedFile<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(format!("{}", path.display())),
            _ => Error::Io(e),
        })?;
        let indexed = Self::from_reader(BufReader::new(file))?;
        tracing::info!(
            "opened {:?}: {} references, {} records",
            path,
            indexed.header.references.len(),
            indexed.trees.values().map(|t| t.record_count() as u64).sum::<u64>()
        );
        Ok(indexed)
    }
}

impl<R: Read + Seek> IndexedFile<R> {
    /// Parse the header and load every reference's node run.
    pub fn from_reader(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let header = FileHeader::read_from(&mut reader)?;
        let schema = header
            .schema()
            .map_err(|e| Error::Corrupt(format!("file declares an unusable schema: {}", e)))?;

        let mut trees = HashMap::with_capacity(header.references.len());
        for reference in &header.references {
            reader.seek(SeekFrom::Start(reference.node_offset))?;
            let tree = read_nodes(&mut reader, header.arity, header.min_bin_size)?;
            tracing::debug!(
                "loaded {} bins for reference {}",
                tree.len(),
                reference.name
            );
            if trees.insert(reference.name.clone(), tree).is_some() {
                return Err(Error::Corrupt(format!(
                    "reference {} appears twice",
                    reference.name
                )));
            }
        }

        Ok(Self {
            reader,
            header,
            schema,
            trees,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn file_type(&self) -> FileType {
        self.header.file_type
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Reference names in file order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.header.references.iter().map(|r| r.name.as_str())
    }

    pub fn tree(&self, reference: &str) -> Option<&IntervalSearchTree> {
        self.trees.get(reference)
    }

    /// Records on `reference` intersecting `range`. A reference absent from
    /// the file has no data, which is not an error.
    pub fn query(&mut self, reference: &str, range: Range) -> Result<Vec<IntervalRecord>> {
        let Some(tree) = self.trees.get(reference) else {
            tracing::debug!("reference {} not in file, returning no records", reference);
            return Ok(Vec::new());
        };
        get_records(&mut self.reader, tree, range, &self.schema)
    }

    /// Every record stored directly in one bin.
    pub fn bin_records(&mut self, reference: &str, bin: NodeId) -> Result<Vec<IntervalRecord>> {
        let tree = self
            .trees
            .get(reference)
            .ok_or_else(|| Error::NotFound(format!("reference {}", reference)))?;
        get_records_in_bin(&mut self.reader, tree, bin, &self.schema)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = IndexedFile::open(dir.path().join("absent.gbx"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_open_other_failures_stay_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.gbx");
        std::fs::write(&plain, b"x").unwrap();
        // a regular file used as a directory fails with ENOTDIR
        let result = IndexedFile::open(plain.join("nested.gbx"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
