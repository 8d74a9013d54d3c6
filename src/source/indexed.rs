use super::{DataSource, IntervalRecord};
use crate::file::IndexedFile;
use crate::types::{Range, Resolution};
use crate::Result;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// Data source backed by an indexed file. Holds its own file handle.
///
/// An indexed file stores a single resolution, so every resolution is served
/// from the same records.
pub struct IndexedFileSource<R = BufReader<File>> {
    file: IndexedFile<R>,
}

impl IndexedFileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: IndexedFile::open(path)?,
        })
    }
}

impl<R: Read + Seek> IndexedFileSource<R> {
    pub fn new(file: IndexedFile<R>) -> Self {
        Self { file }
    }

    pub fn file(&self) -> &IndexedFile<R> {
        &self.file
    }
}

impl<R: Read + Seek> DataSource for IndexedFileSource<R> {
    type Record = IntervalRecord;

    fn fetch(
        &mut self,
        reference: &str,
        range: Range,
        resolution: Resolution,
    ) -> Result<Vec<IntervalRecord>> {
        tracing::trace!("fetching {}:{} at {:?}", reference, range, resolution);
        self.file.query(reference, range)
    }

    fn references(&self) -> Vec<String> {
        self.file.references().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FieldValue;
    use crate::file::{FileType, IndexedFileWriter};
    use std::io::Cursor;

    #[test]
    fn test_fetch_reads_through_index() {
        let mut writer = IndexedFileWriter::new(FileType::IntervalGeneric).unwrap();
        writer.add_reference("chr3", Range::new(1, 100_000)).unwrap();
        for start in [10, 20_000, 40_000] {
            writer
                .push(
                    "chr3",
                    &[
                        FieldValue::Range(Range::new(start, start + 99)),
                        FieldValue::String(format!("f{}", start)),
                    ],
                )
                .unwrap();
        }
        let mut bytes = Vec::new();
        writer.write_to(&mut bytes).unwrap();

        let file = IndexedFile::from_reader(Cursor::new(bytes)).unwrap();
        let mut source = IndexedFileSource::new(file);
        assert_eq!(source.references(), vec!["chr3".to_string()]);

        let records = source
            .fetch("chr3", Range::new(15_000, 45_000), Resolution::Low)
            .unwrap();
        let starts: Vec<i32> = records.iter().map(|r| r.interval.from).collect();
        assert_eq!(starts, vec![20_000, 40_000]);

        assert!(source
            .fetch("chr4", Range::new(1, 10), Resolution::Low)
            .unwrap()
            .is_empty());
    }
}
