use super::{FileHeader, FileType, MAX_REFERENCES, ReferenceEntry};
use crate::codec::{FieldValue, RecordSchema, encode_record};
use crate::index::{DEFAULT_ARITY, DEFAULT_MIN_BIN_SIZE, IntervalSearchTree, NODE_RECORD_SIZE, NodeId, write_nodes};
use crate::types::Range;
use crate::{Error, Result};
use bytes::BytesMut;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

struct ReferenceBuilder {
    name: String,
    tree: IntervalSearchTree,
    bins: HashMap<NodeId, BytesMut>,
}

/// Builds an indexed file. Records are binned and encoded as they are
/// pushed; [`write_to`](Self::write_to) lays out the header, node runs and
/// record data with every offset known up front.
pub struct IndexedFileWriter {
    file_type: FileType,
    schema: RecordSchema,
    arity: usize,
    min_bin_size: i64,
    references: Vec<ReferenceBuilder>,
    lookup: HashMap<String, usize>,
}

impl IndexedFileWriter {
    pub fn new(file_type: FileType) -> Result<Self> {
        Ok(Self {
            file_type,
            schema: RecordSchema::new(file_type.fields())?,
            arity: DEFAULT_ARITY,
            min_bin_size: DEFAULT_MIN_BIN_SIZE,
            references: Vec::new(),
            lookup: HashMap::new(),
        })
    }

    /// Set the bin parameters shared by every reference. The header stores a
    /// single pair, so this must be called before any reference is declared.
    pub fn with_bin_parameters(mut self, arity: usize, min_bin_size: i64) -> Result<Self> {
        if !self.references.is_empty() {
            return Err(Error::InvalidInput(
                "bin parameters must be set before references are declared".to_string(),
            ));
        }
        if arity < 2 || min_bin_size < 1 {
            return Err(Error::InvalidInput(format!(
                "invalid bin parameters: arity {}, minimum bin size {}",
                arity, min_bin_size
            )));
        }
        self.arity = arity;
        self.min_bin_size = min_bin_size;
        Ok(self)
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Declare a reference whose root bin covers `range`.
    pub fn add_reference(&mut self, name: &str, range: Range) -> Result<()> {
        if self.references.len() >= MAX_REFERENCES {
            return Err(Error::InvalidInput(format!(
                "a file holds at most {} references",
                MAX_REFERENCES
            )));
        }
        if self.lookup.contains_key(name) {
            return Err(Error::InvalidInput(format!("reference {} declared twice", name)));
        }
        let tree = IntervalSearchTree::new(range, self.arity, self.min_bin_size)?;
        self.lookup.insert(name.to_string(), self.references.len());
        self.references.push(ReferenceBuilder {
            name: name.to_string(),
            tree,
            bins: HashMap::new(),
        });
        Ok(())
    }

    /// Index and encode one record. Returns the bin it was stored in.
    pub fn push(&mut self, reference: &str, values: &[FieldValue]) -> Result<NodeId> {
        let index = *self
            .lookup
            .get(reference)
            .ok_or_else(|| Error::InvalidInput(format!("reference {} was not declared", reference)))?;
        let interval = self.schema.interval_of(values)?;

        let mut encoded = BytesMut::new();
        encode_record(self.schema.fields(), values, &mut encoded)?;

        let builder = &mut self.references[index];
        let bin = builder.tree.insert(interval)?;
        builder.bins.entry(bin).or_default().extend_from_slice(&encoded);
        Ok(bin)
    }

    pub fn record_count(&self) -> u64 {
        self.references
            .iter()
            .map(|r| u64::from(r.tree.record_count()))
            .sum()
    }

    /// Write the whole file. Returns the number of bytes written.
    pub fn write_to<W: Write>(mut self, writer: &mut W) -> Result<u64> {
        let mut header = FileHeader {
            file_type: self.file_type,
            fields: self.schema.fields().to_vec(),
            arity: self.arity,
            min_bin_size: self.min_bin_size,
            references: self
                .references
                .iter()
                .map(|r| ReferenceEntry {
                    name: r.name.clone(),
                    node_offset: 0,
                    node_length: ((r.tree.len() + 1) * NODE_RECORD_SIZE) as u64,
                })
                .collect(),
        };

        let mut cursor = header.encoded_len()? as u64;
        for entry in &mut header.references {
            entry.node_offset = cursor;
            cursor += entry.node_length;
        }

        // Data follows the node runs: assign each bin its absolute start.
        for reference in &mut self.references {
            for id in 0..reference.tree.capacity() {
                let len = reference.bins.get(&id).map_or(0, |b| b.len() as u64);
                if let Some(node) = reference.tree.node_mut(id) {
                    node.start_byte = cursor;
                    cursor += len;
                }
            }
        }

        let mut buf = BytesMut::new();
        header.encode(&mut buf)?;
        writer.write_all(&buf)?;
        for reference in &self.references {
            write_nodes(&reference.tree, writer)?;
        }
        for reference in &self.references {
            for id in 0..reference.tree.capacity() {
                if let Some(bytes) = reference.bins.get(&id) {
                    writer.write_all(bytes)?;
                }
            }
        }

        tracing::debug!(
            "wrote {} references, {} bytes",
            self.references.len(),
            cursor
        );
        Ok(cursor)
    }

    /// Write the file to `path`, replacing anything there.
    pub fn finish(self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        let written = self.write_to(&mut writer)?;
        writer.flush()?;
        tracing::info!("wrote indexed file {:?} ({} bytes)", path, written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::IndexedFile;
    use std::io::Cursor;

    fn generic(from: i32, to: i32, name: &str) -> Vec<FieldValue> {
        vec![
            FieldValue::Range(Range::new(from, to)),
            FieldValue::String(name.to_string()),
        ]
    }

    fn sample_file() -> Vec<u8> {
        let mut writer = IndexedFileWriter::new(FileType::IntervalGeneric)
            .unwrap()
            .with_bin_parameters(2, 1_000)
            .unwrap();
        writer.add_reference("chr1", Range::new(0, 10_000)).unwrap();
        writer.add_reference("chr2", Range::new(1, 500)).unwrap();
        writer.push("chr1", &generic(100, 200, "a")).unwrap();
        writer.push("chr1", &generic(150, 160, "b")).unwrap();
        writer.push("chr1", &generic(5_000, 5_100, "c")).unwrap();
        writer.push("chr2", &generic(10, 20, "d")).unwrap();
        assert_eq!(writer.record_count(), 4);

        let mut out = Vec::new();
        let written = writer.write_to(&mut out).unwrap();
        assert_eq!(written, out.len() as u64);
        out
    }

    fn names(records: &[crate::source::IntervalRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| match &r.values[1] {
                FieldValue::String(s) => s.clone(),
                other => panic!("unexpected value {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_write_then_query() {
        let mut file = IndexedFile::from_reader(Cursor::new(sample_file())).unwrap();
        assert_eq!(file.file_type(), FileType::IntervalGeneric);
        assert_eq!(file.references().collect::<Vec<_>>(), vec!["chr1", "chr2"]);

        let records = file.query("chr1", Range::new(140, 170)).unwrap();
        assert_eq!(names(&records), vec!["a", "b"]);

        let records = file.query("chr1", Range::new(1, 10_000)).unwrap();
        assert_eq!(names(&records), vec!["a", "b", "c"]);

        let records = file.query("chr2", Range::new(15, 15)).unwrap();
        assert_eq!(names(&records), vec!["d"]);
    }

    #[test]
    fn test_missing_reference_is_empty() {
        let mut file = IndexedFile::from_reader(Cursor::new(sample_file())).unwrap();
        assert!(file.query("chrUn", Range::new(1, 100)).unwrap().is_empty());
        assert!(file.tree("chrUn").is_none());
    }

    #[test]
    fn test_loaded_trees_match_written_counts() {
        let file = IndexedFile::from_reader(Cursor::new(sample_file())).unwrap();
        let chr1 = file.tree("chr1").unwrap();
        assert_eq!(chr1.record_count(), 3);
        assert_eq!(chr1.root().range, Range::new(0, 10_000));
        assert_eq!(chr1.arity(), 2);
        assert_eq!(file.tree("chr2").unwrap().record_count(), 1);
    }

    #[test]
    fn test_bin_records() {
        let mut file = IndexedFile::from_reader(Cursor::new(sample_file())).unwrap();
        let bin = file.tree("chr1").unwrap().find_bin(Range::new(100, 200)).unwrap();
        let records = file.bin_records("chr1", bin).unwrap();
        assert_eq!(names(&records), vec!["a", "b"]);
        assert!(file.bin_records("chrUn", 0).is_err());
    }

    #[test]
    fn test_truncated_data_section_fails_query() {
        let mut data = sample_file();
        data.truncate(data.len() - 3);
        let mut file = IndexedFile::from_reader(Cursor::new(data)).unwrap();
        // chr2's bin is last in the file
        let result = file.query("chr2", Range::new(1, 500));
        assert!(matches!(result, Err(Error::Truncated(_))));
    }

    #[test]
    fn test_push_rejects_undeclared_reference_and_outside_interval() {
        let mut writer = IndexedFileWriter::new(FileType::IntervalGeneric).unwrap();
        writer.add_reference("chr1", Range::new(1, 1_000)).unwrap();
        assert!(writer.push("chr9", &generic(1, 2, "x")).is_err());
        assert!(matches!(
            writer.push("chr1", &generic(900, 1_200, "x")),
            Err(Error::InvalidRange(_))
        ));
        assert!(writer.add_reference("chr1", Range::new(1, 5)).is_err());
        assert_eq!(writer.record_count(), 0);
    }

    #[test]
    fn test_finish_writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.gbx");
        let mut writer = IndexedFileWriter::new(FileType::IntervalGeneric).unwrap();
        writer.add_reference("chr1", Range::new(1, 50_000)).unwrap();
        writer.push("chr1", &generic(20_000, 20_010, "x")).unwrap();
        let written = writer.finish(&path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), written);

        let mut file = IndexedFile::open(&path).unwrap();
        assert_eq!(file.query("chr1", Range::new(20_005, 20_005)).unwrap().len(), 1);
    }

    #[test]
    fn test_more_references_than_a_string_bound_round_trip() {
        let mut writer = IndexedFileWriter::new(FileType::IntervalGeneric).unwrap();
        for i in 0..10_001 {
            writer
                .add_reference(&format!("contig_{}", i), Range::new(1, 500))
                .unwrap();
        }
        writer.push("contig_10000", &generic(10, 20, "tail")).unwrap();

        let mut out = Vec::new();
        writer.write_to(&mut out).unwrap();
        let mut file = IndexedFile::from_reader(Cursor::new(out)).unwrap();
        assert_eq!(file.references().count(), 10_001);
        let records = file.query("contig_10000", Range::new(1, 500)).unwrap();
        assert_eq!(names(&records), vec!["tail"]);
    }

    #[test]
    fn test_bin_parameters_must_precede_references() {
        let mut writer = IndexedFileWriter::new(FileType::IntervalGeneric).unwrap();
        writer.add_reference("chr1", Range::new(1, 1_000)).unwrap();
        assert!(matches!(
            writer.with_bin_parameters(3, 100),
            Err(Error::InvalidInput(_))
        ));

        let writer = IndexedFileWriter::new(FileType::IntervalGeneric).unwrap();
        assert!(writer.with_bin_parameters(1, 100).is_err());
    }
}
