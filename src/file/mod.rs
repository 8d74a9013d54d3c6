//! Container format for bin-indexed record files.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ magic, version, file type    │
//! │ field type codes             │
//! │ arity, minimum bin size      │
//! │ reference map                │ name -> node run offset, length
//! ├──────────────────────────────┤
//! │ node run, reference 0        │ 32-byte node records, id -1 ends a run
//! │ node run, reference 1 ...    │
//! ├──────────────────────────────┤
//! │ records, grouped by bin      │ each bin's start byte is absolute
//! └──────────────────────────────┘
//! ```
//!
//! All integers are big-endian.

mod reader;
mod writer;

pub use reader::IndexedFile;
pub use writer::IndexedFileWriter;

use crate::codec::{FieldType, FieldValue, RecordSchema, decode_record, encode_record};
use crate::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use std::io::{ErrorKind, Read};

pub const MAGIC: u32 = 0xEFFE_EFFE;
pub const VERSION: i32 = 1;

/// Upper bound on the number of references in one file. Draft assemblies can
/// carry hundreds of thousands of contigs.
pub const MAX_REFERENCES: usize = 1 << 22;

/// Conventional extension for indexed files.
pub const FILE_EXTENSION: &str = "gbx";

/// Record layout a file declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Interval and name
    IntervalGeneric,
    /// BED-style features: interval, name, score, strand, thick range, color, blocks
    IntervalBed,
}

impl FileType {
    pub fn code(self) -> i32 {
        match self {
            FileType::IntervalGeneric => 0,
            FileType::IntervalBed => 1,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(FileType::IntervalGeneric),
            1 => Ok(FileType::IntervalBed),
            other => Err(Error::Corrupt(format!("unknown file type code {}", other))),
        }
    }

    pub fn fields(self) -> Vec<FieldType> {
        match self {
            FileType::IntervalGeneric => vec![FieldType::Range, FieldType::String],
            FileType::IntervalBed => vec![
                FieldType::Range,
                FieldType::String,
                FieldType::Float,
                FieldType::Char,
                FieldType::Integer,
                FieldType::Integer,
                FieldType::Color,
                FieldType::Blocks,
            ],
        }
    }
}

/// Where a reference's node run sits in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub name: String,
    pub node_offset: u64,
    pub node_length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub file_type: FileType,
    pub fields: Vec<FieldType>,
    pub arity: usize,
    pub min_bin_size: i64,
    pub references: Vec<ReferenceEntry>,
}

impl FileHeader {
    pub fn schema(&self) -> Result<RecordSchema> {
        RecordSchema::new(self.fields.clone())
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let count = |n: usize, what: &str| {
            i32::try_from(n).map_err(|_| Error::InvalidInput(format!("too many {}", what)))
        };

        buf.put_u32(MAGIC);
        buf.put_i32(VERSION);
        buf.put_i32(self.file_type.code());
        buf.put_i32(count(self.fields.len(), "fields")?);
        for field in &self.fields {
            buf.put_i32(field.code());
        }
        buf.put_i32(count(self.arity, "children per bin")?);
        buf.put_i32(i32::try_from(self.min_bin_size).map_err(|_| {
            Error::InvalidInput(format!("minimum bin size {} too large", self.min_bin_size))
        })?);
        buf.put_i32(count(self.references.len(), "references")?);
        for reference in &self.references {
            encode_record(
                &[FieldType::String],
                &[FieldValue::String(reference.name.clone())],
                buf,
            )?;
            buf.put_i64(offset_to_i64(reference.node_offset)?);
            buf.put_i64(offset_to_i64(reference.node_length)?);
        }
        Ok(())
    }

    /// Encoded size; independent of the offset values.
    pub fn encoded_len(&self) -> Result<usize> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.len())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = read_u32(reader)?;
        if magic != MAGIC {
            return Err(Error::Corrupt(format!("bad magic number {:#010x}", magic)));
        }
        let version = read_i32(reader)?;
        if version != VERSION {
            return Err(Error::Corrupt(format!("unsupported file version {}", version)));
        }
        let file_type = FileType::from_code(read_i32(reader)?)?;

        let field_count = read_count(reader, "field count", crate::codec::MAX_STRING_LENGTH as usize)?;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(FieldType::from_code(read_i32(reader)?)?);
        }

        let arity = read_i32(reader)?;
        let min_bin_size = read_i32(reader)?;
        if arity < 2 || min_bin_size < 1 {
            return Err(Error::Corrupt(format!(
                "invalid bin parameters: arity {}, minimum bin size {}",
                arity, min_bin_size
            )));
        }

        let reference_count = read_count(reader, "reference count", MAX_REFERENCES)?;
        let mut references = Vec::with_capacity(reference_count.min(1024));
        for _ in 0..reference_count {
            let name = match decode_record(reader, &[FieldType::String])? {
                Some(mut values) => match values.pop() {
                    Some(FieldValue::String(name)) => name,
                    _ => return Err(Error::Corrupt("reference name is not a string".to_string())),
                },
                None => return Err(Error::Truncated("reference map ended early".to_string())),
            };
            let node_offset = read_offset(reader)?;
            let node_length = read_offset(reader)?;
            references.push(ReferenceEntry {
                name,
                node_offset,
                node_length,
            });
        }

        Ok(Self {
            file_type,
            fields,
            arity: arity as usize,
            min_bin_size: i64::from(min_bin_size),
            references,
        })
    }
}

fn offset_to_i64(offset: u64) -> Result<i64> {
    i64::try_from(offset).map_err(|_| Error::InvalidInput(format!("offset {} too large", offset)))
}

fn read_exact<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::Truncated("file header ended early".to_string()),
        _ => Error::Io(e),
    })?;
    Ok(buf)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    Ok((&read_exact::<R, 4>(reader)?[..]).get_u32())
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    Ok((&read_exact::<R, 4>(reader)?[..]).get_i32())
}

fn read_offset<R: Read>(reader: &mut R) -> Result<u64> {
    let value = (&read_exact::<R, 8>(reader)?[..]).get_i64();
    u64::try_from(value).map_err(|_| Error::Corrupt(format!("negative offset {}", value)))
}

fn read_count<R: Read>(reader: &mut R, what: &str, limit: usize) -> Result<usize> {
    let value = read_i32(reader)?;
    match usize::try_from(value) {
        Ok(n) if n <= limit => Ok(n),
        _ => Err(Error::Corrupt(format!("implausible {} {}", what, value))),
    }
}
