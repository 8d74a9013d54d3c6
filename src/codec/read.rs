use super::{Block, Color, FieldType, FieldValue, MAX_STRING_LENGTH};
use crate::types::Range;
use crate::{Error, Result};
use std::io::{ErrorKind, Read};

/// Tracks how many bytes of the current record have been consumed, so that
/// end-of-stream can be told apart at a record boundary and mid-record.
struct FieldReader<'a, R> {
    inner: &'a mut R,
    consumed: usize,
}

impl<R: Read> FieldReader<'_, R> {
    /// Fill `buf` completely. `Ok(false)` means the stream was already
    /// exhausted before this record started.
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.consumed += filled;

        if filled == buf.len() {
            Ok(true)
        } else if self.consumed == 0 {
            Ok(false)
        } else {
            Err(Error::Truncated(format!(
                "stream ended {} bytes into a record",
                self.consumed
            )))
        }
    }

    fn array<const N: usize>(&mut self) -> Result<Option<[u8; N]>> {
        let mut buf = [0u8; N];
        Ok(self.fill(&mut buf)?.then_some(buf))
    }
}

/// Decode one record laid out according to `fields`.
///
/// Returns `Ok(None)` if the stream ends cleanly before the record's first
/// byte. A stream that ends anywhere inside the record is
/// [`Error::Truncated`].
pub fn decode_record<R: Read>(reader: &mut R, fields: &[FieldType]) -> Result<Option<Vec<FieldValue>>> {
    let mut reader = FieldReader {
        inner: reader,
        consumed: 0,
    };
    let mut values = Vec::with_capacity(fields.len());

    for field in fields {
        if *field == FieldType::Ignore {
            continue;
        }
        match decode_value(&mut reader, *field)? {
            Some(value) => values.push(value),
            None => return Ok(None),
        }
    }

    if reader.consumed == 0 {
        return Ok(None);
    }
    Ok(Some(values))
}

fn decode_value<R: Read>(r: &mut FieldReader<'_, R>, field: FieldType) -> Result<Option<FieldValue>> {
    macro_rules! next {
        ($n:literal) => {
            match r.array::<$n>()? {
                Some(bytes) => bytes,
                None => return Ok(None),
            }
        };
    }

    let value = match field {
        FieldType::Integer => FieldValue::Integer(i32::from_be_bytes(next!(4))),
        FieldType::Long => FieldValue::Long(i64::from_be_bytes(next!(8))),
        FieldType::Float => FieldValue::Float(f32::from_be_bytes(next!(4))),
        FieldType::Double => FieldValue::Double(f64::from_be_bytes(next!(8))),
        FieldType::Char => FieldValue::Char(char::from(next!(1)[0])),
        FieldType::Boolean => FieldValue::Boolean(next!(1)[0] != 0),
        FieldType::Color => {
            let [red, green, blue] = next!(3);
            FieldValue::Color(Color {
                r: red,
                g: green,
                b: blue,
            })
        }
        FieldType::Range => {
            let from = i32::from_be_bytes(next!(4));
            let to = i32::from_be_bytes(next!(4));
            FieldValue::Range(Range::new(from, to))
        }
        FieldType::String => {
            let len = checked_len(i32::from_be_bytes(next!(4)), "string length")?;
            let mut bytes = vec![0u8; len];
            if !r.fill(&mut bytes)? {
                return Ok(None);
            }
            FieldValue::String(bytes.into_iter().map(char::from).collect())
        }
        FieldType::Blocks => {
            let count = checked_len(i32::from_be_bytes(next!(4)), "block count")?;
            let mut blocks = Vec::with_capacity(count);
            for _ in 0..count {
                let position = i32::from_be_bytes(next!(4));
                let size = i32::from_be_bytes(next!(4));
                blocks.push(Block { position, size });
            }
            FieldValue::Blocks(blocks)
        }
        FieldType::Ignore => unreachable!("ignored fields are skipped by the caller"),
    };
    Ok(Some(value))
}

fn checked_len(len: i32, what: &str) -> Result<usize> {
    if !(0..=MAX_STRING_LENGTH).contains(&len) {
        return Err(Error::Corrupt(format!(
            "implausible {} {} (limit {})",
            what, len, MAX_STRING_LENGTH
        )));
    }
    Ok(len as usize)
}
