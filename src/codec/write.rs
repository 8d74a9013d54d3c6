use super::{FieldType, FieldValue, MAX_STRING_LENGTH};
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Encode one record. `values` must line up with the non-ignored entries of
/// `fields`.
pub fn encode_record(fields: &[FieldType], values: &[FieldValue], buf: &mut BytesMut) -> Result<()> {
    let decoded: Vec<FieldType> = fields
        .iter()
        .copied()
        .filter(|f| *f != FieldType::Ignore)
        .collect();
    if decoded.len() != values.len() {
        return Err(Error::InvalidInput(format!(
            "record has {} values but schema expects {}",
            values.len(),
            decoded.len()
        )));
    }

    buf.reserve(encoded_size(fields, values)?);
    for (field, value) in decoded.into_iter().zip(values) {
        match value {
            FieldValue::Integer(v) => buf.put_i32(*v),
            FieldValue::Long(v) => buf.put_i64(*v),
            FieldValue::Float(v) => buf.put_f32(*v),
            FieldValue::Double(v) => buf.put_f64(*v),
            FieldValue::Char(c) => buf.put_u8(latin1(*c)?),
            FieldValue::Boolean(v) => buf.put_u8(u8::from(*v)),
            FieldValue::Color(color) => {
                buf.put_u8(color.r);
                buf.put_u8(color.g);
                buf.put_u8(color.b);
            }
            FieldValue::Range(range) => {
                buf.put_i32(range.from);
                buf.put_i32(range.to);
            }
            FieldValue::String(s) => {
                buf.put_i32(checked_len(s.chars().count(), "string")?);
                for c in s.chars() {
                    buf.put_u8(latin1(c)?);
                }
            }
            FieldValue::Blocks(blocks) => {
                buf.put_i32(checked_len(blocks.len(), "block list")?);
                for block in blocks {
                    buf.put_i32(block.position);
                    buf.put_i32(block.size);
                }
            }
        }
        debug_assert_eq!(field, value.field_type());
    }
    Ok(())
}

/// Exact number of bytes [`encode_record`] writes for this record.
pub fn encoded_size(fields: &[FieldType], values: &[FieldValue]) -> Result<usize> {
    let decoded = fields.iter().filter(|f| **f != FieldType::Ignore);
    let mut size = 0;
    for (field, value) in decoded.zip(values) {
        if *field != value.field_type() {
            return Err(Error::InvalidInput(format!(
                "expected {:?} value, got {:?}",
                field,
                value.field_type()
            )));
        }
        size += match (field.fixed_width(), value) {
            (Some(width), _) => width,
            (None, FieldValue::String(s)) => 4 + s.chars().count(),
            (None, FieldValue::Blocks(blocks)) => 4 + 8 * blocks.len(),
            (None, _) => 0,
        };
    }
    Ok(size)
}

fn latin1(c: char) -> Result<u8> {
    u8::try_from(u32::from(c))
        .map_err(|_| Error::InvalidInput(format!("character {:?} is not single-byte", c)))
}

fn checked_len(len: usize, what: &str) -> Result<i32> {
    match i32::try_from(len) {
        Ok(n) if n <= MAX_STRING_LENGTH => Ok(n),
        _ => Err(Error::InvalidInput(format!(
            "{} of length {} exceeds limit {}",
            what, len, MAX_STRING_LENGTH
        ))),
    }
}
