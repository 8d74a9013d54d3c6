//! Schema-driven binary record codec.
//!
//! A record is an ordered list of typed fields. The field list comes from the
//! file header; every value is written big-endian with a fixed width, except
//! strings and block lists which carry an `i32` length or count prefix.
//!
//! # Field types
//!
//! | Type      | Code | Encoding                                  |
//! |-----------|------|-------------------------------------------|
//! | Integer   | 0    | 4 bytes                                   |
//! | Long      | 1    | 8 bytes                                   |
//! | Float     | 2    | 4 bytes                                   |
//! | Double    | 3    | 8 bytes                                   |
//! | Char      | 4    | 1 byte (Latin-1)                          |
//! | Boolean   | 5    | 1 byte                                    |
//! | Color     | 6    | 3 bytes, r g b                            |
//! | String    | 7    | `i32` length + single-byte chars          |
//! | Blocks    | 8    | `i32` count + (`i32` start, `i32` size)*  |
//! | Range     | 9    | `i32` from + `i32` to                     |
//! | Ignore    | 10   | nothing, and no decoded value             |

mod read;
mod write;

pub use read::decode_record;
pub use write::{encode_record, encoded_size};

use crate::types::Range;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Upper bound on string lengths and block counts. Anything larger means the
/// reader is out of step with the data.
pub const MAX_STRING_LENGTH: i32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Long,
    Float,
    Double,
    Char,
    Boolean,
    Color,
    String,
    Blocks,
    Range,
    Ignore,
}

impl FieldType {
    pub fn code(self) -> i32 {
        match self {
            FieldType::Integer => 0,
            FieldType::Long => 1,
            FieldType::Float => 2,
            FieldType::Double => 3,
            FieldType::Char => 4,
            FieldType::Boolean => 5,
            FieldType::Color => 6,
            FieldType::String => 7,
            FieldType::Blocks => 8,
            FieldType::Range => 9,
            FieldType::Ignore => 10,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        Ok(match code {
            0 => FieldType::Integer,
            1 => FieldType::Long,
            2 => FieldType::Float,
            3 => FieldType::Double,
            4 => FieldType::Char,
            5 => FieldType::Boolean,
            6 => FieldType::Color,
            7 => FieldType::String,
            8 => FieldType::Blocks,
            9 => FieldType::Range,
            10 => FieldType::Ignore,
            other => return Err(Error::Corrupt(format!("unknown field type code {}", other))),
        })
    }

    /// Encoded width for fixed-size types, `None` for length-prefixed ones.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            FieldType::Integer | FieldType::Float => Some(4),
            FieldType::Long | FieldType::Double | FieldType::Range => Some(8),
            FieldType::Char | FieldType::Boolean => Some(1),
            FieldType::Color => Some(3),
            FieldType::Ignore => Some(0),
            FieldType::String | FieldType::Blocks => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Sub-feature of an interval (e.g. an exon), start relative to the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub position: i32,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Boolean(bool),
    Color(Color),
    String(String),
    Blocks(Vec<Block>),
    Range(Range),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Integer(_) => FieldType::Integer,
            FieldValue::Long(_) => FieldType::Long,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Double(_) => FieldType::Double,
            FieldValue::Char(_) => FieldType::Char,
            FieldValue::Boolean(_) => FieldType::Boolean,
            FieldValue::Color(_) => FieldType::Color,
            FieldValue::String(_) => FieldType::String,
            FieldValue::Blocks(_) => FieldType::Blocks,
            FieldValue::Range(_) => FieldType::Range,
        }
    }
}

/// Field list of a file plus the position of its interval among decoded values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    fields: Vec<FieldType>,
    range_index: usize,
}

impl RecordSchema {
    /// The field list must contain exactly one `Range` field.
    pub fn new(fields: Vec<FieldType>) -> Result<Self> {
        let mut range_index = None;
        let decoded = fields.iter().filter(|f| **f != FieldType::Ignore);
        for (i, field) in decoded.enumerate() {
            if *field == FieldType::Range {
                if range_index.is_some() {
                    return Err(Error::InvalidInput(
                        "record schema has more than one range field".to_string(),
                    ));
                }
                range_index = Some(i);
            }
        }
        let range_index = range_index.ok_or_else(|| {
            Error::InvalidInput("record schema has no range field".to_string())
        })?;
        Ok(Self {
            fields,
            range_index,
        })
    }

    pub fn fields(&self) -> &[FieldType] {
        &self.fields
    }

    /// Number of values a decoded record carries.
    pub fn value_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| **f != FieldType::Ignore)
            .count()
    }

    pub fn interval_of(&self, values: &[FieldValue]) -> Result<Range> {
        match values.get(self.range_index) {
            Some(FieldValue::Range(range)) => Ok(*range),
            _ => Err(Error::InvalidInput(format!(
                "record has no range value at position {}",
                self.range_index
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_codes_are_stable() {
        for code in 0..=10 {
            assert_eq!(FieldType::from_code(code).unwrap().code(), code);
        }
        assert!(matches!(FieldType::from_code(11), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_schema_locates_range_after_ignored_fields() {
        let schema = RecordSchema::new(vec![
            FieldType::Ignore,
            FieldType::String,
            FieldType::Range,
        ])
        .unwrap();
        assert_eq!(schema.value_count(), 2);
        let values = vec![
            FieldValue::String("a".into()),
            FieldValue::Range(Range::new(1, 5)),
        ];
        assert_eq!(schema.interval_of(&values).unwrap(), Range::new(1, 5));
    }

    #[test]
    fn test_schema_requires_single_range() {
        assert!(RecordSchema::new(vec![FieldType::String]).is_err());
        assert!(RecordSchema::new(vec![FieldType::Range, FieldType::Range]).is_err());
    }

    #[test]
    fn test_field_value_json_is_plain() {
        let json = serde_json::to_value(FieldValue::Range(Range::new(3, 4))).unwrap();
        assert_eq!(json, serde_json::json!({"from": 3, "to": 4}));
        let json = serde_json::to_value(FieldValue::Integer(7)).unwrap();
        assert_eq!(json, serde_json::json!(7));
    }
}
