//! Data sources the range cache can sit in front of.
//!
//! A source answers "records on reference R overlapping range [a, b]" and
//! nothing else; the cache and the HTTP layer only ever see this capability,
//! never a concrete backend.
//!
//! # Implementations
//!
//! - [`IndexedFileSource`] - bin-indexed record files
//! - [`MemorySource`] - in-memory record lists (stand-in for remote backends)

mod indexed;
mod memory;

pub use indexed::IndexedFileSource;
pub use memory::MemorySource;

use crate::codec::FieldValue;
use crate::types::{Range, Resolution};
use crate::Result;
use serde::Serialize;

/// Genomic key a record is stashed and sliced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKey {
    Point(i32),
    Interval(Range),
}

impl RecordKey {
    pub fn overlaps(&self, range: &Range) -> bool {
        match self {
            RecordKey::Point(position) => range.contains_position(*position),
            RecordKey::Interval(interval) => interval.intersects(range),
        }
    }
}

pub trait GenomicRecord: Clone + PartialEq {
    fn key(&self) -> RecordKey;
}

/// A decoded record from an indexed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalRecord {
    pub interval: Range,
    pub values: Vec<FieldValue>,
}

impl GenomicRecord for IntervalRecord {
    fn key(&self) -> RecordKey {
        RecordKey::Interval(self.interval)
    }
}

/// A single-position value, e.g. a coverage sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointRecord {
    pub position: i32,
    pub value: f64,
}

impl GenomicRecord for PointRecord {
    fn key(&self) -> RecordKey {
        RecordKey::Point(self.position)
    }
}

/// Capability to fetch records for a (reference, range) pair.
pub trait DataSource {
    type Record: GenomicRecord;

    /// Records overlapping `range` on `reference`. A reference the source does
    /// not know yields an empty list, not an error.
    fn fetch(&mut self, reference: &str, range: Range, resolution: Resolution)
    -> Result<Vec<Self::Record>>;

    /// Reference names the source holds data for.
    fn references(&self) -> Vec<String>;
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    type Record = S::Record;

    fn fetch(
        &mut self,
        reference: &str,
        range: Range,
        resolution: Resolution,
    ) -> Result<Vec<Self::Record>> {
        (**self).fetch(reference, range, resolution)
    }

    fn references(&self) -> Vec<String> {
        (**self).references()
    }
}
