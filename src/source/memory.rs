use super::{DataSource, GenomicRecord};
use crate::types::{Range, Resolution};
use crate::Result;
use std::collections::BTreeMap;

/// Records held in memory per reference. Every fetch is logged, which makes it
/// a convenient stand-in for a remote backend.
#[derive(Debug, Clone)]
pub struct MemorySource<R> {
    records: BTreeMap<String, Vec<R>>,
    fetches: Vec<(String, Range, Resolution)>,
}

impl<R> Default for MemorySource<R> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            fetches: Vec::new(),
        }
    }
}

impl<R: GenomicRecord> MemorySource<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, reference: &str, records: Vec<R>) -> Self {
        self.insert(reference, records);
        self
    }

    pub fn insert(&mut self, reference: &str, records: Vec<R>) {
        self.records
            .entry(reference.to_string())
            .or_default()
            .extend(records);
    }

    /// Every (reference, range, resolution) fetched so far, in call order.
    pub fn fetches(&self) -> &[(String, Range, Resolution)] {
        &self.fetches
    }
}

impl<R: GenomicRecord> DataSource for MemorySource<R> {
    type Record = R;

    fn fetch(&mut self, reference: &str, range: Range, resolution: Resolution) -> Result<Vec<R>> {
        self.fetches
            .push((reference.to_string(), range, resolution));
        Ok(self
            .records
            .get(reference)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.key().overlaps(&range))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn references(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }
}
