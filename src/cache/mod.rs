//! Range-query cache in front of a [`DataSource`].
//!
//! For every (reference, resolution) pair the cache remembers which ranges
//! have been fetched ([`CoveredRanges`]) and the records they produced
//! ([`Stash`]). A query fetches only the parts of its range that are not yet
//! covered, then answers from the stash, so overlapping queries issued while
//! panning do not refetch what is already in memory.
//!
//! The cache is not synchronized: `get_records` is a read-modify-write over
//! the covered ranges and stash. Share it behind a lock if more than one
//! caller can reach it.

mod covered;
mod stash;

pub use covered::CoveredRanges;
pub use stash::Stash;

use crate::source::{DataSource, GenomicRecord};
use crate::types::{Range, Resolution};
use crate::{Error, Result};
use std::collections::HashMap;

struct CacheEntry<R> {
    covered: CoveredRanges,
    /// Created on the first non-empty fetch.
    stash: Option<Stash<R>>,
}

impl<R> Default for CacheEntry<R> {
    fn default() -> Self {
        Self {
            covered: CoveredRanges::new(),
            stash: None,
        }
    }
}

pub struct RangeCache<S: DataSource> {
    source: S,
    entries: HashMap<(String, Resolution), CacheEntry<S::Record>>,
}

impl<S: DataSource> RangeCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: HashMap::new(),
        }
    }

    /// Records on `reference` overlapping `range`, in key order.
    ///
    /// Uncovered parts of `range` are fetched from the source one at a time.
    /// If a fetch fails, that part stays uncovered and the error is returned;
    /// parts fetched before it remain cached.
    pub fn get_records(
        &mut self,
        reference: &str,
        range: Range,
        resolution: Resolution,
    ) -> Result<Vec<S::Record>> {
        if range.from > range.to {
            return Err(Error::InvalidRange(format!(
                "start {} is after end {}",
                range.from, range.to
            )));
        }

        let Self { source, entries } = self;
        let entry = entries
            .entry((reference.to_string(), resolution))
            .or_default();

        for gap in entry.covered.missing(range) {
            tracing::debug!("fetching uncovered {}:{} at {:?}", reference, gap, resolution);
            let records = source.fetch(reference, gap, resolution)?;

            if let Some(first) = records.first() {
                let key = first.key();
                let stash = entry.stash.get_or_insert_with(|| Stash::for_key(&key));
                let added = stash.merge(records)?;
                tracing::trace!("stashed {} new records for {}:{}", added, reference, gap);
            }
            entry.covered.add(gap);
        }

        Ok(entry
            .stash
            .as_ref()
            .map(|stash| stash.slice(range))
            .unwrap_or_default())
    }

    /// Ranges fetched so far for a (reference, resolution) pair.
    pub fn covered(&self, reference: &str, resolution: Resolution) -> Option<&CoveredRanges> {
        self.entries
            .get(&(reference.to_string(), resolution))
            .map(|entry| &entry.covered)
    }

    /// Number of records stashed for a (reference, resolution) pair.
    pub fn stashed(&self, reference: &str, resolution: Resolution) -> usize {
        self.entries
            .get(&(reference.to_string(), resolution))
            .and_then(|entry| entry.stash.as_ref())
            .map_or(0, Stash::len)
    }

    /// Forget everything cached for `reference`, at every resolution.
    pub fn invalidate(&mut self, reference: &str) {
        self.entries.retain(|(name, _), _| name != reference);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FieldValue;
    use crate::source::{IntervalRecord, MemorySource, PointRecord};

    /// Returns the same record for every query, whatever the range.
    struct FixedSource {
        record: PointRecord,
        calls: Vec<Range>,
    }

    impl DataSource for FixedSource {
        type Record = PointRecord;

        fn fetch(&mut self, _: &str, range: Range, _: Resolution) -> Result<Vec<PointRecord>> {
            self.calls.push(range);
            Ok(vec![self.record.clone()])
        }

        fn references(&self) -> Vec<String> {
            vec!["chr1".to_string()]
        }
    }

    /// Fails any fetch touching `poisoned` until `healed` is set.
    struct FlakySource {
        inner: MemorySource<PointRecord>,
        poisoned: Range,
        healed: bool,
    }

    impl DataSource for FlakySource {
        type Record = PointRecord;

        fn fetch(
            &mut self,
            reference: &str,
            range: Range,
            resolution: Resolution,
        ) -> Result<Vec<PointRecord>> {
            if !self.healed && range.intersects(&self.poisoned) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )));
            }
            self.inner.fetch(reference, range, resolution)
        }

        fn references(&self) -> Vec<String> {
            self.inner.references()
        }
    }

    fn points(positions: &[i32]) -> Vec<PointRecord> {
        positions
            .iter()
            .map(|p| PointRecord {
                position: *p,
                value: *p as f64,
            })
            .collect()
    }

    fn positions(records: &[PointRecord]) -> Vec<i32> {
        records.iter().map(|r| r.position).collect()
    }

    #[test]
    fn test_only_the_uncovered_delta_is_fetched() {
        let mut cache = RangeCache::new(FixedSource {
            record: PointRecord {
                position: 75,
                value: 1.0,
            },
            calls: Vec::new(),
        });

        let first = cache
            .get_records("chr1", Range::new(1, 100), Resolution::High)
            .unwrap();
        assert_eq!(positions(&first), vec![75]);

        let second = cache
            .get_records("chr1", Range::new(50, 150), Resolution::High)
            .unwrap();
        assert_eq!(positions(&second), vec![75]);

        assert_eq!(
            cache.source().calls,
            vec![Range::new(1, 100), Range::new(101, 150)]
        );
        assert_eq!(
            cache.covered("chr1", Resolution::High).unwrap().ranges(),
            &[Range::new(1, 150)]
        );
    }

    #[test]
    fn test_repeated_query_fetches_nothing() {
        let source = MemorySource::new().with_records("chr1", points(&[5, 15, 25, 35]));
        let mut cache = RangeCache::new(source);

        let first = cache
            .get_records("chr1", Range::new(10, 30), Resolution::default())
            .unwrap();
        let second = cache
            .get_records("chr1", Range::new(10, 30), Resolution::default())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(positions(&first), vec![15, 25]);
        assert_eq!(cache.source().fetches().len(), 1);
    }

    #[test]
    fn test_fill_between_covered_ranges() {
        let source = MemorySource::new().with_records("chr1", points(&[5, 50, 95]));
        let mut cache = RangeCache::new(source);
        let res = Resolution::default();

        cache.get_records("chr1", Range::new(1, 10), res).unwrap();
        cache.get_records("chr1", Range::new(90, 100), res).unwrap();
        let all = cache.get_records("chr1", Range::new(1, 100), res).unwrap();

        assert_eq!(positions(&all), vec![5, 50, 95]);
        let fetched: Vec<Range> = cache.source().fetches().iter().map(|f| f.1).collect();
        assert_eq!(
            fetched,
            vec![Range::new(1, 10), Range::new(90, 100), Range::new(11, 89)]
        );
        assert_eq!(
            cache.covered("chr1", res).unwrap().ranges(),
            &[Range::new(1, 100)]
        );
    }

    #[test]
    fn test_resolutions_are_cached_independently() {
        let source = MemorySource::new().with_records("chr1", points(&[5]));
        let mut cache = RangeCache::new(source);

        cache.get_records("chr1", Range::new(1, 10), Resolution::High).unwrap();
        cache.get_records("chr1", Range::new(1, 10), Resolution::Low).unwrap();
        cache.get_records("chr1", Range::new(1, 10), Resolution::High).unwrap();

        let resolutions: Vec<Resolution> =
            cache.source().fetches().iter().map(|f| f.2).collect();
        assert_eq!(resolutions, vec![Resolution::High, Resolution::Low]);
    }

    #[test]
    fn test_failed_gap_stays_uncovered_and_is_retried() {
        let mut cache = RangeCache::new(FlakySource {
            inner: MemorySource::new().with_records("chr1", points(&[10, 60, 120])),
            poisoned: Range::new(101, 101),
            healed: false,
        });
        let res = Resolution::default();

        cache.get_records("chr1", Range::new(50, 70), res).unwrap();
        let result = cache.get_records("chr1", Range::new(1, 150), res);
        assert!(matches!(result, Err(Error::Io(_))));

        // [1,49] was fetched and kept, [71,150] failed and is not covered
        assert_eq!(
            cache.covered("chr1", res).unwrap().ranges(),
            &[Range::new(1, 70)]
        );
        assert_eq!(cache.stashed("chr1", res), 2);

        cache.source_mut().healed = true;
        let all = cache.get_records("chr1", Range::new(1, 150), res).unwrap();
        assert_eq!(positions(&all), vec![10, 60, 120]);

        let retried: Vec<Range> = cache.source().inner.fetches().iter().map(|f| f.1).collect();
        assert_eq!(retried.last(), Some(&Range::new(71, 150)));
    }

    #[test]
    fn test_empty_fetch_covers_without_stash() {
        let source: MemorySource<PointRecord> = MemorySource::new();
        let mut cache = RangeCache::new(source);
        let res = Resolution::default();

        assert!(cache.get_records("chrZ", Range::new(1, 10), res).unwrap().is_empty());
        assert!(cache.covered("chrZ", res).unwrap().covers(Range::new(1, 10)));
        assert_eq!(cache.stashed("chrZ", res), 0);
    }

    #[test]
    fn test_intervals_spanning_gap_boundaries_appear_once() {
        let record = |from, to| IntervalRecord {
            interval: Range::new(from, to),
            values: vec![FieldValue::Range(Range::new(from, to))],
        };
        let source = MemorySource::new()
            .with_records("chr1", vec![record(90, 110), record(20, 30), record(140, 145)]);
        let mut cache = RangeCache::new(source);
        let res = Resolution::default();

        cache.get_records("chr1", Range::new(1, 100), res).unwrap();
        let records = cache.get_records("chr1", Range::new(50, 150), res).unwrap();
        let intervals: Vec<Range> = records.iter().map(|r| r.interval).collect();
        assert_eq!(intervals, vec![Range::new(90, 110), Range::new(140, 145)]);
        assert_eq!(cache.stashed("chr1", res), 3);
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let source = MemorySource::new().with_records("chr1", points(&[5]));
        let mut cache = RangeCache::new(source);
        let res = Resolution::default();

        cache.get_records("chr1", Range::new(1, 10), res).unwrap();
        cache.invalidate("chr1");
        assert!(cache.covered("chr1", res).is_none());
        cache.get_records("chr1", Range::new(1, 10), res).unwrap();
        assert_eq!(cache.source().fetches().len(), 2);

        cache.clear();
        assert_eq!(cache.into_inner().fetches().len(), 2);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let source: MemorySource<PointRecord> = MemorySource::new();
        let mut cache = RangeCache::new(source);
        let result = cache.get_records("chr1", Range::new(10, 1), Resolution::default());
        assert!(matches!(result, Err(Error::InvalidRange(_))));
        assert!(cache.source().fetches().is_empty());
    }
}
