use crate::source::{GenomicRecord, RecordKey};
use crate::types::Range;
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Fetched records, keyed by genomic position or by interval. Several records
/// may share a key.
#[derive(Debug, Clone)]
pub enum Stash<R> {
    Point(BTreeMap<i32, Vec<R>>),
    Interval {
        records: BTreeMap<(i32, i32), Vec<R>>,
        /// Largest `to - from` stashed so far; bounds how far left of a query
        /// an intersecting interval can start.
        max_span: i64,
    },
}

impl<R: GenomicRecord> Stash<R> {
    /// An empty stash of the kind `key` belongs to.
    pub fn for_key(key: &RecordKey) -> Self {
        match key {
            RecordKey::Point(_) => Stash::Point(BTreeMap::new()),
            RecordKey::Interval(_) => Stash::Interval {
                records: BTreeMap::new(),
                max_span: 0,
            },
        }
    }

    /// Add fetched records. A record equal to one already stashed under the
    /// same key is dropped, so overlapping fetches do not duplicate entries;
    /// repeats within `records` itself are kept. Nothing is added if any
    /// record is of the wrong kind. Returns the number of records added.
    pub fn merge(&mut self, records: Vec<R>) -> Result<usize> {
        match self {
            Stash::Point(map) => {
                let keyed = records
                    .into_iter()
                    .map(|r| match r.key() {
                        RecordKey::Point(position) => Ok((position, r)),
                        RecordKey::Interval(interval) => Err(kind_mismatch("interval", interval)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(merge_into(map, keyed))
            }
            Stash::Interval { records: map, max_span } => {
                let keyed = records
                    .into_iter()
                    .map(|r| match r.key() {
                        RecordKey::Interval(interval) => Ok(((interval.from, interval.to), r)),
                        RecordKey::Point(position) => {
                            Err(kind_mismatch("point", Range::new(position, position)))
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                for ((from, to), _) in &keyed {
                    *max_span = (*max_span).max(i64::from(*to) - i64::from(*from));
                }
                Ok(merge_into(map, keyed))
            }
        }
    }

    /// Stashed records overlapping `range`, in key order.
    pub fn slice(&self, range: Range) -> Vec<R> {
        if range.from > range.to {
            return Vec::new();
        }
        match self {
            Stash::Point(map) => map
                .range(range.from..=range.to)
                .flat_map(|(_, records)| records.iter().cloned())
                .collect(),
            Stash::Interval { records, max_span } => {
                let lowest_start = (i64::from(range.from) - max_span).max(i64::from(i32::MIN)) as i32;
                records
                    .range((lowest_start, i32::MIN)..=(range.to, i32::MAX))
                    .filter(|((_, to), _)| *to >= range.from)
                    .flat_map(|(_, records)| records.iter().cloned())
                    .collect()
            }
        }
    }

    /// Total number of stashed records.
    pub fn len(&self) -> usize {
        match self {
            Stash::Point(map) => map.values().map(Vec::len).sum(),
            Stash::Interval { records, .. } => records.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn kind_mismatch(kind: &str, at: Range) -> Error {
    Error::Internal(format!(
        "source returned a {} record at {} into a stash of another kind",
        kind, at
    ))
}

fn merge_into<K: Ord + Copy, R: PartialEq>(map: &mut BTreeMap<K, Vec<R>>, keyed: Vec<(K, R)>) -> usize {
    let mut grouped: BTreeMap<K, Vec<R>> = BTreeMap::new();
    for (key, record) in keyed {
        grouped.entry(key).or_default().push(record);
    }

    let mut added = 0;
    for (key, incoming) in grouped {
        let existing = map.entry(key).or_default();
        let mut matched = vec![false; existing.len()];
        let mut fresh = Vec::new();
        for record in incoming {
            let duplicate = existing
                .iter()
                .enumerate()
                .position(|(i, e)| !matched[i] && *e == record);
            match duplicate {
                Some(i) => matched[i] = true,
                None => fresh.push(record),
            }
        }
        added += fresh.len();
        existing.extend(fresh);
    }
    added
}
