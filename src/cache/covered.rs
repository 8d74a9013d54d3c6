use crate::types::Range;

/// Disjoint, sorted set of ranges that have already been fetched. Ranges
/// that overlap or touch (`a.to + 1 == b.from`) are always merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoveredRanges {
    ranges: Vec<Range>,
}

impl CoveredRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn add(&mut self, range: Range) {
        let mut merged = range;
        let mut inserted = false;
        let mut result = Vec::with_capacity(self.ranges.len() + 1);

        for existing in self.ranges.drain(..) {
            if i64::from(existing.to) + 1 < i64::from(merged.from) {
                result.push(existing);
            } else if i64::from(merged.to) + 1 < i64::from(existing.from) {
                if !inserted {
                    result.push(merged);
                    inserted = true;
                }
                result.push(existing);
            } else {
                merged = Range::new(merged.from.min(existing.from), merged.to.max(existing.to));
            }
        }
        if !inserted {
            result.push(merged);
        }
        self.ranges = result;
    }

    /// Parts of `range` not covered yet, in order.
    pub fn missing(&self, range: Range) -> Vec<Range> {
        let mut missing = Vec::new();
        let mut cursor = i64::from(range.from);

        for covered in &self.ranges {
            if covered.to < range.from {
                continue;
            }
            if covered.from > range.to {
                break;
            }
            if i64::from(covered.from) > cursor {
                missing.push(Range::new(cursor as i32, covered.from - 1));
            }
            cursor = cursor.max(i64::from(covered.to) + 1);
        }
        if cursor <= i64::from(range.to) {
            missing.push(Range::new(cursor as i32, range.to));
        }
        missing
    }

    pub fn covers(&self, range: Range) -> bool {
        self.missing(range).is_empty()
    }
}
