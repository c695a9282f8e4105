use std::collections::HashSet;
use std::ops::Range;

/// Sorted, disjoint, non-adjacent set of half-open index ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<Range<usize>>,
}

impl RangeSet {
    pub fn insert(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let first = self.ranges.partition_point(|r| r.end < range.start);
        let last = self.ranges.partition_point(|r| r.start <= range.end);

        let mut merged = range;
        if first < last {
            merged.start = merged.start.min(self.ranges[first].start);
            merged.end = merged.end.max(self.ranges[last - 1].end);
        }
        self.ranges.splice(first..last, std::iter::once(merged));
    }

    pub fn contains(&self, index: usize) -> bool {
        let candidate = self.ranges.partition_point(|r| r.end <= index);
        self.ranges.get(candidate).is_some_and(|r| r.start <= index)
    }

    pub fn merge(&mut self, other: &RangeSet) {
        for range in &other.ranges {
            self.insert(range.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range<usize>> {
        self.ranges.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Coalesces successfully validated indices into ranges before they reach a [`RangeSet`].
#[derive(Debug, Default)]
pub(crate) struct RangeAccumulator {
    pending: Option<Range<usize>>,
}

impl RangeAccumulator {
    pub(crate) fn record(&mut self, index: usize, target: &mut RangeSet) {
        if let Some(range) = self.pending.as_mut() {
            if range.end == index {
                range.end += 1;
                return;
            }
        }
        self.flush(target);
        self.pending = Some(index..index + 1);
    }

    pub(crate) fn flush(&mut self, target: &mut RangeSet) {
        if let Some(range) = self.pending.take() {
            target.insert(range);
        }
    }
}

/// Which parts of the current instance some keyword has evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationResults {
    pub evaluated_properties: HashSet<String>,
    pub evaluated_items: RangeSet,
}

impl EvaluationResults {
    pub fn merge(&mut self, other: &EvaluationResults) {
        self.evaluated_properties
            .extend(other.evaluated_properties.iter().cloned());
        self.evaluated_items.merge(&other.evaluated_items);
    }

    pub fn is_property_evaluated(&self, key: &str) -> bool {
        self.evaluated_properties.contains(key)
    }

    pub fn is_item_evaluated(&self, index: usize) -> bool {
        self.evaluated_items.contains(index)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ranges(set: &RangeSet) -> Vec<Range<usize>> {
        set.iter().cloned().collect()
    }

    #[test]
    fn overlapping_and_adjacent_ranges_coalesce() {
        let mut set = RangeSet::default();
        set.insert(5..7);
        set.insert(0..2);
        set.insert(2..3);
        set.insert(6..10);
        set.insert(4..4);

        assert_eq!(ranges(&set), vec![0..3, 5..10]);
    }

    #[test]
    fn bridging_range_swallows_neighbours() {
        let mut set = RangeSet::default();
        set.insert(0..1);
        set.insert(3..4);
        set.insert(6..7);
        set.insert(1..6);

        assert_eq!(ranges(&set), vec![0..7]);
    }

    #[test]
    fn contains_checks_membership() {
        let mut set = RangeSet::default();
        set.insert(2..4);
        set.insert(8..9);

        let members: Vec<usize> = (0..10).filter(|i| set.contains(*i)).collect();
        assert_eq!(members, vec![2, 3, 8]);
    }

    #[test]
    fn accumulator_flushes_on_gaps() {
        let mut set = RangeSet::default();
        let mut accumulator = RangeAccumulator::default();
        for index in [0, 1, 2, 5, 6, 9] {
            accumulator.record(index, &mut set);
        }
        accumulator.flush(&mut set);

        assert_eq!(ranges(&set), vec![0..3, 5..7, 9..10]);
    }

    #[test]
    fn merge_unions_results() {
        let mut parent = EvaluationResults::default();
        parent.evaluated_properties.insert("a".to_owned());
        parent.evaluated_items.insert(0..2);

        let mut child = EvaluationResults::default();
        child.evaluated_properties.insert("b".to_owned());
        child.evaluated_items.insert(2..3);

        parent.merge(&child);

        assert!(parent.is_property_evaluated("a"));
        assert!(parent.is_property_evaluated("b"));
        assert_eq!(ranges(&parent.evaluated_items), vec![0..3]);
    }
}
