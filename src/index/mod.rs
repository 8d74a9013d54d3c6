//! Per-reference interval bin index.
//!
//! The whole reference is covered by a root bin. Inserting an interval walks
//! down through bins that fully contain it, subdividing a bin into `arity`
//! equal parts on demand, until no child can hold the interval or the bin is
//! no longer larger than the minimum bin size. Each interval therefore lives
//! in the smallest bin that contains it, in the style of UCSC binning.
//!
//! Nodes live in a flat arena addressed by [`NodeId`]; children and parents
//! are ids, which is also how nodes are serialized (see [`write_nodes`] and
//! [`read_nodes`]).

mod node_io;

pub use node_io::{NODE_RECORD_SIZE, NodeRecord, read_nodes, write_nodes};

use crate::types::Range;
use crate::{Error, Result};

pub const DEFAULT_ARITY: usize = 5;
pub const DEFAULT_MIN_BIN_SIZE: i64 = 10_000;

pub type NodeId = usize;

/// A bin of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTreeNode {
    pub index: NodeId,
    pub range: Range,
    /// Records stored directly in this bin.
    pub record_count: u32,
    /// Records stored in this bin and every descendant.
    pub subtree_count: u32,
    /// Absolute offset of this bin's first record in the backing store.
    pub start_byte: u64,
    pub parent: Option<NodeId>,
    /// Ordered by range start.
    pub children: Vec<NodeId>,
}

impl IntervalTreeNode {
    fn new(index: NodeId, range: Range, parent: Option<NodeId>) -> Self {
        Self {
            index,
            range,
            record_count: 0,
            subtree_count: 0,
            start_byte: 0,
            parent,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct IntervalSearchTree {
    nodes: Vec<Option<IntervalTreeNode>>,
    root: NodeId,
    arity: usize,
    min_bin_size: i64,
}

impl IntervalSearchTree {
    /// Create a tree whose root bin covers `range`.
    pub fn new(range: Range, arity: usize, min_bin_size: i64) -> Result<Self> {
        if arity < 2 {
            return Err(Error::InvalidInput(format!("arity must be at least 2, got {}", arity)));
        }
        if min_bin_size < 1 {
            return Err(Error::InvalidInput(format!(
                "minimum bin size must be positive, got {}",
                min_bin_size
            )));
        }
        if range.from > range.to {
            return Err(Error::InvalidRange(format!("root range {} is empty", range)));
        }
        Ok(Self {
            nodes: vec![Some(IntervalTreeNode::new(0, range, None))],
            root: 0,
            arity,
            min_bin_size,
        })
    }

    pub fn with_defaults(range: Range) -> Result<Self> {
        Self::new(range, DEFAULT_ARITY, DEFAULT_MIN_BIN_SIZE)
    }

    /// Assemble a tree from already-wired nodes (the read path).
    pub(crate) fn from_parts(
        nodes: Vec<Option<IntervalTreeNode>>,
        root: NodeId,
        arity: usize,
        min_bin_size: i64,
    ) -> Self {
        Self {
            nodes,
            root,
            arity,
            min_bin_size,
        }
    }

    pub fn root(&self) -> &IntervalTreeNode {
        // remove() refuses the root, so its slot is always occupied.
        match &self.nodes[self.root] {
            Some(node) => node,
            None => unreachable!("root node is never removed"),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn min_bin_size(&self) -> i64 {
        self.min_bin_size
    }

    pub fn node(&self, id: NodeId) -> Option<&IntervalTreeNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut IntervalTreeNode> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    /// Live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &IntervalTreeNode> {
        self.nodes.iter().flatten()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the id space, including removed slots.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn record_count(&self) -> u32 {
        self.root().subtree_count
    }

    /// Store `interval` in the smallest bin that contains it, creating bins as
    /// needed. Returns the id of that bin.
    pub fn insert(&mut self, interval: Range) -> Result<NodeId> {
        if interval.from > interval.to || !self.root().range.contains(&interval) {
            return Err(Error::InvalidRange(format!(
                "interval {} is outside the indexed range {}",
                interval,
                self.root().range
            )));
        }

        let mut current = self.root;
        loop {
            let node = self.live_mut(current)?;
            node.subtree_count += 1;
            let range = node.range;

            if let Some(child) = self.child_containing(current, &interval) {
                current = child;
                continue;
            }

            if range.length() > self.min_bin_size {
                if let Some(sub_range) = self.subdivision_containing(range, &interval) {
                    current = self.add_child(current, sub_range)?;
                    continue;
                }
            }

            self.live_mut(current)?.record_count += 1;
            return Ok(current);
        }
    }

    /// The bin `interval` would descend to among the bins that exist now.
    pub fn find_bin(&self, interval: Range) -> Option<NodeId> {
        if !self.root().range.contains(&interval) {
            return None;
        }
        let mut current = self.root;
        while let Some(child) = self.child_containing(current, &interval) {
            current = child;
        }
        Some(current)
    }

    /// Excise a node together with its subtree.
    ///
    /// The node is detached from its parent's child list, the arena slots of
    /// the node and its descendants are emptied, and every ancestor's
    /// `subtree_count` is reduced by the removed subtree's count. Returns the
    /// removed node.
    pub fn remove(&mut self, id: NodeId) -> Result<IntervalTreeNode> {
        if id == self.root {
            return Err(Error::InvalidInput("the root bin cannot be removed".to_string()));
        }
        let removed_count = self.live(id)?.subtree_count;
        let parent = self.live(id)?.parent;

        let mut ancestor = parent;
        while let Some(ancestor_id) = ancestor {
            let node = self.live_mut(ancestor_id)?;
            node.subtree_count = node.subtree_count.saturating_sub(removed_count);
            ancestor = node.parent;
        }
        if let Some(parent_id) = parent {
            self.live_mut(parent_id)?.children.retain(|child| *child != id);
        }

        let mut pending = self.live(id)?.children.clone();
        while let Some(descendant) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(descendant).and_then(Option::take) {
                pending.extend(node.children);
            }
        }

        self.nodes[id]
            .take()
            .ok_or_else(|| Error::Internal(format!("node {} vanished during removal", id)))
    }

    fn live(&self, id: NodeId) -> Result<&IntervalTreeNode> {
        self.node(id)
            .ok_or_else(|| Error::InvalidInput(format!("no bin with id {}", id)))
    }

    fn live_mut(&mut self, id: NodeId) -> Result<&mut IntervalTreeNode> {
        self.node_mut(id)
            .ok_or_else(|| Error::InvalidInput(format!("no bin with id {}", id)))
    }

    fn child_containing(&self, id: NodeId, interval: &Range) -> Option<NodeId> {
        let node = self.node(id)?;
        node.children.iter().copied().find(|child| {
            self.node(*child)
                .is_some_and(|child| child.range.contains(interval))
        })
    }

    /// The equal subdivision of `range` that fully contains `interval`, if
    /// any. The last subdivision absorbs the remainder.
    fn subdivision_containing(&self, range: Range, interval: &Range) -> Option<Range> {
        let width = range.length() / self.arity as i64;
        if width == 0 {
            return None;
        }
        let slot = ((i64::from(interval.from) - i64::from(range.from)) / width)
            .min(self.arity as i64 - 1);
        let from = i64::from(range.from) + slot * width;
        let to = if slot == self.arity as i64 - 1 {
            i64::from(range.to)
        } else {
            from + width - 1
        };
        let sub_range = Range::new(i32::try_from(from).ok()?, i32::try_from(to).ok()?);
        sub_range.contains(interval).then_some(sub_range)
    }

    fn add_child(&mut self, parent: NodeId, range: Range) -> Result<NodeId> {
        let id = self.nodes.len();
        self.nodes.push(Some(IntervalTreeNode::new(id, range, Some(parent))));

        let starts: Vec<i32> = self
            .live(parent)?
            .children
            .iter()
            .map(|child| self.node(*child).map_or(i32::MIN, |n| n.range.from))
            .collect();
        let position = starts.partition_point(|start| *start < range.from);
        self.live_mut(parent)?.children.insert(position, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_tree() -> IntervalSearchTree {
        IntervalSearchTree::new(Range::new(0, 10_000), 2, 1_000).unwrap()
    }

    #[test]
    fn test_new_tree_has_only_root() {
        let tree = scenario_tree();
        assert_eq!(tree.len(), 1);
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().range, Range::new(0, 10_000));
        assert_eq!(tree.record_count(), 0);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(IntervalSearchTree::new(Range::new(0, 10), 1, 10).is_err());
        assert!(IntervalSearchTree::new(Range::new(0, 10), 2, 0).is_err());
        assert!(IntervalSearchTree::new(Range::new(10, 0), 2, 1).is_err());
    }

    #[test]
    fn test_insert_descends_to_smallest_bin() {
        let mut tree = scenario_tree();
        let bin = tree.insert(Range::new(100, 200)).unwrap();

        // 10001 -> [0,4999] -> [0,2499] -> [0,1249] -> [0,624]
        let node = tree.node(bin).unwrap();
        assert_eq!(node.range, Range::new(0, 624));
        assert_eq!(node.record_count, 1);
        assert!(node.range.length() <= tree.min_bin_size());
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_last_subdivision_takes_remainder() {
        let mut tree = scenario_tree();
        let bin = tree.insert(Range::new(5_000, 5_100)).unwrap();
        assert_eq!(tree.node(bin).unwrap().range, Range::new(5_000, 5_624));

        let first = tree.root().children[0];
        assert_eq!(tree.node(first).unwrap().range, Range::new(5_000, 10_000));
    }

    #[test]
    fn test_interval_straddling_subdivisions_stays_high() {
        let mut tree = scenario_tree();
        let bin = tree.insert(Range::new(4_990, 5_010)).unwrap();
        assert_eq!(bin, tree.root_id());
        assert_eq!(tree.root().record_count, 1);
        assert!(tree.root().is_leaf());
    }

    #[test]
    fn test_existing_bins_are_reused() {
        let mut tree = scenario_tree();
        let a = tree.insert(Range::new(100, 200)).unwrap();
        let b = tree.insert(Range::new(150, 160)).unwrap();
        assert_eq!(a, b);
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.node(a).unwrap().record_count, 2);
    }

    #[test]
    fn test_subtree_counts_sum_record_counts() {
        let mut tree = scenario_tree();
        for interval in [
            Range::new(100, 200),
            Range::new(150, 160),
            Range::new(5_000, 5_100),
            Range::new(4_990, 5_010),
            Range::new(9_000, 9_999),
        ] {
            tree.insert(interval).unwrap();
        }
        for node in tree.nodes() {
            let mut total = 0;
            let mut stack = vec![node.index];
            while let Some(id) = stack.pop() {
                let n = tree.node(id).unwrap();
                total += n.record_count;
                stack.extend(n.children.iter().copied());
            }
            assert_eq!(node.subtree_count, total, "bin {}", node.index);
        }
        assert_eq!(tree.record_count(), 5);
    }

    #[test]
    fn test_children_are_ordered_and_contained() {
        let mut tree = scenario_tree();
        tree.insert(Range::new(9_000, 9_100)).unwrap();
        tree.insert(Range::new(10, 20)).unwrap();
        let root = tree.root();
        assert_eq!(root.children.len(), 2);
        let ranges: Vec<Range> = root
            .children
            .iter()
            .map(|c| tree.node(*c).unwrap().range)
            .collect();
        assert!(ranges[0].from < ranges[1].from);
        for node in tree.nodes() {
            for child in &node.children {
                let child = tree.node(*child).unwrap();
                assert!(node.range.contains(&child.range));
                assert_ne!(node.range, child.range);
                assert_eq!(child.parent, Some(node.index));
            }
        }
    }

    #[test]
    fn test_insert_outside_root_is_rejected() {
        let mut tree = scenario_tree();
        assert!(matches!(
            tree.insert(Range::new(9_990, 10_001)),
            Err(Error::InvalidRange(_))
        ));
        assert_eq!(tree.record_count(), 0);
    }

    #[test]
    fn test_find_bin_matches_insert() {
        let mut tree = scenario_tree();
        let bin = tree.insert(Range::new(100, 200)).unwrap();
        assert_eq!(tree.find_bin(Range::new(120, 130)), Some(bin));
        assert_eq!(tree.find_bin(Range::new(4_000, 6_000)), Some(tree.root_id()));
        assert_eq!(tree.find_bin(Range::new(-5, 3)), None);
    }

    #[test]
    fn test_remove_excises_subtree_and_repairs_counts() {
        let mut tree = scenario_tree();
        tree.insert(Range::new(100, 200)).unwrap();
        tree.insert(Range::new(5_000, 5_100)).unwrap();
        tree.insert(Range::new(5_000, 5_050)).unwrap();
        let live_before = tree.len();

        let left = tree.root().children[0];
        let removed = tree.remove(left).unwrap();
        assert_eq!(removed.range, Range::new(0, 4_999));

        assert_eq!(tree.root().children.len(), 1);
        assert!(tree.node(left).is_none());
        assert_eq!(tree.len(), live_before - 4);
        assert_eq!(tree.record_count(), 2);
        assert!(tree.capacity() > tree.len());
    }

    #[test]
    fn test_remove_root_is_rejected() {
        let mut tree = scenario_tree();
        assert!(tree.remove(tree.root_id()).is_err());
        assert!(tree.remove(42).is_err());
    }
}
