use super::{IntervalSearchTree, IntervalTreeNode, NodeId};
use crate::types::Range;
use crate::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Read, Write};

/// Encoded size of one node record.
pub const NODE_RECORD_SIZE: usize = 32;

/// Id of the record that ends a reference's node run.
const TERMINATOR_ID: i32 = -1;

/// Ids may have gaps after removals, but not so many that the arena would
/// dwarf the node count.
const MAX_ID_SPARSITY: usize = 64;

/// Fixed-width on-disk form of a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: i32,
    pub range: Range,
    pub start_byte: i64,
    pub record_count: i32,
    pub subtree_count: i32,
    /// `-1` for the root.
    pub parent_id: i32,
}

impl NodeRecord {
    pub const TERMINATOR: NodeRecord = NodeRecord {
        id: TERMINATOR_ID,
        range: Range::new(0, 0),
        start_byte: 0,
        record_count: 0,
        subtree_count: 0,
        parent_id: 0,
    };

    pub fn from_node(node: &IntervalTreeNode) -> Result<Self> {
        let overflow = |what: &str| Error::InvalidInput(format!("bin {} {} overflows", node.index, what));
        Ok(Self {
            id: i32::try_from(node.index).map_err(|_| overflow("id"))?,
            range: node.range,
            start_byte: i64::try_from(node.start_byte).map_err(|_| overflow("start byte"))?,
            record_count: i32::try_from(node.record_count).map_err(|_| overflow("record count"))?,
            subtree_count: i32::try_from(node.subtree_count)
                .map_err(|_| overflow("subtree count"))?,
            parent_id: match node.parent {
                Some(parent) => i32::try_from(parent).map_err(|_| overflow("parent id"))?,
                None => -1,
            },
        })
    }

    pub fn is_terminator(&self) -> bool {
        self.id == TERMINATOR_ID
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.id);
        buf.put_i32(self.range.from);
        buf.put_i32(self.range.to);
        buf.put_i64(self.start_byte);
        buf.put_i32(self.record_count);
        buf.put_i32(self.subtree_count);
        buf.put_i32(self.parent_id);
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; NODE_RECORD_SIZE];
        reader.read_exact(&mut raw).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                Error::Truncated("node run ended before its terminator".to_string())
            }
            _ => Error::Io(e),
        })?;

        let mut buf = &raw[..];
        Ok(Self {
            id: buf.get_i32(),
            range: Range::new(buf.get_i32(), buf.get_i32()),
            start_byte: buf.get_i64(),
            record_count: buf.get_i32(),
            subtree_count: buf.get_i32(),
            parent_id: buf.get_i32(),
        })
    }

    fn into_node(self) -> Result<IntervalTreeNode> {
        let corrupt = |what: &str| Error::Corrupt(format!("bin {} has negative {}", self.id, what));
        Ok(IntervalTreeNode {
            index: self.id as NodeId,
            range: self.range,
            record_count: u32::try_from(self.record_count).map_err(|_| corrupt("record count"))?,
            subtree_count: u32::try_from(self.subtree_count)
                .map_err(|_| corrupt("subtree count"))?,
            start_byte: u64::try_from(self.start_byte).map_err(|_| corrupt("start byte"))?,
            parent: (self.parent_id >= 0).then_some(self.parent_id as NodeId),
            children: Vec::new(),
        })
    }
}

/// Write every live node in id order followed by the terminator. Returns the
/// number of bytes written.
pub fn write_nodes<W: Write>(tree: &IntervalSearchTree, writer: &mut W) -> Result<usize> {
    let mut buf = BytesMut::with_capacity((tree.len() + 1) * NODE_RECORD_SIZE);
    for node in tree.nodes() {
        NodeRecord::from_node(node)?.encode(&mut buf);
    }
    NodeRecord::TERMINATOR.encode(&mut buf);
    writer.write_all(&buf)?;
    Ok(buf.len())
}

/// Read one reference's node run up to its terminator and rebuild the tree.
pub fn read_nodes<R: Read>(reader: &mut R, arity: usize, min_bin_size: i64) -> Result<IntervalSearchTree> {
    let mut records = Vec::new();
    loop {
        let record = NodeRecord::read_from(reader)?;
        if record.is_terminator() {
            break;
        }
        if record.id < 0 {
            return Err(Error::Corrupt(format!("invalid bin id {}", record.id)));
        }
        records.push(record);
    }
    if records.is_empty() {
        return Err(Error::Corrupt(
            "node run holds only a terminator where a root bin was expected".to_string(),
        ));
    }
    records.sort_by_key(|r| r.id);

    // parent id -> child ids, collected before any node is wired up
    let mut children_of: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
    for pair in records.windows(2) {
        if pair[0].id == pair[1].id {
            return Err(Error::Corrupt(format!("duplicate bin id {}", pair[0].id)));
        }
    }
    for record in &records {
        children_of.entry(record.parent_id).or_default().push(record.id);
    }

    let roots = children_of.remove(&-1).unwrap_or_default();
    let root = match roots.as_slice() {
        [root] => *root as NodeId,
        [] => return Err(Error::Corrupt("node run has no root bin".to_string())),
        _ => {
            return Err(Error::Corrupt(format!(
                "node run has {} root bins",
                roots.len()
            )));
        }
    };

    let max_id = records.last().map_or(0, |r| r.id as usize);
    if max_id >= records.len() * MAX_ID_SPARSITY {
        return Err(Error::Corrupt(format!(
            "bin id {} is implausible for {} bins",
            max_id,
            records.len()
        )));
    }
    let mut nodes: Vec<Option<IntervalTreeNode>> = vec![None; max_id + 1];
    for record in records {
        let id = record.id as usize;
        nodes[id] = Some(record.into_node()?);
    }

    for (parent_id, child_ids) in children_of {
        let parent_range = usize::try_from(parent_id)
            .ok()
            .and_then(|id| nodes.get(id))
            .and_then(Option::as_ref)
            .map(|parent| parent.range)
            .ok_or_else(|| Error::Corrupt(format!("bin parent {} does not exist", parent_id)))?;

        let mut wired = Vec::with_capacity(child_ids.len());
        for child_id in child_ids {
            let child = nodes[child_id as usize]
                .as_ref()
                .ok_or_else(|| Error::Corrupt(format!("bin {} vanished", child_id)))?;
            if !parent_range.contains(&child.range) || parent_range == child.range {
                return Err(Error::Corrupt(format!(
                    "bin {} range {} is not strictly inside parent range {}",
                    child_id, child.range, parent_range
                )));
            }
            wired.push((child.range.from, child_id as NodeId));
        }
        wired.sort();
        if let Some(parent) = nodes[parent_id as usize].as_mut() {
            parent.children = wired.into_iter().map(|(_, id)| id).collect();
        }
    }

    let tree = IntervalSearchTree::from_parts(nodes, root, arity, min_bin_size);
    let mut reachable = 0;
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        reachable += 1;
        if let Some(node) = tree.node(id) {
            pending.extend(node.children.iter().copied());
        }
    }
    if reachable != tree.len() {
        return Err(Error::Corrupt(format!(
            "{} of {} bins are unreachable from the root",
            tree.len() - reachable,
            tree.len()
        )));
    }
    Ok(tree)
}
