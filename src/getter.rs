//! Range queries over a bin index.
//!
//! Two filters bound the I/O: a bin is only read when its range intersects
//! the query (and its subtree holds records at all), and each record read from
//! a bin is kept only if its own interval intersects the query, since a bin's
//! range is a superset of its records' intervals.

use crate::codec::{RecordSchema, decode_record};
use crate::index::{IntervalSearchTree, IntervalTreeNode, NodeId};
use crate::source::IntervalRecord;
use crate::types::Range;
use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// Every record in `tree` whose interval intersects `range`, ordered by
/// interval start then end.
pub fn get_records<R: Read + Seek>(
    reader: &mut R,
    tree: &IntervalSearchTree,
    range: Range,
    schema: &RecordSchema,
) -> Result<Vec<IntervalRecord>> {
    let mut records = Vec::new();
    let mut bins_read = 0usize;
    collect(
        reader,
        tree,
        tree.root_id(),
        &range,
        schema,
        &mut records,
        &mut bins_read,
    )?;
    records.sort_by_key(|r| (r.interval.from, r.interval.to));

    tracing::debug!(
        "range {} matched {} records from {} bins",
        range,
        records.len(),
        bins_read
    );
    Ok(records)
}

/// Every record stored directly in bin `id`, without any range filter.
pub fn get_records_in_bin<R: Read + Seek>(
    reader: &mut R,
    tree: &IntervalSearchTree,
    id: NodeId,
    schema: &RecordSchema,
) -> Result<Vec<IntervalRecord>> {
    let node = tree
        .node(id)
        .ok_or_else(|| Error::NotFound(format!("bin {}", id)))?;
    read_bin(reader, node, schema)
}

fn collect<R: Read + Seek>(
    reader: &mut R,
    tree: &IntervalSearchTree,
    id: NodeId,
    range: &Range,
    schema: &RecordSchema,
    out: &mut Vec<IntervalRecord>,
    bins_read: &mut usize,
) -> Result<()> {
    let Some(node) = tree.node(id) else {
        return Ok(());
    };
    if !node.range.intersects(range) {
        return Ok(());
    }

    if node.record_count > 0 {
        *bins_read += 1;
        out.extend(
            read_bin(reader, node, schema)?
                .into_iter()
                .filter(|record| record.interval.intersects(range)),
        );
    }

    for child in &node.children {
        let Some(child_node) = tree.node(*child) else {
            continue;
        };
        if child_node.subtree_count > 0 && child_node.range.intersects(range) {
            collect(reader, tree, *child, range, schema, out, bins_read)?;
        }
    }
    Ok(())
}

fn read_bin<R: Read + Seek>(
    reader: &mut R,
    node: &IntervalTreeNode,
    schema: &RecordSchema,
) -> Result<Vec<IntervalRecord>> {
    reader.seek(SeekFrom::Start(node.start_byte))?;

    let expected = node.record_count as usize;
    let mut records = Vec::with_capacity(expected);
    for _ in 0..expected {
        let values = decode_record(reader, schema.fields())?.ok_or_else(|| {
            Error::Truncated(format!(
                "bin {} ended after {} of {} records",
                node.index,
                records.len(),
                expected
            ))
        })?;
        let interval = schema.interval_of(&values)?;
        records.push(IntervalRecord { interval, values });
    }
    tracing::trace!("read {} records from bin {}", expected, node.index);
    Ok(records)
}
