// Copyright 2026 The lazy-index Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared fixtures for unit tests.

use std::cell::Cell;
use std::io::Cursor;
use std::sync::Once;

use crate::cache::ReadFlags;
use crate::error::{Error, Result};
use crate::list::ElementSource;
use crate::medium::{read_range, Medium};
use crate::range::{Range, RangeFlags};
use crate::tree::{NodeDescriptor, NodeSource, SubNodes};
use crate::vector::VectorSource;

/// A medium where byte `i` holds `i % 256`.
pub(crate) fn patterned_medium(len: usize) -> Cursor<Vec<u8>> {
    Cursor::new((0..len).map(|i| (i % 256) as u8).collect())
}

/// Reads raw bytes and counts how often it was asked to.
#[derive(Clone, Debug, Default)]
pub(crate) struct CountingReader {
    reads: Cell<usize>,
}

impl CountingReader {
    pub(crate) fn reads(&self) -> usize {
        self.reads.get()
    }

    fn bump(&self) {
        self.reads.set(self.reads.get() + 1);
    }
}

impl ElementSource<Vec<u8>> for CountingReader {
    fn read_element_data(
        &self,
        medium: &mut dyn Medium,
        _element_index: usize,
        range: &Range,
        _read_flags: ReadFlags,
    ) -> Result<Vec<u8>> {
        self.bump();
        read_range(medium, range)
    }
}

impl VectorSource<Vec<u8>> for CountingReader {
    fn read_element_data(
        &self,
        medium: &mut dyn Medium,
        _element_index: usize,
        offset: i64,
        element_size: u64,
        range_flags: RangeFlags,
        _read_flags: ReadFlags,
    ) -> Result<Vec<u8>> {
        self.bump();
        read_range(medium, &Range::new(offset, element_size, range_flags)?)
    }
}

/// Size of a node record in [`tree_medium`].
pub(crate) const RECORD_SIZE: u64 = 8;

/// A child offset that leaves a hole in the sub-node list.
pub(crate) const HOLE: u8 = 0xff;

/// Lays out node records of `(offset, kind, value, children)`.
///
/// A record is the kind byte (`B`ranch, `L`eaf or `D`eleted leaf), the
/// value byte, the child count and up to five child record offsets.
pub(crate) fn tree_medium(records: &[(u8, u8, u8, &[u8])]) -> Cursor<Vec<u8>> {
    let len = records.iter().map(|r| r.0 as usize + RECORD_SIZE as usize).max().unwrap_or(0);
    let mut data = vec![0u8; len];
    for &(offset, kind, value, children) in records {
        let offset = offset as usize;
        data[offset] = kind;
        data[offset + 1] = value;
        data[offset + 2] = children.len() as u8;
        data[offset + 3..offset + 3 + children.len()].copy_from_slice(children);
    }
    Cursor::new(data)
}

/// The range of the record at `offset`.
pub(crate) fn record(offset: u8) -> Range {
    Range::new(i64::from(offset), RECORD_SIZE, RangeFlags::empty()).unwrap()
}

/// Decodes [`tree_medium`] records, counting node and sub-node reads.
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordSource {
    node_reads: Cell<usize>,
    sub_node_reads: Cell<usize>,
}

impl RecordSource {
    pub(crate) fn node_reads(&self) -> usize {
        self.node_reads.get()
    }

    pub(crate) fn sub_node_reads(&self) -> usize {
        self.sub_node_reads.get()
    }
}

impl NodeSource<u8> for RecordSource {
    fn read_node_data(
        &self,
        medium: &mut dyn Medium,
        node: &mut NodeDescriptor,
        _read_flags: ReadFlags,
    ) -> Result<u8> {
        self.node_reads.set(self.node_reads.get() + 1);
        let range = *node.range().ok_or_else(|| Error::missing("node range"))?;
        let data = read_range(medium, &range)?;
        match data[0] {
            b'L' => node.set_leaf(),
            b'D' => node.set_deleted(),
            _ if data[2] > 0 => node.set_sub_nodes_range(Range::new(
                range.offset() + 3,
                u64::from(data[2]),
                RangeFlags::empty(),
            )?),
            _ => {}
        }
        Ok(data[1])
    }

    fn read_sub_nodes(
        &self,
        medium: &mut dyn Medium,
        node: &NodeDescriptor,
        sub_nodes: &mut SubNodes,
        _read_flags: ReadFlags,
    ) -> Result<()> {
        self.sub_node_reads.set(self.sub_node_reads.get() + 1);
        let range = *node.sub_nodes_range().ok_or_else(|| Error::missing("sub nodes range"))?;
        for offset in read_range(medium, &range)? {
            if offset == HOLE {
                sub_nodes.resize(sub_nodes.len() + 1);
            } else {
                sub_nodes.append(record(offset));
            }
        }
        Ok(())
    }
}

static LOGGING: Once = Once::new();

/// Routes `log` output to stderr at trace level, once per test binary.
pub(crate) fn init_logging() {
    LOGGING.call_once(|| {
        let _ = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!("[{}][{}] {}", record.level(), record.target(), message))
            })
            .level(log::LevelFilter::Trace)
            .chain(std::io::stderr())
            .apply();
    });
}
