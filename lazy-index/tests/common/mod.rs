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

//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Once;

use lazy_index::{
    read_range, Error, Medium, NodeDescriptor, NodeSource, Range, RangeFlags, ReadFlags, Result,
    SubNodes,
};

static LOGGING: Once = Once::new();

pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!("[{}][{}] {}", record.level(), record.target(), message))
            })
            .level(log::LevelFilter::Debug)
            .chain(std::io::stderr())
            .apply();
    });
}

/// An anonymous temporary file holding `data`, positioned at the start.
pub fn file_medium(data: &[u8]) -> File {
    let mut file = tempfile::tempfile().expect("create temp file");
    file.write_all(data).expect("write temp file");
    file.seek(SeekFrom::Start(0)).expect("rewind temp file");
    file
}

pub fn range(offset: i64, size: u64) -> Range {
    Range::new(offset, size, RangeFlags::empty()).expect("valid range")
}

/// Builds the little node format read by [`IndexNodes`].
///
/// A node is a 16-byte header: a kind byte (`b'B'`, `b'L'` or `b'D'`),
/// three padding bytes, a little-endian `u32` key, and a little-endian
/// `u32` offset and `u32` count of its child table. The child table is a
/// run of little-endian `u32` node offsets.
#[derive(Default)]
pub struct IndexWriter {
    data: Vec<u8>,
}

pub const HEADER_SIZE: u64 = 16;

impl IndexWriter {
    /// Appends a leaf and returns its offset.
    pub fn leaf(&mut self, key: u32, deleted: bool) -> u32 {
        self.node(if deleted { b'D' } else { b'L' }, key, 0, 0)
    }

    /// Appends a branch over `children` and returns its offset.
    pub fn branch(&mut self, key: u32, children: &[u32]) -> u32 {
        let table = self.data.len() as u32;
        for child in children {
            self.data.extend_from_slice(&child.to_le_bytes());
        }
        self.node(b'B', key, table, children.len() as u32)
    }

    fn node(&mut self, kind: u8, key: u32, table: u32, count: u32) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(&[kind, 0, 0, 0]);
        self.data.extend_from_slice(&key.to_le_bytes());
        self.data.extend_from_slice(&table.to_le_bytes());
        self.data.extend_from_slice(&count.to_le_bytes());
        offset
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Reads nodes written by [`IndexWriter`]. A node's value is its key.
#[derive(Clone, Copy, Debug, Default)]
pub struct IndexNodes;

impl NodeSource<u32> for IndexNodes {
    fn read_node_data(
        &self,
        medium: &mut dyn Medium,
        node: &mut NodeDescriptor,
        _read_flags: ReadFlags,
    ) -> Result<u32> {
        let range = *node.range().ok_or_else(|| Error::Missing("node range".into()))?;
        let header = read_range(medium, &range)?;
        if header.len() as u64 != HEADER_SIZE {
            return Err(Error::InvalidArgument(format!("node header of {} bytes", header.len())));
        }
        match header[0] {
            b'L' => node.set_leaf(),
            b'D' => node.set_deleted(),
            b'B' => {
                let table = le_u32(&header[8..12]);
                let count = le_u32(&header[12..16]);
                node.set_sub_nodes_range(Range::new(
                    i64::from(table),
                    u64::from(count) * 4,
                    RangeFlags::empty(),
                )?);
            }
            kind => return Err(Error::InvalidArgument(format!("node kind {:#x}", kind))),
        }
        Ok(le_u32(&header[4..8]))
    }

    fn read_sub_nodes(
        &self,
        medium: &mut dyn Medium,
        node: &NodeDescriptor,
        sub_nodes: &mut SubNodes,
        _read_flags: ReadFlags,
    ) -> Result<()> {
        let table = *node.sub_nodes_range().ok_or_else(|| Error::Missing("child table".into()))?;
        for entry in read_range(medium, &table)?.chunks(4) {
            sub_nodes.append(Range::new(i64::from(le_u32(entry)), HEADER_SIZE, RangeFlags::empty())?);
        }
        Ok(())
    }
}
