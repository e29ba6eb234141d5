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

//! Per-node state of a [`Tree`](super::Tree).

use bitflags::bitflags;

use crate::range::Range;
use crate::timestamp::{self, Timestamp};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// The node has no data of its own and groups other nodes.
        const IS_VIRTUAL = 0x01;
        const IS_LEAF = 0x02;
        /// Only meaningful together with `IS_LEAF`.
        const IS_DELETED = 0x04;
        const NODE_DATA_READ = 0x08;
        const SUB_NODES_READ = 0x10;
        const SUB_NODES_RANGE_SET = 0x20;
        /// The cached leaf counts of this node are out of date.
        const CALCULATE_LEAF_NODE_VALUES = 0x40;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InsertFlags: u8 {
        /// Refuse to insert a node that compares equal to an existing one.
        const UNIQUE_ENTRIES = 0x01;
    }
}

/// A node in the tree arena.
///
/// # Invariants:
/// - A leaf has neither a sub-nodes range nor sub-nodes.
/// - `IS_DELETED` implies `IS_LEAF`.
/// - `SUB_NODES_RANGE_SET` is set exactly when `sub_nodes_range` is `Some`.
/// - Every non-virtual node has a range.
#[derive(Clone, Debug)]
pub struct TreeNode {
    pub(crate) range: Option<Range>,
    pub(crate) sub_nodes_range: Option<Range>,
    pub(crate) parent: Option<usize>,
    pub(crate) sub_nodes: Vec<Option<usize>>,
    pub(crate) timestamp: Timestamp,
    pub(crate) flags: NodeFlags,
    pub(crate) number_of_leaf_nodes: usize,
    pub(crate) number_of_deleted_leaf_nodes: usize,
    pub(crate) first_leaf_node_index: usize,
    pub(crate) first_deleted_leaf_node_index: usize,
}

impl TreeNode {
    pub(crate) fn new(range: Range, parent: Option<usize>) -> TreeNode {
        TreeNode::with_flags(Some(range), parent, NodeFlags::empty())
    }

    /// A node whose sub-nodes are managed by hand.
    pub(crate) fn new_virtual(range: Option<Range>, parent: Option<usize>) -> TreeNode {
        TreeNode::with_flags(range, parent, NodeFlags::IS_VIRTUAL | NodeFlags::SUB_NODES_READ)
    }

    fn with_flags(range: Option<Range>, parent: Option<usize>, flags: NodeFlags) -> TreeNode {
        TreeNode {
            range,
            sub_nodes_range: None,
            parent,
            sub_nodes: Vec::new(),
            timestamp: timestamp::next(),
            flags: flags | NodeFlags::CALCULATE_LEAF_NODE_VALUES,
            number_of_leaf_nodes: 0,
            number_of_deleted_leaf_nodes: 0,
            first_leaf_node_index: 0,
            first_deleted_leaf_node_index: 0,
        }
    }

    /// The node's own range. Virtual roots have none.
    #[inline]
    pub fn range(&self) -> Option<&Range> {
        self.range.as_ref()
    }

    #[inline]
    pub fn sub_nodes_range(&self) -> Option<&Range> {
        self.sub_nodes_range.as_ref()
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    #[inline]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.flags.contains(NodeFlags::IS_LEAF)
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(NodeFlags::IS_VIRTUAL)
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(NodeFlags::IS_DELETED)
    }

    /// The number of sub-node slots currently materialized, holes included.
    pub fn number_of_loaded_sub_nodes(&self) -> usize {
        self.sub_nodes.len()
    }

    /// Cached `(leaf, deleted leaf)` counts of the subtree.
    ///
    /// Only meaningful when `CALCULATE_LEAF_NODE_VALUES` is clear.
    pub fn leaf_counts(&self) -> (usize, usize) {
        (self.number_of_leaf_nodes, self.number_of_deleted_leaf_nodes)
    }

    /// Index of this subtree's first leaf and first deleted leaf, counted
    /// within the parent's subtree.
    pub fn first_leaf_indices(&self) -> (usize, usize) {
        (self.first_leaf_node_index, self.first_deleted_leaf_node_index)
    }

    pub(crate) fn set_range(&mut self, range: Range) {
        self.range = Some(range);
        self.timestamp = timestamp::next();
        self.flags.remove(NodeFlags::NODE_DATA_READ);
    }

    pub(crate) fn set_sub_nodes_range(&mut self, range: Range) {
        self.sub_nodes_range = Some(range);
        self.flags.insert(NodeFlags::SUB_NODES_RANGE_SET);
    }

    /// The window of leaf indices, or deleted leaf indices, this node covers
    /// within its parent.
    pub(crate) fn leaf_window(&self, deleted: bool) -> (usize, usize) {
        if deleted {
            (self.first_deleted_leaf_node_index, self.number_of_deleted_leaf_nodes)
        } else {
            (self.first_leaf_node_index, self.number_of_leaf_nodes)
        }
    }
}
