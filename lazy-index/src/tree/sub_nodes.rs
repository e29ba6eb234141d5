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

//! The callback interface through which a tree learns its shape.

use crate::cache::ReadFlags;
use crate::error::{Error, Result};
use crate::medium::Medium;
use crate::range::Range;

use super::node::{NodeFlags, TreeNode};
use super::NodeId;

/// Reads tree nodes from a medium.
pub trait NodeSource<V> {
    /// Produces the value of a node.
    ///
    /// This is also where the node's shape is discovered: the callback
    /// may mark the node as a leaf or deleted leaf, or give it a sub-nodes
    /// range, through `node`. The tree validates and applies those changes
    /// after the callback returns.
    fn read_node_data(
        &self,
        medium: &mut dyn Medium,
        node: &mut NodeDescriptor,
        read_flags: ReadFlags,
    ) -> Result<V>;

    /// Lists the children of a node that has a sub-nodes range.
    fn read_sub_nodes(
        &self,
        medium: &mut dyn Medium,
        node: &NodeDescriptor,
        sub_nodes: &mut SubNodes,
        read_flags: ReadFlags,
    ) -> Result<()>;
}

/// A snapshot of a node handed to [`NodeSource`] callbacks, with room for
/// the changes the callback requests.
#[derive(Clone, Debug)]
pub struct NodeDescriptor {
    id: NodeId,
    range: Option<Range>,
    sub_nodes_range: Option<Range>,
    flags: NodeFlags,
    pub(crate) mark_leaf: bool,
    pub(crate) mark_deleted: bool,
    pub(crate) new_sub_nodes_range: Option<Range>,
}

impl NodeDescriptor {
    pub(crate) fn new(id: NodeId, node: &TreeNode) -> NodeDescriptor {
        NodeDescriptor {
            id,
            range: node.range,
            sub_nodes_range: node.sub_nodes_range,
            flags: node.flags,
            mark_leaf: false,
            mark_deleted: false,
            new_sub_nodes_range: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn range(&self) -> Option<&Range> {
        self.range.as_ref()
    }

    /// The sub-nodes range, including one requested by this callback.
    pub fn sub_nodes_range(&self) -> Option<&Range> {
        self.new_sub_nodes_range.as_ref().or(self.sub_nodes_range.as_ref())
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_leaf(&self) -> bool {
        self.mark_leaf || self.flags.contains(NodeFlags::IS_LEAF)
    }

    pub fn is_deleted(&self) -> bool {
        self.mark_deleted || self.flags.contains(NodeFlags::IS_DELETED)
    }

    pub fn set_leaf(&mut self) {
        self.mark_leaf = true;
    }

    /// Marks the node as a deleted leaf.
    pub fn set_deleted(&mut self) {
        self.mark_leaf = true;
        self.mark_deleted = true;
    }

    pub fn set_sub_nodes_range(&mut self, range: Range) {
        self.new_sub_nodes_range = Some(range);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SubNodeEntry {
    pub(crate) range: Range,
    pub(crate) is_leaf: bool,
}

/// Collects the children reported by [`NodeSource::read_sub_nodes`].
///
/// Entries never set remain holes in the node's sub-node list.
#[derive(Clone, Debug, Default)]
pub struct SubNodes {
    entries: Vec<Option<SubNodeEntry>>,
}

impl SubNodes {
    pub fn new() -> SubNodes {
        SubNodes::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, range: Range) -> usize {
        self.entries.push(Some(SubNodeEntry { range, is_leaf: false }));
        self.entries.len() - 1
    }

    /// Appends a child already known to be a leaf.
    pub fn append_leaf(&mut self, range: Range) -> usize {
        self.entries.push(Some(SubNodeEntry { range, is_leaf: true }));
        self.entries.len() - 1
    }

    /// Grows the list with holes, or drops trailing entries.
    pub fn resize(&mut self, number_of_sub_nodes: usize) {
        self.entries.resize(number_of_sub_nodes, None);
    }

    pub fn set(&mut self, sub_node_index: usize, range: Range) -> Result<()> {
        let entry = self
            .entries
            .get_mut(sub_node_index)
            .ok_or_else(|| Error::out_of_bounds(format!("sub node index {}", sub_node_index)))?;
        *entry = Some(SubNodeEntry { range, is_leaf: false });
        Ok(())
    }

    pub(crate) fn into_entries(self) -> Vec<Option<SubNodeEntry>> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::RangeFlags;

    fn range(offset: i64) -> Range {
        Range::new(offset, 8, RangeFlags::empty()).unwrap()
    }

    #[test]
    fn sub_nodes_keep_holes() {
        let mut sub_nodes = SubNodes::new();
        sub_nodes.append(range(0));
        sub_nodes.resize(3);
        sub_nodes.set(2, range(16)).unwrap();
        assert!(sub_nodes.set(3, range(24)).is_err());
        assert_eq!(sub_nodes.append_leaf(range(32)), 3);

        let entries = sub_nodes.into_entries();
        assert_eq!(entries.len(), 4);
        assert!(entries[1].is_none());
        assert_eq!(entries[2].map(|e| e.range.offset()), Some(16));
        assert_eq!(entries[3].map(|e| e.is_leaf), Some(true));
    }
}
