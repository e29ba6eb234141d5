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

//! Leaf counting and lookup of leaves by index.
//!
//! Each node caches how many leaves and deleted leaves its subtree holds,
//! and where its first ones fall within its parent's subtree. Any change
//! below a node flags it and its ancestors, and the counts are rebuilt top
//! down the next time they are asked for.

use log::trace;

use crate::cache::{CacheStore, ReadFlags};
use crate::error::{Error, Result};
use crate::medium::Medium;

use super::node::NodeFlags;
use super::{NodeId, NodeSource, Tree};

impl<V, S: NodeSource<V>> Tree<V, S> {
    /// Brings the leaf counts of the subtree at `id` up to date, reading
    /// node data and sub-nodes as needed.
    pub fn read_leaf_node_values(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        read_flags: ReadFlags,
    ) -> Result<()> {
        let index = self.index_of(id)?;
        self.count_leaves(medium, cache, index, read_flags).map(|_| ())
    }

    pub fn number_of_leaf_nodes(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        read_flags: ReadFlags,
    ) -> Result<usize> {
        let index = self.index_of(id)?;
        Ok(self.count_leaves(medium, cache, index, read_flags)?.0)
    }

    pub fn number_of_deleted_leaf_nodes(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        read_flags: ReadFlags,
    ) -> Result<usize> {
        let index = self.index_of(id)?;
        Ok(self.count_leaves(medium, cache, index, read_flags)?.1)
    }

    /// The `leaf_index`th non-deleted leaf below `id`, in tree order.
    pub fn leaf_node_by_index(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        leaf_index: usize,
        read_flags: ReadFlags,
    ) -> Result<NodeId> {
        let index = self.index_of(id)?;
        self.find_leaf(medium, cache, index, leaf_index, false, read_flags)
    }

    /// The `leaf_index`th deleted leaf below `id`, in tree order.
    pub fn deleted_leaf_node_by_index(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        leaf_index: usize,
        read_flags: ReadFlags,
    ) -> Result<NodeId> {
        let index = self.index_of(id)?;
        self.find_leaf(medium, cache, index, leaf_index, true, read_flags)
    }

    /// [`Tree::number_of_leaf_nodes`] of the root.
    pub fn leaf_count(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        read_flags: ReadFlags,
    ) -> Result<usize> {
        let root = self.root_node()?;
        self.number_of_leaf_nodes(medium, cache, root, read_flags)
    }

    /// [`Tree::number_of_deleted_leaf_nodes`] of the root.
    pub fn deleted_leaf_count(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        read_flags: ReadFlags,
    ) -> Result<usize> {
        let root = self.root_node()?;
        self.number_of_deleted_leaf_nodes(medium, cache, root, read_flags)
    }

    /// [`Tree::leaf_node_by_index`] from the root.
    pub fn leaf_node(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        leaf_index: usize,
        read_flags: ReadFlags,
    ) -> Result<NodeId> {
        let root = self.root_node()?;
        self.leaf_node_by_index(medium, cache, root, leaf_index, read_flags)
    }

    /// [`Tree::deleted_leaf_node_by_index`] from the root.
    pub fn deleted_leaf_node(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        leaf_index: usize,
        read_flags: ReadFlags,
    ) -> Result<NodeId> {
        let root = self.root_node()?;
        self.deleted_leaf_node_by_index(medium, cache, root, leaf_index, read_flags)
    }

    fn count_leaves(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        index: usize,
        read_flags: ReadFlags,
    ) -> Result<(usize, usize)> {
        let node = self.node_at(index)?;
        if !node.flags.contains(NodeFlags::CALCULATE_LEAF_NODE_VALUES) {
            return Ok(node.leaf_counts());
        }
        // Leaf status is only known once the node's data has been read.
        self.ensure_node_data(medium, cache, index, read_flags)?;
        let node = self.node_at(index)?;
        let counts = if node.is_leaf() {
            if node.is_deleted() {
                (0, 1)
            } else {
                (1, 0)
            }
        } else {
            self.ensure_sub_nodes(medium, cache, index, read_flags)?;
            let children = self.node_at(index)?.sub_nodes.clone();
            let (mut leaves, mut deleted) = (0, 0);
            for child in children.into_iter().flatten() {
                let node = self.node_at_mut(child)?;
                node.first_leaf_node_index = leaves;
                node.first_deleted_leaf_node_index = deleted;
                let (child_leaves, child_deleted) = self.count_leaves(medium, cache, child, read_flags)?;
                leaves += child_leaves;
                deleted += child_deleted;
            }
            (leaves, deleted)
        };
        let node = self.node_at_mut(index)?;
        node.number_of_leaf_nodes = counts.0;
        node.number_of_deleted_leaf_nodes = counts.1;
        node.flags.remove(NodeFlags::CALCULATE_LEAF_NODE_VALUES);
        trace!("node #{} holds {} leaves, {} deleted", index, counts.0, counts.1);
        Ok(counts)
    }

    fn find_leaf(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        index: usize,
        leaf_index: usize,
        deleted: bool,
        read_flags: ReadFlags,
    ) -> Result<NodeId> {
        let (leaves, deleted_leaves) = self.count_leaves(medium, cache, index, read_flags)?;
        let total = if deleted { deleted_leaves } else { leaves };
        if leaf_index >= total {
            let kind = if deleted { "deleted leaf" } else { "leaf" };
            return Err(Error::out_of_bounds(format!("{} node index {}", kind, leaf_index)));
        }
        let mut index = index;
        let mut remaining = leaf_index;
        loop {
            let node = self.node_at(index)?;
            if node.is_leaf() {
                return Ok(self.id_of(index));
            }
            let mut next = None;
            for &child in node.sub_nodes.iter().flatten() {
                let (first, count) = self.node_at(child)?.leaf_window(deleted);
                if remaining >= first && remaining < first + count {
                    next = Some((child, first));
                    break;
                }
            }
            match next {
                Some((child, first)) => {
                    remaining -= first;
                    index = child;
                }
                None => {
                    return Err(Error::missing(format!(
                        "leaf node {} below node {}",
                        leaf_index,
                        self.id_of(index)
                    )))
                }
            }
        }
    }
}
