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

//! Hierarchical indexes whose nodes are read on demand.
//!
//! A [`Tree`] starts out as a single root range. Reading a node's data
//! tells the tree whether the node is a leaf or where its sub-nodes are
//! described, and reading the sub-nodes creates the children. Both happen
//! lazily, the first time something asks for them.

mod leaves;
mod node;
mod sub_nodes;

pub use self::node::{InsertFlags, NodeFlags, TreeNode};
pub use self::sub_nodes::{NodeDescriptor, NodeSource, SubNodes};

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, trace, warn};
use smallvec::{smallvec, SmallVec};

use crate::cache::{Cache, CacheIdentifier, CacheStore, ReadFlags};
use crate::error::{Error, Result};
use crate::medium::Medium;
use crate::range::Range;
use crate::timestamp;

/// Addresses a node of one particular [`Tree`].
///
/// Ids stay valid until the node is freed. An id that outlives its node, or
/// that comes from another tree (clones included), is rejected with
/// [`Error::ForeignNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    tree: u64,
    index: usize,
    generation: u32,
}

impl NodeId {
    /// The arena slot of the node.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    node: Option<TreeNode>,
}

/// The cache slot for a node's value.
///
/// Once there are more than four slots, the first quarter is reserved for
/// branch nodes and the rest for leaves, so walking many leaves does not
/// evict the branches above them.
pub fn node_cache_slot(capacity: usize, offset: i64, is_leaf: bool) -> Result<usize> {
    if capacity == 0 {
        return Err(Error::invalid("cache capacity of zero"));
    }
    if offset < 0 {
        return Err(Error::invalid(format!("node offset {} is negative", offset)));
    }
    let offset = offset as u64;
    let slot = if capacity > 4 {
        let branch_slots = (capacity / 4) as u64;
        if is_leaf {
            branch_slots + offset % (capacity as u64 - branch_slots)
        } else {
            offset % branch_slots
        }
    } else {
        offset % capacity as u64
    };
    Ok(slot as usize)
}

/// A lazily materialized tree of ranges.
///
/// Nodes live in an arena owned by the tree and refer to each other by
/// slot index. Freed slots are reused under a new generation.
#[derive(Debug)]
pub struct Tree<V, S> {
    id: u64,
    slots: Vec<Slot>,
    free: SmallVec<[usize; 8]>,
    root: Option<usize>,
    source: S,
    _value: PhantomData<fn() -> V>,
}

impl<V, S: Clone> Clone for Tree<V, S> {
    fn clone(&self) -> Self {
        Tree {
            id: timestamp::next(),
            slots: self.slots.clone(),
            free: self.free.clone(),
            root: self.root,
            source: self.source.clone(),
            _value: PhantomData,
        }
    }
}

impl<V, S> Tree<V, S> {
    pub fn new(source: S) -> Tree<V, S> {
        Tree {
            id: timestamp::next(),
            slots: Vec::new(),
            free: SmallVec::new(),
            root: None,
            source,
            _value: PhantomData,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The number of live nodes.
    pub fn number_of_nodes(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Replaces the whole tree with a single root node at `range`.
    pub fn set_root_node(&mut self, range: Range) -> NodeId {
        self.clear();
        let index = self.allocate(TreeNode::new(range, None));
        self.root = Some(index);
        self.id_of(index)
    }

    /// Replaces the whole tree with a virtual root, whose sub-nodes are
    /// added with [`Tree::append_sub_node`].
    pub fn set_virtual_root_node(&mut self) -> NodeId {
        self.clear();
        let index = self.allocate(TreeNode::new_virtual(None, None));
        self.root = Some(index);
        self.id_of(index)
    }

    pub fn root_node(&self) -> Result<NodeId> {
        self.root.map(|index| self.id_of(index)).ok_or_else(|| Error::missing("root node"))
    }

    pub fn node(&self, id: NodeId) -> Result<&TreeNode> {
        self.node_at(self.index_of(id)?)
    }

    pub fn parent_node(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent.map(|index| self.id_of(index)))
    }

    /// Moves a node to a new range.
    ///
    /// The node gets a new timestamp, so its cached value no longer
    /// matches, and its data will be read again when next needed.
    pub fn set_node_range(&mut self, id: NodeId, range: Range) -> Result<()> {
        let index = self.index_of(id)?;
        self.node_at_mut(index)?.set_range(range);
        self.mark_leaf_counts_stale(index);
        Ok(())
    }

    pub fn set_sub_nodes_range(&mut self, id: NodeId, range: Range) -> Result<()> {
        let index = self.index_of(id)?;
        self.set_sub_nodes_range_at(index, range)
    }

    pub fn set_leaf(&mut self, id: NodeId) -> Result<()> {
        let index = self.index_of(id)?;
        self.set_leaf_at(index)
    }

    /// Marks a leaf as deleted.
    pub fn set_deleted(&mut self, id: NodeId) -> Result<()> {
        let index = self.index_of(id)?;
        self.set_deleted_at(index)
    }

    /// Grows the sub-node list with holes, or frees trailing subtrees.
    ///
    /// The sub-nodes are then considered read.
    pub fn resize_sub_nodes(&mut self, id: NodeId, number_of_sub_nodes: usize) -> Result<()> {
        let index = self.index_of(id)?;
        self.check_can_have_sub_nodes(index)?;
        let node = self.node_at_mut(index)?;
        let dropped: Vec<usize> = if number_of_sub_nodes < node.sub_nodes.len() {
            node.sub_nodes.drain(number_of_sub_nodes..).flatten().collect()
        } else {
            node.sub_nodes.resize(number_of_sub_nodes, None);
            Vec::new()
        };
        node.flags.insert(NodeFlags::SUB_NODES_READ);
        for child in dropped {
            self.free_subtree(child);
        }
        self.mark_leaf_counts_stale(index);
        Ok(())
    }

    /// Places a new node at `range` in sub-node slot `sub_node_index`,
    /// freeing any subtree that was there.
    pub fn set_sub_node_by_index(
        &mut self,
        id: NodeId,
        sub_node_index: usize,
        range: Range,
    ) -> Result<NodeId> {
        let index = self.index_of(id)?;
        self.check_can_have_sub_nodes(index)?;
        if sub_node_index >= self.node_at(index)?.sub_nodes.len() {
            return Err(Error::out_of_bounds(format!("sub node index {}", sub_node_index)));
        }
        let child = self.allocate(TreeNode::new(range, Some(index)));
        let node = self.node_at_mut(index)?;
        let previous = node.sub_nodes[sub_node_index].replace(child);
        node.flags.insert(NodeFlags::SUB_NODES_READ);
        if let Some(previous) = previous {
            self.free_subtree(previous);
        }
        self.mark_leaf_counts_stale(index);
        Ok(self.id_of(child))
    }

    /// Adds a new node at `range` after the existing sub-nodes.
    pub fn append_sub_node(&mut self, id: NodeId, range: Range) -> Result<(usize, NodeId)> {
        let index = self.index_of(id)?;
        self.check_can_have_sub_nodes(index)?;
        let child = self.allocate(TreeNode::new(range, Some(index)));
        let node = self.node_at_mut(index)?;
        node.sub_nodes.push(Some(child));
        node.flags.insert(NodeFlags::SUB_NODES_READ);
        let position = node.sub_nodes.len() - 1;
        self.mark_leaf_counts_stale(index);
        Ok((position, self.id_of(child)))
    }

    /// Stores a node's value in the cache as if it had been read.
    ///
    /// A virtual node's value is that of its first sub-node.
    pub fn set_node_value(
        &self,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        value: impl Into<Arc<V>>,
    ) -> Result<()> {
        let mut index = self.index_of(id)?;
        while self.node_at(index)?.is_virtual() {
            index = self.first_sub_node_at(index)?;
        }
        self.store_value(cache, index, value.into()).map(|_| ())
    }

    fn clear(&mut self) {
        if let Some(root) = self.root.take() {
            self.free_subtree(root);
        }
    }

    fn id_of(&self, index: usize) -> NodeId {
        NodeId { tree: self.id, index, generation: self.slots[index].generation }
    }

    fn index_of(&self, id: NodeId) -> Result<usize> {
        let live = id.tree == self.id
            && self
                .slots
                .get(id.index)
                .map_or(false, |slot| slot.generation == id.generation && slot.node.is_some());
        if live {
            Ok(id.index)
        } else {
            Err(Error::ForeignNode(id.to_string()))
        }
    }

    fn node_at(&self, index: usize) -> Result<&TreeNode> {
        self.slots
            .get(index)
            .and_then(|slot| slot.node.as_ref())
            .ok_or_else(|| Error::ForeignNode(format!("#{}", index)))
    }

    fn node_at_mut(&mut self, index: usize) -> Result<&mut TreeNode> {
        self.slots
            .get_mut(index)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| Error::ForeignNode(format!("#{}", index)))
    }

    fn allocate(&mut self, node: TreeNode) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(node) });
                self.slots.len() - 1
            }
        }
    }

    /// Frees a single slot, leaving its sub-nodes in place.
    fn release(&mut self, index: usize) -> Option<TreeNode> {
        let slot = self.slots.get_mut(index)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        Some(node)
    }

    fn free_subtree(&mut self, index: usize) {
        let mut pending: SmallVec<[usize; 8]> = smallvec![index];
        while let Some(index) = pending.pop() {
            if let Some(node) = self.release(index) {
                pending.extend(node.sub_nodes.into_iter().flatten());
            }
        }
    }

    /// Flags a node and all of its ancestors for leaf recounting.
    fn mark_leaf_counts_stale(&mut self, index: usize) {
        let mut next = Some(index);
        while let Some(index) = next {
            match self.slots.get_mut(index).and_then(|slot| slot.node.as_mut()) {
                Some(node) => {
                    node.flags.insert(NodeFlags::CALCULATE_LEAF_NODE_VALUES);
                    next = node.parent;
                }
                None => break,
            }
        }
    }

    fn check_can_have_sub_nodes(&self, index: usize) -> Result<()> {
        if self.node_at(index)?.is_leaf() {
            return Err(Error::invalid(format!("leaf node {} cannot have sub nodes", self.id_of(index))));
        }
        Ok(())
    }

    fn set_leaf_at(&mut self, index: usize) -> Result<()> {
        let id = self.id_of(index);
        let node = self.node_at_mut(index)?;
        if node.is_virtual() || node.sub_nodes_range.is_some() || !node.sub_nodes.is_empty() {
            return Err(Error::invalid(format!("node {} has sub nodes and cannot be a leaf", id)));
        }
        node.flags.insert(NodeFlags::IS_LEAF);
        self.mark_leaf_counts_stale(index);
        Ok(())
    }

    fn set_deleted_at(&mut self, index: usize) -> Result<()> {
        let id = self.id_of(index);
        let node = self.node_at_mut(index)?;
        if !node.is_leaf() {
            return Err(Error::invalid(format!("node {} is not a leaf and cannot be deleted", id)));
        }
        node.flags.insert(NodeFlags::IS_DELETED);
        self.mark_leaf_counts_stale(index);
        Ok(())
    }

    fn set_sub_nodes_range_at(&mut self, index: usize, range: Range) -> Result<()> {
        let id = self.id_of(index);
        let node = self.node_at_mut(index)?;
        if node.is_leaf() {
            return Err(Error::invalid(format!("leaf node {} cannot have sub nodes", id)));
        }
        if node.sub_nodes_range == Some(range) {
            return Ok(());
        }
        if node.flags.contains(NodeFlags::SUB_NODES_READ) {
            return Err(Error::AlreadySet(format!("sub nodes of node {}", id)));
        }
        node.set_sub_nodes_range(range);
        Ok(())
    }

    /// Rejects a descriptor that cannot be applied as a whole.
    fn check_descriptor(&self, index: usize, descriptor: &NodeDescriptor) -> Result<()> {
        let id = self.id_of(index);
        let node = self.node_at(index)?;
        let becomes_leaf = descriptor.mark_leaf && !node.is_leaf();
        if let Some(range) = descriptor.new_sub_nodes_range {
            if node.is_leaf() || descriptor.mark_leaf {
                return Err(Error::invalid(format!("leaf node {} cannot have sub nodes", id)));
            }
            if node.sub_nodes_range != Some(range) && node.flags.contains(NodeFlags::SUB_NODES_READ) {
                return Err(Error::AlreadySet(format!("sub nodes of node {}", id)));
            }
        }
        if becomes_leaf && (node.is_virtual() || node.sub_nodes_range.is_some() || !node.sub_nodes.is_empty())
        {
            return Err(Error::invalid(format!("node {} has sub nodes and cannot be a leaf", id)));
        }
        if descriptor.mark_deleted && !node.is_leaf() && !descriptor.mark_leaf {
            return Err(Error::invalid(format!("node {} is not a leaf and cannot be deleted", id)));
        }
        Ok(())
    }

    fn apply_descriptor(&mut self, index: usize, descriptor: &NodeDescriptor) -> Result<()> {
        self.check_descriptor(index, descriptor)?;
        if let Some(range) = descriptor.new_sub_nodes_range {
            self.set_sub_nodes_range_at(index, range)?;
        }
        let flags = self.node_at(index)?.flags;
        if descriptor.mark_leaf && !flags.contains(NodeFlags::IS_LEAF) {
            self.set_leaf_at(index)?;
        }
        if descriptor.mark_deleted && !flags.contains(NodeFlags::IS_DELETED) {
            self.set_deleted_at(index)?;
        }
        Ok(())
    }

    fn first_sub_node_at(&self, index: usize) -> Result<usize> {
        self.node_at(index)?
            .sub_nodes
            .iter()
            .flatten()
            .next()
            .copied()
            .ok_or_else(|| Error::missing(format!("first sub node of node {}", self.id_of(index))))
    }

    fn cache_key(&self, index: usize) -> Result<(i64, bool, CacheIdentifier)> {
        let node = self.node_at(index)?;
        let range =
            node.range.ok_or_else(|| Error::missing(format!("range of node {}", self.id_of(index))))?;
        let identifier = CacheIdentifier::new(range.offset(), node.timestamp);
        Ok((range.offset(), node.is_leaf(), identifier))
    }

    fn store_value(
        &self,
        cache: &mut dyn CacheStore<V>,
        index: usize,
        value: Arc<V>,
    ) -> Result<Arc<V>> {
        let (offset, is_leaf, identifier) = self.cache_key(index)?;
        let slot = node_cache_slot(cache.capacity(), offset, is_leaf)?;
        cache.set_entry(slot, identifier, value)?;
        cache.lookup(slot, identifier)?.ok_or(Error::CacheMiss { slot })
    }
}

impl<V, S: NodeSource<V>> Tree<V, S> {
    /// Returns a node's value, reading the node's data on a cache miss.
    ///
    /// A virtual node's value is that of its first sub-node.
    pub fn get_node_value(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        read_flags: ReadFlags,
    ) -> Result<Arc<V>> {
        let index = self.index_of(id)?;
        self.node_value_at(medium, cache, index, read_flags)
    }

    /// The number of sub-node slots of a node, holes included.
    pub fn number_of_sub_nodes(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        read_flags: ReadFlags,
    ) -> Result<usize> {
        let index = self.index_of(id)?;
        self.ensure_sub_nodes(medium, cache, index, read_flags)?;
        Ok(self.node_at(index)?.sub_nodes.len())
    }

    pub fn sub_node_by_index(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        sub_node_index: usize,
        read_flags: ReadFlags,
    ) -> Result<NodeId> {
        let index = self.index_of(id)?;
        self.ensure_sub_nodes(medium, cache, index, read_flags)?;
        match self.node_at(index)?.sub_nodes.get(sub_node_index) {
            None => Err(Error::out_of_bounds(format!("sub node index {}", sub_node_index))),
            Some(None) => Err(Error::missing(format!("sub node {} of node {}", sub_node_index, id))),
            Some(&Some(child)) => Ok(self.id_of(child)),
        }
    }

    /// Inserts a node at `range` among the sub-nodes of `id`, keeping them
    /// ordered by `compare` on node values.
    ///
    /// The new node goes before the first sub-node that compares greater.
    /// With [`InsertFlags::UNIQUE_ENTRIES`], a sub-node comparing equal
    /// means nothing is inserted and `None` is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_sub_node<F>(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        range: Range,
        mut compare: F,
        insert_flags: InsertFlags,
        read_flags: ReadFlags,
    ) -> Result<Option<(usize, NodeId)>>
    where
        F: FnMut(&V, &V) -> Ordering,
    {
        let parent = self.index_of(id)?;
        self.ensure_sub_nodes(medium, cache, parent, read_flags)?;
        self.check_can_have_sub_nodes(parent)?;
        let candidate = self.allocate(TreeNode::new(range, Some(parent)));
        let position = self.insert_position(
            medium,
            cache,
            parent,
            candidate,
            &mut compare,
            insert_flags,
            read_flags,
        );
        let position = position.and_then(|found| match found {
            Some((position, value)) => {
                self.store_value(cache, candidate, value)?;
                Ok(Some(position))
            }
            None => Ok(None),
        });
        match position {
            Ok(Some(position)) => {
                self.node_at_mut(parent)?.sub_nodes.insert(position, Some(candidate));
                self.mark_leaf_counts_stale(parent);
                Ok(Some((position, self.id_of(candidate))))
            }
            Ok(None) => {
                trace!("node at {} already present under {}", range, id);
                self.free_subtree(candidate);
                Ok(None)
            }
            Err(e) => {
                self.free_subtree(candidate);
                Err(e)
            }
        }
    }

    /// Regroups the sub-nodes of `id` under `number_of_splits` new virtual
    /// nodes, each taking a contiguous run.
    ///
    /// Runs are as even as possible, with the earlier runs one longer. If
    /// some run holds only holes, the node is left exactly as it was.
    pub fn split_sub_nodes(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        id: NodeId,
        number_of_splits: usize,
    ) -> Result<()> {
        let index = self.index_of(id)?;
        self.ensure_sub_nodes(medium, cache, index, ReadFlags::empty())?;
        let children = self.node_at(index)?.sub_nodes.clone();
        if number_of_splits == 0 || number_of_splits > children.len() {
            return Err(Error::invalid(format!(
                "cannot split {} sub nodes into {} runs",
                children.len(),
                number_of_splits
            )));
        }
        let mut created = Vec::with_capacity(number_of_splits);
        if let Err(e) = self.group_runs(index, &children, number_of_splits, &mut created) {
            warn!("split of node {} failed, rolling back: {}", id, e);
            for virtual_index in created {
                let members = self.release(virtual_index).map(|node| node.sub_nodes).unwrap_or_default();
                for member in members.into_iter().flatten() {
                    if let Ok(member) = self.node_at_mut(member) {
                        member.parent = Some(index);
                    }
                }
            }
            return Err(e);
        }
        debug!("split {} sub nodes of node {} into {} runs", children.len(), id, number_of_splits);
        self.node_at_mut(index)?.sub_nodes = created.into_iter().map(Some).collect();
        self.mark_leaf_counts_stale(index);
        Ok(())
    }

    fn group_runs(
        &mut self,
        parent: usize,
        children: &[Option<usize>],
        number_of_splits: usize,
        created: &mut Vec<usize>,
    ) -> Result<()> {
        let run_size = children.len() / number_of_splits;
        let longer_runs = children.len() % number_of_splits;
        let mut start = 0;
        for run in 0..number_of_splits {
            let end = start + run_size + usize::from(run < longer_runs);
            let members = &children[start..end];
            let first = members.iter().flatten().next().copied().ok_or_else(|| {
                Error::missing(format!("sub nodes in run {} of {}", run, number_of_splits))
            })?;
            let mut group = TreeNode::new_virtual(self.node_at(first)?.range, Some(parent));
            group.sub_nodes = members.to_vec();
            let group_index = self.allocate(group);
            created.push(group_index);
            for &member in members.iter().flatten() {
                self.node_at_mut(member)?.parent = Some(group_index);
            }
            start = end;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_position(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        parent: usize,
        candidate: usize,
        compare: &mut dyn FnMut(&V, &V) -> Ordering,
        insert_flags: InsertFlags,
        read_flags: ReadFlags,
    ) -> Result<Option<(usize, Arc<V>)>> {
        let mut scratch: Cache<V> = Cache::new(1)?;
        let value = self.node_value_at(medium, &mut scratch, candidate, read_flags)?;
        let children = self.node_at(parent)?.sub_nodes.clone();
        for (position, child) in children.iter().enumerate() {
            let child = match *child {
                Some(child) => child,
                None => continue,
            };
            let existing = self.node_value_at(medium, cache, child, read_flags)?;
            match compare(&*value, &*existing) {
                Ordering::Less => return Ok(Some((position, value))),
                Ordering::Equal if insert_flags.contains(InsertFlags::UNIQUE_ENTRIES) => {
                    return Ok(None)
                }
                _ => {}
            }
        }
        Ok(Some((children.len(), value)))
    }

    fn node_value_at(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        index: usize,
        read_flags: ReadFlags,
    ) -> Result<Arc<V>> {
        if self.node_at(index)?.is_virtual() {
            let first = self.first_sub_node_at(index)?;
            return self.node_value_at(medium, cache, first, read_flags);
        }
        if !read_flags.contains(ReadFlags::IGNORE_CACHE) {
            let (offset, is_leaf, identifier) = self.cache_key(index)?;
            let slot = node_cache_slot(cache.capacity(), offset, is_leaf)?;
            if let Some(value) = cache.lookup(slot, identifier)? {
                trace!("cache hit {} in slot {}", identifier, slot);
                return Ok(value);
            }
        }
        let value = self.read_node_data_at(medium, index, read_flags)?;
        // Reading may have just made the node a leaf, which moves its slot.
        self.store_value(cache, index, Arc::new(value))
    }

    fn read_node_data_at(
        &mut self,
        medium: &mut dyn Medium,
        index: usize,
        read_flags: ReadFlags,
    ) -> Result<V> {
        let id = self.id_of(index);
        let mut descriptor = NodeDescriptor::new(id, self.node_at(index)?);
        debug!("reading data of node {}", id);
        let value = self.source.read_node_data(medium, &mut descriptor, read_flags)?;
        self.apply_descriptor(index, &descriptor)?;
        self.node_at_mut(index)?.flags.insert(NodeFlags::NODE_DATA_READ);
        Ok(value)
    }

    fn ensure_node_data(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        index: usize,
        read_flags: ReadFlags,
    ) -> Result<()> {
        let node = self.node_at(index)?;
        if node.is_virtual() || node.flags.contains(NodeFlags::NODE_DATA_READ) {
            return Ok(());
        }
        let value = self.read_node_data_at(medium, index, read_flags)?;
        self.store_value(cache, index, Arc::new(value))?;
        Ok(())
    }

    fn ensure_sub_nodes(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        index: usize,
        read_flags: ReadFlags,
    ) -> Result<()> {
        if self.node_at(index)?.flags.contains(NodeFlags::SUB_NODES_READ) {
            return Ok(());
        }
        self.ensure_node_data(medium, cache, index, read_flags)?;
        let id = self.id_of(index);
        let node = self.node_at(index)?;
        if node.sub_nodes_range.is_some() {
            let descriptor = NodeDescriptor::new(id, node);
            let mut sub_nodes = SubNodes::new();
            debug!("reading sub nodes of node {}", id);
            self.source.read_sub_nodes(medium, &descriptor, &mut sub_nodes, read_flags)?;
            let mut children = Vec::with_capacity(sub_nodes.len());
            for entry in sub_nodes.into_entries() {
                children.push(entry.map(|entry| {
                    let mut child = TreeNode::new(entry.range, Some(index));
                    if entry.is_leaf {
                        child.flags.insert(NodeFlags::IS_LEAF);
                    }
                    self.allocate(child)
                }));
            }
            self.node_at_mut(index)?.sub_nodes = children;
        }
        self.node_at_mut(index)?.flags.insert(NodeFlags::SUB_NODES_READ);
        self.mark_leaf_counts_stale(index);
        Ok(())
    }
}
