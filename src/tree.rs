/* Generic tree structures for storage of spatial data.
Copyright (C) 2023  Alexander Pyattaev

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Contains the dynamic quad tree, whose nodes are explicitly materialized in an arena

use crate::coords::*;
use crate::error::StructuralError;
use arrayvec::ArrayVec;
use slab::Slab;
use std::num::NonZeroU32;

/// Index of a node inside the tree arena.
pub type NodeIdx = usize;

/// Type for relative pointers to child nodes. Kept 32bit for cache locality during lookups.
/// Children can't be the root (index 0), so we can use Some and NonZero for slightly more compact memory.
pub type NodePtr = Option<NonZeroU32>;

/// The root is always the first node inserted into the arena.
pub const ROOT: NodeIdx = 0;

/// Node of a dynamic quad tree.
/// Ownership flows from the root to the leaves through `descendants`,
/// `ancestor` is a plain back-reference and never owns anything.
#[derive(Clone, Debug)]
pub struct DynamicQuadTreeNode<T> {
    data: T,
    /// children in sibling order: left-bottom, right-bottom, left-top, right-top
    descendants: [NodePtr; MAX_CHILDREN],
    ancestor: Option<u32>,
    pos: QuadTreeNodeLocation,
    /// unique per insertion, tells a recycled arena slot from the node that used to live there
    stamp: u64,
    /// floating nodes created for this node and not yet attached or discarded
    pending: Vec<NodeIdx>,
}

impl<T> DynamicQuadTreeNode<T> {
    fn new(data: T, ancestor: Option<u32>, pos: QuadTreeNodeLocation, stamp: u64) -> Self {
        Self {
            data,
            descendants: [None; MAX_CHILDREN],
            ancestor,
            pos,
            stamp,
            pending: Vec::new(),
        }
    }

    #[inline]
    pub fn data(&self) -> &T {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// parent node, None for the root
    #[inline]
    pub fn ancestor(&self) -> Option<NodeIdx> {
        self.ancestor.map(|a| a as NodeIdx)
    }

    /// the four child slots, all None for a leaf
    #[inline]
    pub fn descendants(&self) -> [Option<NodeIdx>; MAX_CHILDREN] {
        self.descendants.map(|d| d.map(|d| d.get() as NodeIdx))
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.descendants.iter().all(Option::is_none)
    }

    #[inline]
    pub fn location(&self) -> QuadTreeNodeLocation {
        self.pos
    }
}

/// Four nodes created for `parent` but not yet linked into it.
///
/// They live in the arena and can be edited, and can receive descendants of their own,
/// before the whole candidate subtree is made visible by [`DynamicQuadTree::attach`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use = "floating descendants must be attached or discarded"]
pub struct FloatingDescendants {
    parent: NodeIdx,
    parent_stamp: u64,
    nodes: [NodeIdx; MAX_CHILDREN],
    stamps: [u64; MAX_CHILDREN],
}

impl FloatingDescendants {
    /// node the set was created for
    #[inline]
    pub fn parent(&self) -> NodeIdx {
        self.parent
    }

    /// nodes in sibling order
    #[inline]
    pub fn nodes(&self) -> [NodeIdx; MAX_CHILDREN] {
        self.nodes
    }
}

/// Quad tree with explicitly materialized nodes, stored in a slab arena.
///
/// Subtrees are grown with a two-phase protocol: [`DynamicQuadTree::make_floating_children`]
/// allocates four unattached children, and [`DynamicQuadTree::attach`] links them in one
/// step once the caller is done preparing them. Mutation needs `&mut self`, so publishing
/// to other threads has to go through whatever synchronization owns the tree.
#[derive(Clone, Debug)]
pub struct DynamicQuadTree<T> {
    /// All nodes of the Tree, attached or floating
    nodes: Slab<DynamicQuadTreeNode<T>>,
    /// Scratch stack for subtree destruction, kept around to avoid allocating every time
    work_stack: Vec<(NodeIdx, bool)>,
    /// stamp handed to the next inserted node
    next_stamp: u64,
}

impl<T> DynamicQuadTree<T> {
    /// creates a tree holding only the root
    pub fn new(root_data: T) -> Self {
        Self::with_capacity(1, root_data)
    }

    /// create a tree with preallocated memory for nodes
    pub fn with_capacity(nodes_capacity: usize, root_data: T) -> Self {
        let mut tree = Self {
            nodes: Slab::with_capacity(nodes_capacity.max(1)),
            work_stack: Vec::new(),
            next_stamp: 0,
        };
        let r = tree.insert_node(root_data, None, QuadTreeNodeLocation::root());
        debug_assert_eq!(r, ROOT);
        tree
    }

    fn insert_node(&mut self, data: T, ancestor: Option<u32>, pos: QuadTreeNodeLocation) -> NodeIdx {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.nodes.insert(DynamicQuadTreeNode::new(data, ancestor, pos, stamp))
    }

    /// whether `id` still holds the node that was stamped with `stamp`
    #[inline]
    fn is_live(&self, id: NodeIdx, stamp: u64) -> bool {
        self.nodes.get(id).is_some_and(|n| n.stamp == stamp)
    }

    /// number of nodes in the arena, floating ones included
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// a tree always has its root
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, id: NodeIdx) -> bool {
        self.nodes.contains(id)
    }

    #[inline]
    pub fn node(&self, id: NodeIdx) -> Option<&DynamicQuadTreeNode<T>> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeIdx) -> Option<&mut DynamicQuadTreeNode<T>> {
        self.nodes.get_mut(id)
    }

    #[inline]
    pub fn ancestor(&self, id: NodeIdx) -> Option<NodeIdx> {
        self.nodes[id].ancestor()
    }

    #[inline]
    pub fn descendants(&self, id: NodeIdx) -> [Option<NodeIdx>; MAX_CHILDREN] {
        self.nodes[id].descendants()
    }

    #[inline]
    pub fn location(&self, id: NodeIdx) -> QuadTreeNodeLocation {
        self.nodes[id].pos
    }

    #[inline]
    pub fn set_location(&mut self, id: NodeIdx, pos: QuadTreeNodeLocation) {
        self.nodes[id].pos = pos;
    }

    /// Allocates four children for `parent` without linking them.
    /// Their locations follow the parent's, their data comes from `data_creator`.
    pub fn make_floating_children<V>(
        &mut self,
        parent: NodeIdx,
        mut data_creator: V,
    ) -> Result<FloatingDescendants, StructuralError>
    where
        V: FnMut(QuadTreeNodeLocation) -> T,
    {
        let parent_node = self
            .nodes
            .get(parent)
            .ok_or(StructuralError::StaleNode(parent))?;
        let parent_pos = parent_node.pos;
        let parent_stamp = parent_node.stamp;
        let mut nodes = [ROOT; MAX_CHILDREN];
        let mut stamps = [0; MAX_CHILDREN];
        for (sibling, (slot, stamp)) in nodes.iter_mut().zip(stamps.iter_mut()).enumerate() {
            let pos = parent_pos.child(sibling);
            *slot = self.insert_node(data_creator(pos), Some(parent as u32), pos);
            *stamp = self.nodes[*slot].stamp;
        }
        // the parent owns them until they are attached or discarded
        self.nodes[parent].pending.extend_from_slice(&nodes);
        log::trace!("Created floating descendants {nodes:?} for node {parent}");
        Ok(FloatingDescendants {
            parent,
            parent_stamp,
            nodes,
            stamps,
        })
    }

    /// Links a floating set into its parent.
    ///
    /// Fails without touching the tree if the parent already has descendants,
    /// if the set was made for another node, or if the parent or any node of the set is gone.
    /// A node counts as gone even when its arena slot has since been reused.
    pub fn attach(
        &mut self,
        parent: NodeIdx,
        floating: FloatingDescendants,
    ) -> Result<(), StructuralError> {
        let parent_node = self
            .nodes
            .get(parent)
            .ok_or(StructuralError::StaleNode(parent))?;
        if floating.parent != parent {
            return Err(StructuralError::ForeignDescendants {
                expected: floating.parent,
                parent,
                rejected: floating,
            });
        }
        if parent_node.stamp != floating.parent_stamp {
            return Err(StructuralError::StaleNode(parent));
        }
        if !parent_node.is_leaf() {
            return Err(StructuralError::AlreadyAttached {
                parent,
                rejected: floating,
            });
        }
        let parent_pos = parent_node.pos;
        for (sibling, (&id, &stamp)) in floating.nodes.iter().zip(&floating.stamps).enumerate() {
            match self.nodes.get(id) {
                Some(n)
                    if n.stamp == stamp
                        && n.ancestor() == Some(parent)
                        && n.pos == parent_pos.child(sibling) => {}
                _ => return Err(StructuralError::StaleNode(id)),
            }
        }

        let node = &mut self.nodes[parent];
        for (slot, &id) in node.descendants.iter_mut().zip(floating.nodes.iter()) {
            // the root never floats, so every id is nonzero
            *slot = NonZeroU32::new(id as u32);
        }
        debug_assert!(node.descendants.iter().all(Option::is_some));
        node.pending.retain(|id| !floating.nodes.contains(id));
        Ok(())
    }

    /// Releases a floating set that will not be attached, together with anything built under it.
    /// Nodes of the set that were already released, or whose slots were reused, are left alone.
    pub fn discard_floating(&mut self, floating: FloatingDescendants) -> Result<(), StructuralError> {
        if self.is_live(floating.parent, floating.parent_stamp) {
            let parent = &mut self.nodes[floating.parent];
            let linked = parent.descendants();
            if let Some(&id) = floating.nodes.iter().find(|&&id| linked.contains(&Some(id))) {
                return Err(StructuralError::NotFloating(id));
            }
            parent.pending.retain(|id| !floating.nodes.contains(id));
        }

        let mut stack = std::mem::take(&mut self.work_stack);
        stack.clear();
        for (&id, &stamp) in floating.nodes.iter().zip(&floating.stamps) {
            if self.is_live(id, stamp) {
                stack.push((id, false));
            }
        }
        self.release(stack);
        Ok(())
    }

    /// Destroys every node below `id`, children before their parents.
    /// Floating sets created for any of the destroyed nodes go with them.
    /// Calling this on a leaf does nothing.
    pub fn destroy_descendants(&mut self, id: NodeIdx) {
        let mut stack = std::mem::take(&mut self.work_stack);
        stack.clear();
        for child in self.nodes[id].descendants.iter_mut() {
            if let Some(c) = child.take() {
                stack.push((c.get() as NodeIdx, false));
            }
        }
        self.release(stack);
    }

    /// Removes the nodes on the stack together with everything they own, in post-order.
    fn release(&mut self, mut stack: Vec<(NodeIdx, bool)>) {
        // the flag marks nodes whose children have already been scheduled
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                self.nodes.remove(current);
                continue;
            }
            stack.push((current, true));
            let node = &mut self.nodes[current];
            for c in node.descendants.into_iter().flatten() {
                stack.push((c.get() as NodeIdx, false));
            }
            for f in node.pending.drain(..) {
                stack.push((f, false));
            }
        }
        self.work_stack = stack;
    }

    /// Indices of the existing children of a node
    pub fn children_of(&self, id: NodeIdx) -> ArrayVec<NodeIdx, MAX_CHILDREN> {
        self.nodes[id]
            .descendants
            .iter()
            .filter_map(|c| Some((*c)?.get() as NodeIdx))
            .collect()
    }

    /// Construct an iterator that traverses the attached subtree under `start` (including start itself).
    pub fn iter_subtree(&self, start: NodeIdx) -> TraverseIter<'_, T> {
        TraverseIter {
            nodes: &self.nodes,
            to_visit: vec![start],
        }
    }
}

#[duplicate::duplicate_item(
    method        reference(type);
    [data]        [& type];
    [data_mut]    [&mut type];
)]
impl<T> DynamicQuadTree<T> {
    /// payload of a node, panics if the node does not exist
    #[inline]
    pub fn method(self: reference([Self]), id: NodeIdx) -> reference([T]) {
        reference([self.nodes[id].data])
    }
}

/// Helper to perform depth-first traverse of tree's nodes.
pub struct TraverseIter<'a, T> {
    nodes: &'a Slab<DynamicQuadTreeNode<T>>,
    to_visit: Vec<NodeIdx>,
}

impl<'a, T> Iterator for TraverseIter<'a, T> {
    type Item = (NodeIdx, &'a DynamicQuadTreeNode<T>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let current = self.to_visit.pop()?;
        let node = &self.nodes[current];
        // push in reverse so that children come out in sibling order
        for c in node.descendants.iter().rev().flatten() {
            self.to_visit.push(c.get() as NodeIdx);
        }
        Some((current, node))
    }
}
