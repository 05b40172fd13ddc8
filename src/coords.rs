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

//! Contains the address of a node in an implicit, complete quad tree.

use crate::error::StructuralError;

/// Number of children every internal node of a quad tree has.
pub const MAX_CHILDREN: usize = 4;

/// Location of a node in an implicit complete quad tree.
///
/// Children are numbered in "sibling order": 0 is left-bottom, 1 right-bottom,
/// 2 left-top and 3 right-top, so bit 0 selects the horizontal half and bit 1 the
/// vertical half.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuadTreeNodeLocation {
    pub horz_order: u32,
    pub vert_order: u32,
    pub level: u8,
}

impl QuadTreeNodeLocation {
    /// creates a new location from the raw orders.
    /// # Args
    /// * `horz_order`, `vert_order` position within the level, both must be below `1 << level`
    /// * `level` depth of the node, 0 being the root. Soft limited at 31.
    #[inline]
    pub fn new(horz_order: u32, vert_order: u32, level: u8) -> Self {
        debug_assert!(level < 32);
        debug_assert!((horz_order as u64) < (1u64 << level));
        debug_assert!((vert_order as u64) < (1u64 << level));
        Self {
            horz_order,
            vert_order,
            level,
        }
    }

    /// The root of the tree.
    #[inline]
    pub const fn root() -> Self {
        Self {
            horz_order: 0,
            vert_order: 0,
            level: 0,
        }
    }

    #[inline]
    pub fn is_root(self) -> bool {
        self.level == 0
    }

    /// Number of nodes along one side at this level.
    #[inline]
    pub fn level_size(self) -> u32 {
        1 << self.level
    }

    /// gets one of the child node positions of this node, defined by its sibling order.
    #[inline]
    pub fn child(self, sibling_order: usize) -> Self {
        debug_assert!(sibling_order < MAX_CHILDREN);
        let sibling_order = sibling_order as u32;
        Self::new(
            self.horz_order * 2 + (sibling_order & 1),
            self.vert_order * 2 + (sibling_order >> 1),
            self.level + 1,
        )
    }

    /// All four children, in sibling order.
    #[inline]
    pub fn children(self) -> [Self; MAX_CHILDREN] {
        [self.child(0), self.child(1), self.child(2), self.child(3)]
    }

    /// gets the parent of this node. The root has none.
    #[inline]
    pub fn parent(self) -> Result<Self, StructuralError> {
        if self.is_root() {
            return Err(StructuralError::RootHasNoParent);
        }
        Ok(Self::new(
            self.horz_order / 2,
            self.vert_order / 2,
            self.level - 1,
        ))
    }

    /// index of this node among the children of its parent
    #[inline]
    pub fn sibling_order(self) -> usize {
        ((self.horz_order & 1) | ((self.vert_order & 1) << 1)) as usize
    }

    /// whether `other` is this node or lies in its subtree
    pub fn contains(self, other: Self) -> bool {
        // move the other node up to this level and check if they're equal
        if other.level < self.level {
            return false;
        }
        let level_difference = other.level - self.level;
        (other.horz_order >> level_difference) == self.horz_order
            && (other.vert_order >> level_difference) == self.vert_order
    }

    /// Walks from this node up to the root, this node included.
    pub fn ancestor_chain(self) -> impl Iterator<Item = Self> {
        std::iter::successors(Some(self), |loc| loc.parent().ok())
    }

    /// converts the location into float coords of its lower left corner,
    /// mapped so that the root covers (0, 0) to (1, 1).
    #[inline]
    pub fn float_coords(self) -> [f32; 2] {
        let scale_factor = 1.0 / self.level_size() as f32;
        [
            self.horz_order as f32 * scale_factor,
            self.vert_order as f32 * scale_factor,
        ]
    }

    /// gets the size the node takes up, with the root taking up the entire area.
    #[inline]
    pub fn float_size(self) -> f32 {
        1.0 / self.level_size() as f32
    }

    /// Picks a uniformly random node at the given level.
    #[cfg(feature = "rand")]
    pub fn random<R: rand::Rng + ?Sized>(rng: &mut R, level: u8) -> Self {
        let size = 1u32 << level;
        Self::new(
            rng.random_range(0..size),
            rng.random_range(0..size),
            level,
        )
    }
}
