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

//! Iterators over all node locations of an implicit quad tree.
//!
//! Neither iterator holds a reference to the storage it drives, they only produce
//! addresses. A fresh instance is needed to restart a traversal.
use crate::coords::*;

/// Traverses the quad tree level by level starting from the root,
/// each level in row-major order (horizontal order changes fastest).
#[derive(Debug, Clone)]
pub struct HierarchyIterator {
    current: QuadTreeNodeLocation,
    current_level_size: u32,
    num_levels: u8,
}

impl HierarchyIterator {
    pub fn new(num_levels: u8) -> Self {
        Self {
            current: QuadTreeNodeLocation::root(),
            current_level_size: 1,
            num_levels,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.current.level < self.num_levels
    }

    /// Steps horizontal order, then vertical order, then moves one level down.
    #[inline]
    pub fn advance(&mut self) {
        self.current.horz_order += 1;
        if self.current.horz_order == self.current_level_size {
            self.current.horz_order = 0;
            self.current.vert_order += 1;
            if self.current.vert_order == self.current_level_size {
                self.current.vert_order = 0;
                self.current.level += 1;
                self.current_level_size = 1 << self.current.level;
            }
        }
    }
}

/// Traverses the quad tree starting from the deepest level up to the root,
/// each level in row-major order. A whole level is visited before its parents.
#[derive(Debug, Clone)]
pub struct HierarchyReverseIterator {
    current: QuadTreeNodeLocation,
    current_level_size: u32,
    // level would go negative past the root
    exhausted: bool,
}

impl HierarchyReverseIterator {
    pub fn new(num_levels: u8) -> Self {
        let level = num_levels.saturating_sub(1);
        Self {
            current: QuadTreeNodeLocation::new(0, 0, level),
            current_level_size: 1 << level,
            exhausted: num_levels == 0,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.exhausted
    }

    /// Steps horizontal order, then vertical order, then moves one level up.
    #[inline]
    pub fn advance(&mut self) {
        self.current.horz_order += 1;
        if self.current.horz_order == self.current_level_size {
            self.current.horz_order = 0;
            self.current.vert_order += 1;
            if self.current.vert_order == self.current_level_size {
                self.current.vert_order = 0;
                if self.current.level == 0 {
                    self.exhausted = true;
                } else {
                    self.current.level -= 1;
                    self.current_level_size = 1 << self.current.level;
                }
            }
        }
    }
}

duplicate::duplicate! {
    [
        StructName;
        [HierarchyIterator];
        [HierarchyReverseIterator];
    ]

    impl StructName {
        /// location the iterator currently points at
        #[inline]
        pub fn current(&self) -> QuadTreeNodeLocation {
            self.current
        }

        #[inline]
        pub fn level(&self) -> u8 {
            self.current.level
        }

        #[inline]
        pub fn horz(&self) -> u32 {
            self.current.horz_order
        }

        #[inline]
        pub fn vert(&self) -> u32 {
            self.current.vert_order
        }
    }

    impl Iterator for StructName {
        type Item = QuadTreeNodeLocation;

        #[inline]
        fn next(&mut self) -> Option<Self::Item> {
            if !self.is_valid() {
                return None;
            }
            let rv = self.current;
            self.advance();
            Some(rv)
        }
    }

    impl std::iter::FusedIterator for StructName {}
}

/// Total number of nodes in a complete quad tree with the given number of levels.
#[inline]
pub const fn num_nodes_in_hierarchy(num_levels: u8) -> usize {
    // (4^n - 1) / 3
    ((1usize << (2 * num_levels as usize)) - 1) / 3
}
