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

//! Dense storage for every node of an implicit complete quad tree.

use crate::coords::*;
use arrayvec::ArrayVec;
use std::ops::{Index, IndexMut};

/// Maximal depth a hierarchy array can have. The deepest level alone would
/// hold 4^23 elements, so nothing realistic comes close.
pub const MAX_LEVELS: usize = 24;

/// Quad tree stored level by level, indexed by node location.
/// Level `L` holds `4^L` elements laid out row-major (`horz + vert * 2^L`).
/// There is no notion of a missing node: every address up to the depth exists.
#[derive(Clone, Debug)]
pub struct HierarchyArray<T> {
    levels: ArrayVec<Vec<T>, MAX_LEVELS>,
}

impl<T> Default for HierarchyArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HierarchyArray<T> {
    /// creates an empty array with zero levels
    pub fn new() -> Self {
        Self {
            levels: ArrayVec::new(),
        }
    }

    #[inline]
    fn flat_index(at: QuadTreeNodeLocation) -> usize {
        at.horz_order as usize + ((at.vert_order as usize) << at.level)
    }

    /// true if never resized, or resized to zero levels
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[inline]
    pub fn num_levels(&self) -> u8 {
        self.levels.len() as u8
    }

    /// total number of stored elements over all levels
    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// all elements of one level, row-major
    #[inline]
    pub fn level(&self, level: u8) -> &[T] {
        &self.levels[level as usize]
    }

    #[inline]
    pub fn get(&self, at: QuadTreeNodeLocation) -> Option<&T> {
        self.levels
            .get(at.level as usize)?
            .get(Self::flat_index(at))
    }

    #[inline]
    pub fn get_mut(&mut self, at: QuadTreeNodeLocation) -> Option<&mut T> {
        self.levels
            .get_mut(at.level as usize)?
            .get_mut(Self::flat_index(at))
    }

    /// Unchecked access for hot loops.
    /// # Safety
    /// `at.level` must be below `num_levels()` and both orders below `1 << at.level`.
    #[inline]
    pub unsafe fn get_unchecked(&self, at: QuadTreeNodeLocation) -> &T {
        self.levels
            .get_unchecked(at.level as usize)
            .get_unchecked(Self::flat_index(at))
    }

    /// Unchecked mutable access for hot loops.
    /// # Safety
    /// Same requirements as [`HierarchyArray::get_unchecked`].
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, at: QuadTreeNodeLocation) -> &mut T {
        self.levels
            .get_unchecked_mut(at.level as usize)
            .get_unchecked_mut(Self::flat_index(at))
    }
}

impl<T: Default> HierarchyArray<T> {
    /// creates an array with all levels allocated
    pub fn with_levels(num_levels: u8) -> Self {
        let mut rv = Self::new();
        rv.resize(num_levels);
        rv
    }

    /// (Re)allocates storage for `num_levels` levels. Every element, including those
    /// that existed before, is reset to its default value.
    ///
    /// Panics if `num_levels` exceeds [`MAX_LEVELS`].
    pub fn resize(&mut self, num_levels: u8) {
        assert!(
            num_levels as usize <= MAX_LEVELS,
            "At most {MAX_LEVELS} levels are supported, got {num_levels}"
        );
        self.levels.clear();
        for level in 0..num_levels {
            let num_elements_in_level = 1usize << level;
            let mut v = Vec::with_capacity(num_elements_in_level * num_elements_in_level);
            v.resize_with(num_elements_in_level * num_elements_in_level, T::default);
            self.levels.push(v);
        }
    }
}

const PANIC_MSG: &str = "Location is outside of the HierarchyArray";

impl<T> Index<QuadTreeNodeLocation> for HierarchyArray<T> {
    type Output = T;
    /// Index into the hierarchy. Orders are only checked in debug builds,
    /// a level outside of the array always panics.
    #[inline]
    fn index(&self, at: QuadTreeNodeLocation) -> &Self::Output {
        debug_assert!(at.horz_order < at.level_size() && at.vert_order < at.level_size());
        &self.levels.get(at.level as usize).expect(PANIC_MSG)[Self::flat_index(at)]
    }
}

impl<T> IndexMut<QuadTreeNodeLocation> for HierarchyArray<T> {
    #[inline]
    fn index_mut(&mut self, at: QuadTreeNodeLocation) -> &mut Self::Output {
        debug_assert!(at.horz_order < at.level_size() && at.vert_order < at.level_size());
        &mut self.levels.get_mut(at.level as usize).expect(PANIC_MSG)[Self::flat_index(at)]
    }
}
