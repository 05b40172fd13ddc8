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

#![doc = include_str!("../README.md")]

//!
//! # Addressing
//! Every node of the implicit quad tree is named by a [`QuadTreeNodeLocation`]. Level 0 is the
//! root, level `L` has `2^L x 2^L` nodes. Children are numbered 0..4 as left-bottom,
//! right-bottom, left-top and right-top.
//!
//! # Storage flavours
//! - [`HierarchyArray`] stores a value for every node of a complete tree, flattened per level.
//!   Nothing is allocated per node, there is no way for a node to be missing.
//! - [`DynamicQuadTree`] materializes only the nodes that were created. New children are first
//!   made "floating", can be prepared at leisure, and are then attached in one step.
//!
//! # Iterators
//! [`HierarchyIterator`] walks all locations from the root down, [`HierarchyReverseIterator`]
//! from the deepest level up. The reverse one guarantees a level is complete before its parents
//! are visited, which is what bottom-up aggregation relies on.
//!
//! # Elevation
//! [`ElevationDataSource`] keeps a padded 16-bit height map and a `HierarchyArray` of min/max
//! elevations over fixed-size patches of it. Bounds of any node are an O(1) lookup.

pub mod coords;
pub use crate::coords::*;

pub mod error;
pub use crate::error::*;

pub mod iter;
pub use crate::iter::*;

pub mod hierarchy;
pub use crate::hierarchy::*;

pub mod tree;
pub use crate::tree::*;

pub mod config;
pub use crate::config::*;

pub mod raster;
pub use crate::raster::*;

pub mod elevation;
pub use crate::elevation::*;
