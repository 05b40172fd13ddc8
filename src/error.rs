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

//! Error types for elevation data and tree manipulation

use crate::raster::ComponentType;
use crate::tree::{FloatingDescendants, NodeIdx};
use thiserror::Error;

/// Errors raised while building an elevation data source
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElevationError {
    #[error("16-bit single-channel raster is expected, got {num_components} x {component_type:?}")]
    InvalidFormat {
        num_components: u8,
        component_type: ComponentType,
    },

    #[error("raster has zero width or height")]
    EmptyRaster,

    #[error("row stride of {row_stride} bytes cannot hold {width} samples")]
    RowStrideTooSmall { row_stride: usize, width: u32 },

    #[error("raster buffer holds {actual} bytes, {expected} are required")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("{width}x{height} raster is too large to be padded")]
    RasterTooLarge { width: u32, height: u32 },

    #[error("patch size must be positive")]
    InvalidPatchSize,

    #[error("hierarchy would need {0} levels, at most {max} are supported", max = crate::hierarchy::MAX_LEVELS)]
    TooManyLevels(usize),
}

/// Violations of the quad tree structure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("the root node has no parent")]
    RootHasNoParent,

    /// The rejected set is handed back untouched, still floating.
    #[error("node {parent} already has descendants attached")]
    AlreadyAttached {
        parent: NodeIdx,
        rejected: FloatingDescendants,
    },

    #[error("descendants were created for node {expected}, not for node {parent}")]
    ForeignDescendants {
        expected: NodeIdx,
        parent: NodeIdx,
        rejected: FloatingDescendants,
    },

    /// Also raised when the slot was reused by a newer node.
    #[error("node {0} no longer exists in the tree")]
    StaleNode(NodeIdx),

    #[error("node {0} is attached to the tree and cannot be discarded as floating")]
    NotFloating(NodeIdx),
}
