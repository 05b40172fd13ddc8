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

//! Height map with a min/max elevation hierarchy over fixed-size patches.
//!
//! The raster is padded to `2^n + 1` samples per side, and every node of the
//! quad tree over it knows the lowest and highest sample in its footprint.
//! Leaves cover `patch_size + 1` samples per side, so neighbouring leaves share
//! their border row and column.

use crate::config::ElevationConfig;
use crate::coords::*;
use crate::error::ElevationError;
use crate::hierarchy::{HierarchyArray, MAX_LEVELS};
use crate::iter::{num_nodes_in_hierarchy, HierarchyReverseIterator};
use crate::raster::{ComponentType, RawRaster};
use glam::Vec3;

/// Lowest and highest elevation inside a node footprint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct MinMax {
    pub min: u16,
    pub max: u16,
}

impl MinMax {
    #[inline]
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// bounds of a single sample
    #[inline]
    pub const fn splat(v: u16) -> Self {
        Self { min: v, max: v }
    }

    #[inline]
    pub fn include(&mut self, v: u16) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Folds any coordinate into `[0, dim)` by reflecting at every multiple of `dim`.
///
/// Negative coordinates mirror their positive counterparts, and every odd period
/// runs backwards, so the sequence ping-pongs across the valid range.
#[inline]
pub fn mirror_coord(coord: i32, dim: u32) -> u32 {
    debug_assert!(dim > 0);
    let coord = coord.unsigned_abs();
    let period = coord / dim;
    let coord = coord % dim;
    if period & 1 == 1 {
        (dim - 1) - coord
    } else {
        coord
    }
}

/// Largest even number not above `x`. Used for the row pitch of the padded raster.
#[inline]
pub const fn round_down_to_even(x: u32) -> u32 {
    x - x % 2
}

/// Height map of a terrain plus its min/max elevation hierarchy.
///
/// Queries take `&self` and can run from many threads at once. Edits take `&mut self`,
/// so any sharing scheme with concurrent edits has to live outside of this type.
#[derive(Clone, Debug)]
pub struct ElevationDataSource {
    /// min and max heights for every quad tree node
    min_max_elevation: HierarchyArray<MinMax>,

    num_levels: u8,
    patch_size: u32,
    col_offset: i32,
    row_offset: i32,

    /// the whole terrain height map, `num_rows` rows of `stride` samples
    height_map: Vec<u16>,
    num_cols: u32,
    num_rows: u32,
    stride: u32,
}

/// Computes `(2^n, num_levels)` for a raster: the minimal power of two such that
/// `2^n + 1` samples cover both sides, and the minimal depth at which leaf patches tile it.
fn grid_dimensions(width: u32, height: u32, patch_size: u32) -> Result<(u32, u8), ElevationError> {
    let mut cells = 1u64;
    while cells + 1 < width as u64 || cells + 1 < height as u64 {
        cells *= 2;
    }

    let mut num_levels = 1usize;
    while ((patch_size as u64) << (num_levels - 1)) < cells {
        num_levels += 1;
    }
    if num_levels > MAX_LEVELS {
        return Err(ElevationError::TooManyLevels(num_levels));
    }
    // the padded side itself must stay addressable
    if cells + 1 > u32::MAX as u64 / 2 {
        return Err(ElevationError::RasterTooLarge { width, height });
    }
    Ok((cells as u32, num_levels as u8))
}

impl ElevationDataSource {
    /// Builds the data source from raw 16-bit single-channel samples.
    ///
    /// The raster is copied into a buffer padded to `2^n + 1` columns and rows.
    /// The padding repeats the last source column, then the last source row.
    pub fn new(raster: &RawRaster<'_>, config: &ElevationConfig) -> Result<Self, ElevationError> {
        if raster.num_components != 1 || raster.component_type != ComponentType::U16 {
            return Err(ElevationError::InvalidFormat {
                num_components: raster.num_components,
                component_type: raster.component_type,
            });
        }
        if raster.width == 0 || raster.height == 0 {
            return Err(ElevationError::EmptyRaster);
        }
        if config.patch_size == 0 {
            return Err(ElevationError::InvalidPatchSize);
        }
        let row_bytes = raster.row_bytes();
        if raster.row_stride < row_bytes {
            return Err(ElevationError::RowStrideTooSmall {
                row_stride: raster.row_stride,
                width: raster.width,
            });
        }
        let expected = (raster.height as usize - 1) * raster.row_stride + row_bytes;
        if raster.data.len() < expected {
            return Err(ElevationError::BufferTooSmall {
                expected,
                actual: raster.data.len(),
            });
        }

        let (cells, num_levels) = grid_dimensions(raster.width, raster.height, config.patch_size)?;
        let num_cols = cells + 1;
        let num_rows = cells + 1;
        let stride = round_down_to_even(num_cols + 1);

        let mut height_map = vec![0u16; stride as usize * num_rows as usize];
        for row in 0..raster.height {
            let start = row as usize * stride as usize;
            let dst = &mut height_map[start..start + raster.width as usize];
            bytemuck::cast_slice_mut::<u16, u8>(dst).copy_from_slice(raster.row(row));
        }

        let mut rv = Self {
            min_max_elevation: HierarchyArray::new(),
            num_levels,
            patch_size: config.patch_size,
            col_offset: 0,
            row_offset: 0,
            height_map,
            num_cols,
            num_rows,
            stride,
        };
        rv.pad_borders(raster.width, raster.height);

        rv.min_max_elevation.resize(num_levels);
        rv.calculate_min_max_elevations();

        log::debug!(
            "Loaded {}x{} height map into {}x{} grid (stride {}), {} levels of {}-sample patches, elevation {}..{}",
            raster.width,
            raster.height,
            num_cols,
            num_rows,
            stride,
            num_levels,
            config.patch_size,
            rv.global_min_elevation(),
            rv.global_max_elevation()
        );
        Ok(rv)
    }

    /// Builds the data source from tightly packed samples, `width` per row.
    pub fn from_samples(
        width: u32,
        height: u32,
        samples: &[u16],
        config: &ElevationConfig,
    ) -> Result<Self, ElevationError> {
        Self::new(&RawRaster::from_u16(width, height, samples), config)
    }

    /// Synthetic `dim x dim` terrain made of folded sine octaves,
    /// for running without a DEM file.
    pub fn procedural(dim: u32, config: &ElevationConfig) -> Result<Self, ElevationError> {
        let mut samples = vec![0u16; dim as usize * dim as usize];
        for j in 0..dim {
            for i in 0..dim {
                let x = i as f32 / dim as f32;
                let y = j as f32 / dim as f32;
                let mut amplitude = 1.0f32;
                let mut frequency = 1.0f32;
                let mut h = 0.0f32;
                for _octave in 0..8 {
                    h += amplitude
                        * ((x * frequency).sin() * (y * 1.5 * frequency).sin()
                            + 0.5
                                * (((x + y) * 1.3 * frequency).sin()
                                    + (x * y * 1.7 * frequency).cos()));
                    h = (h - 0.5).abs();
                    amplitude *= 0.7;
                    frequency *= 1.8;
                }
                let h = (h.abs() * 32000.0).min(u16::MAX as f32);
                samples[(i + j * dim) as usize] = h as u16;
            }
        }
        Self::from_samples(dim, dim, &samples, config)
    }

    /// Duplicates the last source column and row into the padding region.
    fn pad_borders(&mut self, width: u32, height: u32) {
        let stride = self.stride as usize;
        let (width, height) = (width as usize, height as usize);
        let num_cols = self.num_cols as usize;

        for row in 0..height {
            let start = row * stride;
            let edge = self.height_map[start + width - 1];
            self.height_map[start + width..start + num_cols].fill(edge);
        }

        let last_row = (height - 1) * stride;
        for row in height..self.num_rows as usize {
            self.height_map
                .copy_within(last_row..last_row + num_cols, row * stride);
        }
    }

    #[inline]
    fn sample_index(&self, col: u32, row: u32) -> usize {
        debug_assert!(col < self.num_cols && row < self.num_rows);
        col as usize + row as usize * self.stride as usize
    }

    /// Sample at the given column and row of the padded grid.
    #[inline]
    pub fn elev_sample(&self, col: u32, row: u32) -> u16 {
        self.height_map[self.sample_index(col, row)]
    }

    /// Mutable sample access. The hierarchy is not updated, see
    /// [`ElevationDataSource::recompute_patch_min_max_elevations`].
    #[inline]
    pub fn elev_sample_mut(&mut self, col: u32, row: u32) -> &mut u16 {
        let idx = self.sample_index(col, row);
        &mut self.height_map[idx]
    }

    /// Re-derives min/max for one node. Leaves rescan their samples, internal nodes
    /// combine their four children, so after an edit the nodes have to be visited
    /// bottom-up along the ancestor chain.
    pub fn recompute_patch_min_max_elevations(&mut self, pos: QuadTreeNodeLocation) {
        debug_assert!(pos.level < self.num_levels);
        let bounds = if pos.level == self.num_levels - 1 {
            self.scan_patch(pos)
        } else {
            pos.children()
                .into_iter()
                .map(|child| self.min_max_elevation[child])
                .reduce(MinMax::merge)
                .unwrap_or_default()
        };
        self.min_max_elevation[pos] = bounds;
    }

    /// exact bounds of a leaf patch, the far edge clamped to the grid
    fn scan_patch(&self, pos: QuadTreeNodeLocation) -> MinMax {
        let last_col = self.num_cols - 1;
        let last_row = self.num_rows - 1;
        let col0 = (pos.horz_order as u64 * self.patch_size as u64).min(last_col as u64) as u32;
        let row0 = (pos.vert_order as u64 * self.patch_size as u64).min(last_row as u64) as u32;
        let col1 = (col0 as u64 + self.patch_size as u64).min(last_col as u64) as u32;
        let row1 = (row0 as u64 + self.patch_size as u64).min(last_row as u64) as u32;

        let mut bounds = MinMax::splat(self.elev_sample(col0, row0));
        for row in row0..=row1 {
            let start = self.sample_index(col0, row);
            let end = self.sample_index(col1, row);
            for &h in &self.height_map[start..=end] {
                bounds.include(h);
            }
        }
        bounds
    }

    /// Computes min/max elevations for the whole hierarchy, starting from the finest level.
    pub fn calculate_min_max_elevations(&mut self) {
        log::debug!(
            "Computing min/max elevations for {} nodes",
            num_nodes_in_hierarchy(self.num_levels)
        );
        for pos in HierarchyReverseIterator::new(self.num_levels) {
            self.recompute_patch_min_max_elevations(pos);
        }
    }

    /// Sets one sample and refreshes every patch containing it, then their ancestors.
    ///
    /// Samples on patch borders belong to up to four leaves, and samples on the last
    /// row or column also to any leaf past the grid edge, since those are clamped.
    pub fn set_elevation(&mut self, col: u32, row: u32, value: u16) {
        *self.elev_sample_mut(col, row) = value;

        let leaf_level = self.num_levels - 1;
        let leaves_per_side = 1u32 << leaf_level;
        let patch = self.patch_size;
        let leaf_range = |c: u32, last: u32| {
            let lo = c.saturating_sub(1) / patch;
            let hi = if c == last {
                leaves_per_side - 1
            } else {
                (c / patch).min(leaves_per_side - 1)
            };
            lo.min(hi)..=hi
        };

        let mut dirty = Vec::new();
        for v in leaf_range(row, self.num_rows - 1) {
            for h in leaf_range(col, self.num_cols - 1) {
                dirty.push(QuadTreeNodeLocation::new(h, v, leaf_level));
            }
        }
        log::trace!("Sample ({col}, {row}) set to {value}, refreshing {} leaves", dirty.len());

        loop {
            for &pos in &dirty {
                self.recompute_patch_min_max_elevations(pos);
            }
            if dirty[0].is_root() {
                break;
            }
            for pos in dirty.iter_mut() {
                *pos = pos.parent().unwrap_or(*pos);
            }
            dirty.sort_unstable_by_key(|p| (p.vert_order, p.horz_order));
            dirty.dedup();
        }
    }

    /// Bilinearly interpolated height on a lattice coarsened by `step`.
    ///
    /// Coordinates are shifted by the current offsets, and lattice corners outside of
    /// the grid are mirrored back into it.
    pub fn interpolated_height(&self, col: f32, row: f32, step: i32) -> f32 {
        debug_assert!(step > 0);
        // snapping happens in i64 so far-away coordinates cannot overflow
        let step = i64::from(step);
        let snap = |c: f32| i64::from(c.floor() as i32).div_euclid(step) * step;
        let col0 = snap(col);
        let row0 = snap(row);
        let h_weight = ((col - col0 as f32) / step as f32).clamp(0.0, 1.0);
        let v_weight = ((row - row0 as f32) / step as f32).clamp(0.0, 1.0);

        let col0 = col0 + i64::from(self.col_offset);
        let row0 = row0 + i64::from(self.row_offset);
        let fold = |c: i64, dim: u32| {
            mirror_coord(c.clamp(i32::MIN.into(), i32::MAX.into()) as i32, dim)
        };

        let col1 = fold(col0 + step, self.num_cols);
        let row1 = fold(row0 + step, self.num_rows);
        let col0 = fold(col0, self.num_cols);
        let row0 = fold(row0, self.num_rows);

        let h00 = self.elev_sample(col0, row0) as f32;
        let h10 = self.elev_sample(col1, row0) as f32;
        let h01 = self.elev_sample(col0, row1) as f32;
        let h11 = self.elev_sample(col1, row1) as f32;

        (h00 * (1.0 - h_weight) + h10 * h_weight) * (1.0 - v_weight)
            + (h01 * (1.0 - h_weight) + h11 * h_weight) * v_weight
    }

    /// Unit surface normal from central differences `step` samples apart.
    /// Z points up, away from the terrain.
    pub fn compute_surface_normal(
        &self,
        col: f32,
        row: f32,
        sample_spacing: f32,
        height_scale: f32,
        step: i32,
    ) -> Vec3 {
        let offset = step as f32;
        let height1 = self.interpolated_height(col + offset, row, step);
        let height2 = self.interpolated_height(col - offset, row, step);
        let height3 = self.interpolated_height(col, row + offset, step);
        let height4 = self.interpolated_height(col, row - offset, step);

        let grad = Vec3::new(
            (height2 - height1) * height_scale,
            (height4 - height3) * height_scale,
            offset * sample_spacing * 2.0,
        );
        grad.normalize()
    }

    /// minimal height of the whole terrain
    #[inline]
    pub fn global_min_elevation(&self) -> u16 {
        self.min_max_elevation[QuadTreeNodeLocation::root()].min
    }

    /// maximal height of the whole terrain
    #[inline]
    pub fn global_max_elevation(&self) -> u16 {
        self.min_max_elevation[QuadTreeNodeLocation::root()].max
    }

    /// elevation bounds of any node in the hierarchy
    #[inline]
    pub fn min_max(&self, pos: QuadTreeNodeLocation) -> MinMax {
        self.min_max_elevation[pos]
    }

    #[inline]
    pub fn min_max_hierarchy(&self) -> &HierarchyArray<MinMax> {
        &self.min_max_elevation
    }

    /// Raw padded height map and its pitch in samples, e.g. for texture upload.
    #[inline]
    pub fn data(&self) -> (&[u16], usize) {
        (&self.height_map, self.stride as usize)
    }

    /// Same as [`ElevationDataSource::data`], as bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.height_map)
    }

    #[inline]
    pub fn set_offsets(&mut self, col_offset: i32, row_offset: i32) {
        self.col_offset = col_offset;
        self.row_offset = row_offset;
    }

    #[inline]
    pub fn offsets(&self) -> (i32, i32) {
        (self.col_offset, self.row_offset)
    }

    #[inline]
    pub fn num_cols(&self) -> u32 {
        self.num_cols
    }

    #[inline]
    pub fn num_rows(&self) -> u32 {
        self.num_rows
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[inline]
    pub fn num_levels(&self) -> u8 {
        self.num_levels
    }

    #[inline]
    pub fn patch_size(&self) -> u32 {
        self.patch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::HierarchyIterator;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn flat(width: u32, height: u32, value: u16, patch_size: u32) -> ElevationDataSource {
        let samples = vec![value; (width * height) as usize];
        ElevationDataSource::from_samples(
            width,
            height,
            &samples,
            &ElevationConfig::default().with_patch_size(patch_size),
        )
        .unwrap()
    }

    /// bounds by brute force over the node footprint
    fn naive_bounds(ds: &ElevationDataSource, pos: QuadTreeNodeLocation) -> MinMax {
        let leaf_level = ds.num_levels() - 1;
        let span = ds.patch_size() << (leaf_level - pos.level);
        let last_col = ds.num_cols() - 1;
        let last_row = ds.num_rows() - 1;
        let col0 = (pos.horz_order * span).min(last_col);
        let row0 = (pos.vert_order * span).min(last_row);
        let mut rv = MinMax::splat(ds.elev_sample(col0, row0));
        for row in row0..=(row0 + span).min(last_row) {
            for col in col0..=(col0 + span).min(last_col) {
                rv.include(ds.elev_sample(col, row));
            }
        }
        rv
    }

    #[test]
    fn mirror_coord_identities() {
        for dim in 1..40u32 {
            assert_eq!(mirror_coord(dim as i32 - 1, dim), dim - 1);
            assert_eq!(mirror_coord(dim as i32, dim), dim - 1);
            for x in 0..dim as i32 {
                assert_eq!(mirror_coord(-x, dim), mirror_coord(x, dim));
                assert_eq!(mirror_coord(x, dim), x as u32);
            }
        }
        // ping-pong with period 2 * dim
        assert_eq!(mirror_coord(7, 5), 2);
        assert_eq!(mirror_coord(10, 5), 0);
        assert_eq!(mirror_coord(i32::MIN, 5), mirror_coord(i32::MIN.unsigned_abs() as i32, 5));
    }

    #[test]
    fn stride_matches_bit_trick() {
        for n in 1..5000u32 {
            assert_eq!(round_down_to_even(n + 1), (n + 1) & !1);
        }
    }

    #[test]
    fn grid_sizes() {
        assert_eq!(grid_dimensions(257, 257, 128).unwrap(), (256, 2));
        assert_eq!(grid_dimensions(300, 100, 128).unwrap(), (512, 3));
        assert_eq!(grid_dimensions(1, 1, 128).unwrap(), (1, 1));
        assert_eq!(grid_dimensions(2048, 2048, 128).unwrap(), (2048, 5));
        assert_eq!(grid_dimensions(17, 17, 4).unwrap(), (16, 3));
        assert!(matches!(
            grid_dimensions(1 << 30, 2, 1),
            Err(ElevationError::TooManyLevels(_))
        ));
        assert_eq!(
            grid_dimensions(1 << 31, 2, 1 << 30),
            Err(ElevationError::RasterTooLarge {
                width: 1 << 31,
                height: 2
            })
        );
    }

    #[test]
    fn rejects_bad_rasters() {
        let bytes = [0u8; 64];
        let mut raster = RawRaster {
            width: 4,
            height: 4,
            row_stride: 4,
            component_type: ComponentType::U8,
            num_components: 1,
            data: &bytes,
        };
        let cfg = ElevationConfig::default();
        assert_eq!(
            ElevationDataSource::new(&raster, &cfg).unwrap_err(),
            ElevationError::InvalidFormat {
                num_components: 1,
                component_type: ComponentType::U8
            }
        );

        raster.component_type = ComponentType::U16;
        raster.num_components = 2;
        assert!(matches!(
            ElevationDataSource::new(&raster, &cfg),
            Err(ElevationError::InvalidFormat { num_components: 2, .. })
        ));

        raster.num_components = 1;
        assert_eq!(
            ElevationDataSource::new(&raster, &cfg).unwrap_err(),
            ElevationError::RowStrideTooSmall {
                row_stride: 4,
                width: 4
            }
        );

        raster.row_stride = 32;
        assert_eq!(
            ElevationDataSource::new(&raster, &cfg).unwrap_err(),
            ElevationError::BufferTooSmall {
                expected: 3 * 32 + 8,
                actual: 64
            }
        );

        raster.width = 0;
        assert_eq!(
            ElevationDataSource::new(&raster, &cfg).unwrap_err(),
            ElevationError::EmptyRaster
        );

        assert_eq!(
            ElevationDataSource::from_samples(1, 1, &[5], &cfg.clone().with_patch_size(0))
                .unwrap_err(),
            ElevationError::InvalidPatchSize
        );
    }

    #[test]
    fn padding_duplicates_edges() {
        let (w, h) = (300u32, 100u32);
        let samples: Vec<u16> = (0..w * h).map(|i| (i % 997) as u16).collect();
        let ds = ElevationDataSource::from_samples(w, h, &samples, &ElevationConfig::default())
            .unwrap();
        assert_eq!((ds.num_cols(), ds.num_rows()), (513, 513));
        assert_eq!(ds.stride(), 514);
        assert_eq!(ds.num_levels(), 3);

        for row in 0..h {
            for col in 0..w {
                assert_eq!(ds.elev_sample(col, row), samples[(col + row * w) as usize]);
            }
        }
        assert_eq!(ds.elev_sample(400, 50), ds.elev_sample(w - 1, 50));
        assert_eq!(ds.elev_sample(512, 99), ds.elev_sample(w - 1, 99));
        assert_eq!(ds.elev_sample(10, 200), ds.elev_sample(10, h - 1));
        assert_eq!(ds.elev_sample(512, 512), ds.elev_sample(w - 1, h - 1));

        let (data, pitch) = ds.data();
        assert_eq!(pitch, 514);
        assert_eq!(data.len(), 514 * 513);
        assert_eq!(ds.as_bytes().len(), data.len() * 2);
    }

    #[test]
    fn honours_source_row_stride() {
        // 3x2 raster with 4 bytes of padding after each row
        let mut bytes = Vec::new();
        for row in 0..2u16 {
            for col in 0..3u16 {
                bytes.extend_from_slice(&(row * 10 + col).to_ne_bytes());
            }
            bytes.extend_from_slice(&[0xff; 4]);
        }
        let raster = RawRaster {
            width: 3,
            height: 2,
            row_stride: 10,
            component_type: ComponentType::U16,
            num_components: 1,
            data: &bytes,
        };
        let ds = ElevationDataSource::new(&raster, &ElevationConfig::default()).unwrap();
        assert_eq!(ds.elev_sample(2, 0), 2);
        assert_eq!(ds.elev_sample(1, 1), 11);
        assert_eq!(ds.global_min_elevation(), 0);
        assert_eq!(ds.global_max_elevation(), 12);
    }

    #[test]
    fn flat_map_bounds() {
        let ds = flat(70, 70, 1234, 8);
        for loc in HierarchyIterator::new(ds.num_levels()) {
            assert_eq!(ds.min_max(loc), MinMax::splat(1234));
        }
        assert_eq!(ds.global_min_elevation(), 1234);
        assert_eq!(ds.global_max_elevation(), 1234);
    }

    #[test]
    fn single_outlier_propagates_to_root_only() {
        let (w, h) = (17u32, 17u32);
        let mut samples = vec![0u16; (w * h) as usize];
        samples[(5 + 6 * w) as usize] = u16::MAX;
        let ds = ElevationDataSource::from_samples(
            w,
            h,
            &samples,
            &ElevationConfig::default().with_patch_size(4),
        )
        .unwrap();
        assert_eq!(ds.num_levels(), 3);

        let leaf = QuadTreeNodeLocation::new(1, 1, 2);
        let chain: Vec<_> = leaf.ancestor_chain().collect();
        for loc in HierarchyIterator::new(ds.num_levels()) {
            let expected = if chain.contains(&loc) { u16::MAX } else { 0 };
            assert_eq!(ds.min_max(loc), MinMax::new(0, expected), "at {loc:?}");
        }
    }

    #[test]
    fn hierarchy_matches_brute_force() {
        let mut rng = SmallRng::seed_from_u64(42);
        let (w, h) = (45u32, 33u32);
        let samples: Vec<u16> = (0..w * h).map(|_| rng.random()).collect();
        let ds = ElevationDataSource::from_samples(
            w,
            h,
            &samples,
            &ElevationConfig::default().with_patch_size(8),
        )
        .unwrap();
        for loc in HierarchyIterator::new(ds.num_levels()) {
            assert_eq!(ds.min_max(loc), naive_bounds(&ds, loc), "at {loc:?}");
        }
    }

    #[test]
    fn interpolation_hits_samples_at_integers() {
        let mut rng = SmallRng::seed_from_u64(7);
        let samples: Vec<u16> = (0..33 * 33).map(|_| rng.random_range(0..5000)).collect();
        let ds = ElevationDataSource::from_samples(33, 33, &samples, &ElevationConfig::default())
            .unwrap();
        for row in 0..33 {
            for col in 0..33 {
                assert_eq!(
                    ds.interpolated_height(col as f32, row as f32, 1),
                    ds.elev_sample(col, row) as f32
                );
            }
        }
    }

    #[test]
    fn interpolation_blends_and_mirrors() {
        // height grows with column index only
        let samples: Vec<u16> = (0..17 * 17).map(|i| (i % 17) as u16 * 10).collect();
        let mut ds =
            ElevationDataSource::from_samples(17, 17, &samples, &ElevationConfig::default())
                .unwrap();
        assert_eq!(ds.interpolated_height(2.5, 3.0, 1), 25.0);
        assert_eq!(ds.interpolated_height(2.5, 3.25, 1), 25.0);
        // coarser lattice snaps down to multiples of the step
        assert_eq!(ds.interpolated_height(5.0, 0.0, 2), 50.0);
        // past the far edge the grid is reflected
        assert_eq!(ds.interpolated_height(17.0, 0.0, 1), 160.0);
        assert_eq!(ds.interpolated_height(18.0, 0.0, 1), 150.0);
        assert_eq!(ds.interpolated_height(-3.0, 0.0, 1), 30.0);

        ds.set_offsets(4, 0);
        assert_eq!(ds.offsets(), (4, 0));
        assert_eq!(ds.interpolated_height(1.0, 0.0, 1), 50.0);
    }

    #[test]
    fn interpolation_far_outside_the_grid() {
        let samples: Vec<u16> = (0..17 * 17).map(|i| (i % 17) as u16 * 10).collect();
        let mut ds =
            ElevationDataSource::from_samples(17, 17, &samples, &ElevationConfig::default())
                .unwrap();
        ds.set_offsets(i32::MAX, i32::MIN);
        for step in [1, 2, 3, 7] {
            for x in [-1e6f32, -1e9, -3e9, -1e30, 1e30, f32::MIN, f32::MAX] {
                let h = ds.interpolated_height(x, -0.5, step);
                assert!((-1e-3..=160.001).contains(&h), "{x} {step}: {h}");
                let n = ds.compute_surface_normal(x, x, 1.0, 1.0, step);
                assert!(n.is_finite());
            }
        }
    }

    #[test]
    fn normals() {
        let ds = flat(33, 33, 500, 16);
        let n = ds.compute_surface_normal(10.0, 10.0, 1.0, 1.0, 1);
        assert!((n - Vec3::Z).length() < 1e-6);

        // slope of 10 height units per sample along columns
        let samples: Vec<u16> = (0..33 * 33).map(|i| (i % 33) as u16 * 10).collect();
        let ds = ElevationDataSource::from_samples(33, 33, &samples, &ElevationConfig::default())
            .unwrap();
        let n = ds.compute_surface_normal(10.0, 10.0, 2.0, 0.5, 1);
        let expected = Vec3::new(-10.0, 0.0, 4.0).normalize();
        assert!((n - expected).length() < 1e-5, "{n:?}");
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn local_edit_refreshes_ancestor_chain() {
        let mut ds = flat(257, 257, 100, 128);
        assert_eq!(ds.num_levels(), 2);
        assert_eq!(ds.global_min_elevation(), 100);
        assert_eq!(ds.global_max_elevation(), 100);

        *ds.elev_sample_mut(0, 0) = 200;
        let leaf = QuadTreeNodeLocation::new(0, 0, 1);
        for loc in leaf.ancestor_chain() {
            ds.recompute_patch_min_max_elevations(loc);
        }
        assert_eq!(ds.global_max_elevation(), 200);
        assert_eq!(ds.global_min_elevation(), 100);
        assert_eq!(ds.min_max(leaf), MinMax::new(100, 200));
        assert_eq!(
            ds.min_max(QuadTreeNodeLocation::new(1, 0, 1)),
            MinMax::new(100, 100)
        );
    }

    #[test]
    fn set_elevation_matches_full_sweep() {
        let mut rng = SmallRng::seed_from_u64(3);
        let samples: Vec<u16> = (0..40 * 40).map(|_| rng.random_range(1000..2000)).collect();
        let cfg = ElevationConfig::default().with_patch_size(8);
        let mut ds = ElevationDataSource::from_samples(40, 40, &samples, &cfg).unwrap();
        let edits = [
            (0, 0, 5),
            (8, 16, 60000),
            (63, 7, 1),
            (64, 64, 65000),
            (64, 10, 3),
            (17, 64, 2),
            (40, 40, 9),
        ];
        for (col, row, value) in edits {
            ds.set_elevation(col, row, value);
            let mut reference = ds.clone();
            reference.calculate_min_max_elevations();
            for loc in HierarchyIterator::new(ds.num_levels()) {
                assert_eq!(ds.min_max(loc), reference.min_max(loc), "at {loc:?}");
            }
        }
        assert_eq!(ds.global_min_elevation(), 1);
        assert_eq!(ds.global_max_elevation(), 65000);
    }

    #[test]
    fn procedural_terrain() {
        let ds = ElevationDataSource::procedural(64, &ElevationConfig::default().with_patch_size(16))
            .unwrap();
        assert_eq!(ds.num_cols(), 65);
        assert!(ds.global_min_elevation() <= ds.global_max_elevation());
        let mut rv = MinMax::splat(ds.elev_sample(0, 0));
        for row in 0..65 {
            for col in 0..65 {
                rv.include(ds.elev_sample(col, row));
            }
        }
        assert_eq!(rv, MinMax::new(ds.global_min_elevation(), ds.global_max_elevation()));
    }

    #[test]
    fn readers_can_share() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ElevationDataSource>();
    }
}
