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

//! Raw raster as handed over by an image loader, before any validation.

/// Value type of one pixel component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComponentType {
    U8,
    U16,
    U32,
    F32,
}

impl ComponentType {
    /// size of one component in bytes
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            ComponentType::U8 => 1,
            ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

/// Borrowed view over decoded image data. Rows are `row_stride` bytes apart,
/// samples are in native byte order.
#[derive(Debug, Copy, Clone)]
pub struct RawRaster<'a> {
    pub width: u32,
    pub height: u32,
    /// distance between the starts of two consecutive rows, in bytes
    pub row_stride: usize,
    pub component_type: ComponentType,
    pub num_components: u8,
    pub data: &'a [u8],
}

impl<'a> RawRaster<'a> {
    /// Wraps tightly packed single-channel 16-bit samples.
    pub fn from_u16(width: u32, height: u32, samples: &'a [u16]) -> Self {
        Self {
            width,
            height,
            row_stride: width as usize * ComponentType::U16.size(),
            component_type: ComponentType::U16,
            num_components: 1,
            data: bytemuck::cast_slice(samples),
        }
    }

    /// bytes occupied by the samples of one row, padding excluded
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.num_components as usize * self.component_type.size()
    }

    /// Samples of one row, in bytes.
    #[inline]
    pub(crate) fn row(&self, row: u32) -> &'a [u8] {
        let data = self.data;
        let start = row as usize * self.row_stride;
        &data[start..start + self.row_bytes()]
    }
}
