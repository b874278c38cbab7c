use std::borrow::Cow;

use bytemuck::Pod;
use ndarray::{Array3, s};
use thiserror::Error;

use crate::enums::VoxelType;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Buffer of {actual} bytes does not match layout of {expected} bytes")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Invalid volume shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Element type and (slice, row, column) shape of a voxel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxelLayout {
    pub voxel_type: VoxelType,
    pub shape: (usize, usize, usize),
}

impl VoxelLayout {
    pub fn byte_len(&self) -> usize {
        let (slices, rows, columns) = self.shape;
        slices * rows * columns * self.voxel_type.size()
    }
}

/// Typed voxel buffer. The axis order depends on where it came from: container
/// reads are (slice, column, row) until [`Voxels::swap_rows_and_columns`] is applied.
#[derive(Clone, Debug, PartialEq)]
pub enum Voxels {
    U8(Array3<u8>),
    I16(Array3<i16>),
    U16(Array3<u16>),
    I32(Array3<i32>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

macro_rules! each_voxels {
    ($value:expr, $array:ident => $body:expr) => {
        match $value {
            Voxels::U8($array) => $body,
            Voxels::I16($array) => $body,
            Voxels::U16($array) => $body,
            Voxels::I32($array) => $body,
            Voxels::F32($array) => $body,
            Voxels::F64($array) => $body,
        }
    };
}

macro_rules! map_voxels {
    ($value:expr, $array:ident => $body:expr) => {
        match $value {
            Voxels::U8($array) => Voxels::U8($body),
            Voxels::I16($array) => Voxels::I16($body),
            Voxels::U16($array) => Voxels::U16($body),
            Voxels::I32($array) => Voxels::I32($body),
            Voxels::F32($array) => Voxels::F32($body),
            Voxels::F64($array) => Voxels::F64($body),
        }
    };
}

impl Voxels {
    pub fn voxel_type(&self) -> VoxelType {
        match self {
            Voxels::U8(_) => VoxelType::U8,
            Voxels::I16(_) => VoxelType::I16,
            Voxels::U16(_) => VoxelType::U16,
            Voxels::I32(_) => VoxelType::I32,
            Voxels::F32(_) => VoxelType::F32,
            Voxels::F64(_) => VoxelType::F64,
        }
    }

    /// Get the dimensions of the buffer in its current axis order
    pub fn dim(&self) -> (usize, usize, usize) {
        each_voxels!(self, a => a.dim())
    }

    pub fn is_empty(&self) -> bool {
        each_voxels!(self, a => a.is_empty())
    }

    pub fn layout(&self) -> VoxelLayout {
        VoxelLayout {
            voxel_type: self.voxel_type(),
            shape: self.dim(),
        }
    }

    /// Reorders (slice, column, row) to (slice, row, column). The result is in
    /// standard (C) memory order so that its bytes follow the new axis order.
    pub fn swap_rows_and_columns(self) -> Self {
        map_voxels!(self, a => a.permuted_axes([0, 2, 1]).as_standard_layout().into_owned())
    }

    /// Keeps slices `0, step, 2 * step, ...`.
    pub fn every_nth_slice(&self, step: usize) -> Self {
        let step = step.max(1) as isize;
        map_voxels!(self, a => a.slice(s![..;step, .., ..]).to_owned())
    }

    /// Native-endian element bytes in C order.
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        each_voxels!(self, a => array_bytes(a))
    }

    /// Rebuilds a typed buffer from raw bytes laid out as `layout` describes.
    pub fn from_bytes(layout: VoxelLayout, bytes: &[u8]) -> Result<Self, VolumeError> {
        let expected = layout.byte_len();
        if bytes.len() != expected {
            return Err(VolumeError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let shape = layout.shape;
        Ok(match layout.voxel_type {
            VoxelType::U8 => Voxels::U8(array_from_bytes(shape, bytes)?),
            VoxelType::I16 => Voxels::I16(array_from_bytes(shape, bytes)?),
            VoxelType::U16 => Voxels::U16(array_from_bytes(shape, bytes)?),
            VoxelType::I32 => Voxels::I32(array_from_bytes(shape, bytes)?),
            VoxelType::F32 => Voxels::F32(array_from_bytes(shape, bytes)?),
            VoxelType::F64 => Voxels::F64(array_from_bytes(shape, bytes)?),
        })
    }
}

fn array_bytes<T: Pod>(array: &Array3<T>) -> Cow<'_, [u8]> {
    match array.as_slice() {
        Some(elements) => Cow::Borrowed(bytemuck::cast_slice(elements)),
        None => {
            let elements: Vec<T> = array.iter().copied().collect();
            Cow::Owned(bytemuck::cast_slice(&elements).to_vec())
        }
    }
}

fn array_from_bytes<T: Pod>(
    shape: (usize, usize, usize),
    bytes: &[u8],
) -> Result<Array3<T>, VolumeError> {
    // Copy into a typed vector so the source alignment does not matter.
    let len = bytes.len() / std::mem::size_of::<T>();
    let mut elements = vec![<T as bytemuck::Zeroable>::zeroed(); len];
    bytemuck::cast_slice_mut(&mut elements).copy_from_slice(bytes);
    Ok(Array3::from_shape_vec(shape, elements)?)
}

/// Voxel data held by a scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ScanVolume {
    /// Not requested at load time.
    #[default]
    NotLoaded,
    /// Read from the container, ordered (slice, row, column).
    Raw(Voxels),
    /// Decompressed cache contents.
    Compressed(CachedVolume),
}

impl ScanVolume {
    pub fn is_empty(&self) -> bool {
        match self {
            ScanVolume::NotLoaded => true,
            ScanVolume::Raw(voxels) => voxels.is_empty(),
            ScanVolume::Compressed(cached) => cached.bytes.is_empty(),
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, ScanVolume::Compressed(_))
    }
}

/// Raw voxel bytes restored from the compressed cache. `layout` is `None` for
/// cache files written without a layout record.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedVolume {
    pub bytes: Vec<u8>,
    pub layout: Option<VoxelLayout>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn column_major_volume() -> Voxels {
        // 2 slices, 3 columns, 2 rows
        Voxels::I16(Array::from_shape_vec((2, 3, 2), (0..12).collect()).unwrap())
    }

    #[test]
    fn swap_rows_and_columns_transposes_each_slice() {
        let swapped = column_major_volume().swap_rows_and_columns();
        assert_eq!(swapped.dim(), (2, 2, 3));

        let Voxels::I16(array) = &swapped else {
            panic!("element type changed");
        };
        // source[s, c, r] == swapped[s, r, c]
        assert_eq!(array[[0, 1, 2]], 5);
        assert_eq!(array[[1, 0, 1]], 8);
        assert_eq!(array.as_slice().unwrap(), &[0, 2, 4, 1, 3, 5, 6, 8, 10, 7, 9, 11]);
    }

    #[test]
    fn bytes_follow_swapped_axis_order() {
        let swapped = column_major_volume().swap_rows_and_columns();
        let bytes = swapped.as_bytes();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[2..4], &2i16.to_ne_bytes());
    }

    #[test]
    fn every_fourth_slice() {
        let volume = Voxels::U8(Array::from_shape_fn((9, 1, 1), |(s, _, _)| s as u8));
        let decimated = volume.every_nth_slice(4);
        assert_eq!(decimated.dim(), (3, 1, 1));
        assert_eq!(decimated.as_bytes().as_ref(), &[0, 4, 8]);
    }

    #[test]
    fn from_bytes_restores_typed_buffer() {
        let original = column_major_volume().swap_rows_and_columns();
        let restored = Voxels::from_bytes(original.layout(), &original.as_bytes()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        let layout = VoxelLayout {
            voxel_type: VoxelType::U16,
            shape: (1, 2, 2),
        };
        let err = Voxels::from_bytes(layout, &[0; 7]).unwrap_err();
        assert!(matches!(
            err,
            VolumeError::SizeMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn scan_volume_flags() {
        assert!(ScanVolume::NotLoaded.is_empty());
        let cached = ScanVolume::Compressed(CachedVolume {
            bytes: vec![1, 2],
            layout: None,
        });
        assert!(cached.is_compressed());
        assert!(!cached.is_empty());
    }
}
