//! HDF5 backed container, as written by MATLAB for `-v7.3` files.
//!
//! Character data is stored as `uint16` code units, cell arrays as datasets
//! of object references into `#refs#`. A cell array without entries is
//! written as an integer dataset instead of a reference dataset.

use std::path::Path;

use ::hdf5::types::{FloatSize, IntSize, TypeDescriptor};
use ::hdf5::{Dataset, File, H5Type, ObjectReference1, ReferencedObject};
use ndarray::{Array3, ArrayD, IxDyn};
use tracing::debug;

use super::{CellArray, Container, ContainerError, ContainerOpener, NodeKind, NodeRef};
use crate::volume::Voxels;

/// Read-only handle on an open HDF5 file. The file is closed on drop.
pub struct Hdf5Container {
    file: File,
}

impl Hdf5Container {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening container");
        Ok(Self {
            file: File::open(path)?,
        })
    }

    fn dataset(&self, path: &str) -> Result<Dataset, ContainerError> {
        self.file
            .dataset(path.trim_matches('/'))
            .map_err(|_| ContainerError::Missing(path.to_string()))
    }

    fn read_shaped<T: H5Type>(dataset: &Dataset, path: &str) -> Result<ArrayD<T>, ContainerError> {
        let shape = dataset.shape();
        let values = dataset.read_raw::<T>()?;
        ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|_| ContainerError::Shape {
            path: path.to_string(),
            shape,
        })
    }

    fn read_volume_as<T: H5Type>(
        dataset: &Dataset,
        path: &str,
    ) -> Result<Array3<T>, ContainerError> {
        let shape = dataset.shape();
        let [d0, d1, d2] = shape[..] else {
            return Err(ContainerError::Shape {
                path: path.to_string(),
                shape,
            });
        };
        let values = dataset.read_raw::<T>()?;
        Array3::from_shape_vec((d0, d1, d2), values).map_err(|_| ContainerError::Shape {
            path: path.to_string(),
            shape,
        })
    }
}

impl Container for Hdf5Container {
    fn node(&self, path: &str) -> Option<NodeKind> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Some(NodeKind::Group {
                children: self.file.len() as usize,
            });
        }
        if let Ok(group) = self.file.group(path) {
            return Some(NodeKind::Group {
                children: group.len() as usize,
            });
        }
        self.file
            .dataset(path)
            .ok()
            .map(|dataset| NodeKind::Dataset {
                shape: dataset.shape(),
            })
    }

    fn read_numeric(&self, path: &str) -> Result<ArrayD<f64>, ContainerError> {
        let dataset = self.dataset(path)?;
        Self::read_shaped::<f64>(&dataset, path)
    }

    fn read_chars(&self, path: &str) -> Result<Vec<u16>, ContainerError> {
        Ok(self.dataset(path)?.read_raw::<u16>()?)
    }

    fn read_cell(&self, path: &str) -> Result<CellArray, ContainerError> {
        let dataset = self.dataset(path)?;
        match dataset.dtype()?.to_descriptor()? {
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
                return Ok(CellArray::Empty);
            }
            _ => {}
        }

        let shape = dataset.shape();
        let width = match shape.len() {
            0 | 1 => 1,
            _ => shape[1..].iter().product::<usize>().max(1),
        };

        let references = dataset.read_raw::<ObjectReference1>()?;
        let mut rows = Vec::with_capacity(references.len() / width);
        for chunk in references.chunks(width) {
            let mut row = Vec::with_capacity(chunk.len());
            for reference in chunk {
                match self.file.dereference(reference)? {
                    ReferencedObject::Dataset(target) => row.push(NodeRef(target.name())),
                    ReferencedObject::Group(target) => row.push(NodeRef(target.name())),
                    _ => {
                        return Err(ContainerError::WrongKind {
                            path: path.to_string(),
                            expected: "reference to a dataset",
                        });
                    }
                }
            }
            rows.push(row);
        }
        Ok(CellArray::Rows(rows))
    }

    fn read_volume(&self, path: &str) -> Result<Voxels, ContainerError> {
        let dataset = self.dataset(path)?;
        let voxels = match dataset.dtype()?.to_descriptor()? {
            TypeDescriptor::Unsigned(IntSize::U1) => {
                Voxels::U8(Self::read_volume_as(&dataset, path)?)
            }
            TypeDescriptor::Integer(IntSize::U2) => {
                Voxels::I16(Self::read_volume_as(&dataset, path)?)
            }
            TypeDescriptor::Unsigned(IntSize::U2) => {
                Voxels::U16(Self::read_volume_as(&dataset, path)?)
            }
            TypeDescriptor::Integer(IntSize::U4) => {
                Voxels::I32(Self::read_volume_as(&dataset, path)?)
            }
            TypeDescriptor::Float(FloatSize::U4) => {
                Voxels::F32(Self::read_volume_as(&dataset, path)?)
            }
            TypeDescriptor::Float(FloatSize::U8) => {
                Voxels::F64(Self::read_volume_as(&dataset, path)?)
            }
            _ => return Err(ContainerError::UnsupportedType(path.to_string())),
        };
        Ok(voxels)
    }
}

/// Opens scan files with [`Hdf5Container::open`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Hdf5Opener;

impl ContainerOpener for Hdf5Opener {
    type Container = Hdf5Container;

    fn open(&self, path: &Path) -> Result<Hdf5Container, ContainerError> {
        Hdf5Container::open(path)
    }
}
