//! Read access to the hierarchical container a scan is stored in.
//!
//! Only the operations the scan loader needs are modelled: probing a node,
//! reading numeric and character datasets, reading cell arrays of references
//! and reading the voxel buffer. Paths are `/`-separated and relative to the
//! file root.

use std::path::Path;

use ndarray::ArrayD;
use thiserror::Error;

use crate::volume::Voxels;

#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod memory;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Missing node {0}")]
    Missing(String),

    #[error("Node {path} is not a {expected}")]
    WrongKind { path: String, expected: &'static str },

    #[error("Unsupported element type in {0}")]
    UnsupportedType(String),

    #[error("Unexpected shape {shape:?} in {path}")]
    Shape { path: String, shape: Vec<usize> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] ::hdf5::Error),
}

/// What sits at a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Group { children: usize },
    Dataset { shape: Vec<usize> },
}

/// Reference stored in a cell array. Holds the path of the referenced dataset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef(pub String);

impl NodeRef {
    pub fn path(&self) -> &str {
        &self.0
    }
}

/// Contents of a cell array dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellArray {
    /// Placeholder the producer writes for a cell array without entries.
    Empty,
    /// One entry per row, each row holding one or more references.
    Rows(Vec<Vec<NodeRef>>),
}

impl CellArray {
    /// First reference of every row.
    pub fn first_column(&self) -> Vec<&NodeRef> {
        match self {
            CellArray::Empty => Vec::new(),
            CellArray::Rows(rows) => rows.iter().filter_map(|row| row.first()).collect(),
        }
    }
}

pub trait Container {
    fn node(&self, path: &str) -> Option<NodeKind>;

    fn contains(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    /// Reads a numeric dataset of any element type, converted to `f64`.
    fn read_numeric(&self, path: &str) -> Result<ArrayD<f64>, ContainerError>;

    /// Reads a character dataset as its raw 16-bit code units.
    fn read_chars(&self, path: &str) -> Result<Vec<u16>, ContainerError>;

    fn read_cell(&self, path: &str) -> Result<CellArray, ContainerError>;

    /// Reads a three-dimensional dataset in its stored axis order.
    fn read_volume(&self, path: &str) -> Result<Voxels, ContainerError>;
}

/// Opens the container stored at a path.
pub trait ContainerOpener {
    type Container: Container;

    fn open(&self, path: &Path) -> Result<Self::Container, ContainerError>;
}

impl<C, F> ContainerOpener for F
where
    C: Container,
    F: Fn(&Path) -> Result<C, ContainerError>,
{
    type Container = C;

    fn open(&self, path: &Path) -> Result<C, ContainerError> {
        self(path)
    }
}

pub(crate) fn join(parent: &str, child: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        child.trim_matches('/').to_string()
    } else {
        format!("{parent}/{}", child.trim_matches('/'))
    }
}
