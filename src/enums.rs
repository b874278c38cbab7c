use std::fmt;

use serde::{Deserialize, Serialize};

/// Anatomical region a scan covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPart {
    #[default]
    Brain,
    Cspine,
}

/// Plane along which the slices of a scan are stacked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    Axial,
    Sagittal,
    Coronal,
}

impl Plane {
    /// Index of the patient coordinate (x, y, z) that changes from slice to slice.
    pub fn slice_axis(self) -> usize {
        match self {
            Plane::Sagittal => 0,
            Plane::Coronal => 1,
            Plane::Axial => 2,
        }
    }
}

/// Element type of a voxel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoxelType {
    U8,
    I16,
    U16,
    I32,
    F32,
    F64,
}

impl VoxelType {
    /// Width of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            VoxelType::U8 => 1,
            VoxelType::I16 | VoxelType::U16 => 2,
            VoxelType::I32 | VoxelType::F32 => 4,
            VoxelType::F64 => 8,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            VoxelType::U8 => 1,
            VoxelType::I16 => 2,
            VoxelType::U16 => 3,
            VoxelType::I32 => 4,
            VoxelType::F32 => 5,
            VoxelType::F64 => 6,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(VoxelType::U8),
            2 => Some(VoxelType::I16),
            3 => Some(VoxelType::U16),
            4 => Some(VoxelType::I32),
            5 => Some(VoxelType::F32),
            6 => Some(VoxelType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyPart::Brain => write!(f, "brain"),
            BodyPart::Cspine => write!(f, "cspine"),
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Axial => write!(f, "axial"),
            Plane::Sagittal => write!(f, "sagittal"),
            Plane::Coronal => write!(f, "coronal"),
        }
    }
}
