//! Per-slice patient positions, read from the per-slice table when the
//! container has one and extrapolated from the first slice otherwise.

use thiserror::Error;

use crate::container::{Container, ContainerError, NodeKind, join};
use crate::decode::{self, DecodeError};
use crate::enums::Plane;
use crate::metadata::Metadata;

/// Patient coordinates (x, y, z) of a slice origin.
pub type Position = [f64; 3];

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Cannot obtain image position info for all slices")]
    MissingSpacing,

    #[error("Missing ImagePositionPatient of the first slice")]
    MissingFirstPosition,

    #[error("Expected 3 coordinates in {path}, found {len}")]
    Coordinates { path: String, len: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

fn to_position(values: &[f64], path: &str) -> Result<Position, PositionError> {
    match values {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(PositionError::Coordinates {
            path: path.to_string(),
            len: values.len(),
        }),
    }
}

/// A group is empty without members, a dataset when all its elements are zero.
pub fn is_empty_table(container: &impl Container, path: &str) -> Result<bool, PositionError> {
    match container.node(path) {
        None => Ok(true),
        Some(NodeKind::Group { children }) => Ok(children == 0),
        Some(NodeKind::Dataset { .. }) => {
            let values = container.read_numeric(path)?;
            Ok(values.iter().all(|&value| value == 0.0))
        }
    }
}

/// Dereferences the `ImagePositionPatient` entry of every slice in the table.
pub fn read_exact_positions(
    container: &impl Container,
    all_metadata: &str,
) -> Result<Vec<Position>, PositionError> {
    let cell = container.read_cell(&join(all_metadata, "ImagePositionPatient"))?;
    cell.first_column()
        .into_iter()
        .map(|reference| {
            let row = decode::read_first_row(container, reference.path())?;
            to_position(&row, reference.path())
        })
        .collect()
}

/// Steps `spacing` along the axis `plane` stacks slices on, starting at `base`.
/// This is an approximation; the result is not measured geometry.
pub fn extrapolate_positions(
    base: Position,
    spacing: f64,
    plane: Plane,
    num_slices: usize,
) -> Vec<Position> {
    let axis = plane.slice_axis();
    (0..num_slices)
        .map(|i| {
            let mut position = base;
            position[axis] += i as f64 * spacing;
            position
        })
        .collect()
}

/// One position per slice, ordered by slice index.
pub fn reconstruct_positions(
    container: &impl Container,
    all_metadata: &str,
    first_slice: &Metadata,
    plane: Plane,
    num_slices: usize,
) -> Result<Vec<Position>, PositionError> {
    if !is_empty_table(container, all_metadata)? {
        return read_exact_positions(container, all_metadata);
    }

    let spacing = first_slice
        .spacing_between_slices
        .ok_or(PositionError::MissingSpacing)?;
    let base = first_slice
        .image_position_patient
        .as_deref()
        .ok_or(PositionError::MissingFirstPosition)?;
    let base = to_position(base, "ImagePositionPatient")?;

    Ok(extrapolate_positions(base, spacing, plane, num_slices))
}
