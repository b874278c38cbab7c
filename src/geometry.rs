//! Body part and scan plane inference from the free-form tags in the extra
//! data node.

use thiserror::Error;
use tracing::warn;

use crate::container::{Container, join};
use crate::decode;
use crate::enums::{BodyPart, Plane};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Unsupported plane: {0}")]
    UnsupportedPlane(String),

    #[error("Missing scan plane")]
    MissingPlane,
}

/// Maps scan type tags to a body part. Unknown or absent tags mean brain.
pub fn classify_body_part(tags: &[String]) -> BodyPart {
    if tags.iter().any(|tag| tag == "hemo") {
        BodyPart::Brain
    } else if tags.iter().any(|tag| tag == "cspine") {
        BodyPart::Cspine
    } else {
        warn!(?tags, "unsupported scan type, assuming hemo");
        BodyPart::Brain
    }
}

/// Maps a plane description such as `"Ax recon"` to a plane.
pub fn classify_plane(text: &str) -> Result<Plane, GeometryError> {
    let lowered = text.to_lowercase();
    if lowered.contains("ax") {
        Ok(Plane::Axial)
    } else if lowered.contains("sag") {
        Ok(Plane::Sagittal)
    } else if lowered.contains("cor") {
        Ok(Plane::Coronal)
    } else {
        Err(GeometryError::UnsupportedPlane(text.to_string()))
    }
}

/// Decodes a cell array of strings. Entries that fail to decode are skipped.
pub fn read_text_cell(container: &impl Container, path: &str) -> Vec<String> {
    let cell = match container.read_cell(path) {
        Ok(cell) => cell,
        Err(err) => {
            warn!(path, error = %err, "unreadable cell array");
            return Vec::new();
        }
    };

    cell.first_column()
        .into_iter()
        .filter_map(|reference| match decode::read_text(container, reference.path()) {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(path, error = %err, "skipping unreadable cell entry");
                None
            }
        })
        .collect()
}

pub fn read_body_part(container: &impl Container, extra_data: &str) -> BodyPart {
    let path = join(extra_data, "type");
    if !container.contains(&path) {
        warn!("missing scan type, assuming hemo");
        return BodyPart::Brain;
    }
    classify_body_part(&read_text_cell(container, &path))
}

/// Reads the scan plane. A filler-only tag counts as missing. The brain
/// fallback for a missing plane is left to the caller since it depends on the
/// body part.
pub fn read_plane(container: &impl Container, extra_data: &str) -> Result<Plane, GeometryError> {
    let path = join(extra_data, "plane");
    if !container.contains(&path) {
        return Err(GeometryError::MissingPlane);
    }
    let text = decode::read_text(container, &path).map_err(|err| {
        warn!(error = %err, "unreadable scan plane");
        GeometryError::MissingPlane
    })?;
    if text.is_empty() {
        warn!("empty scan plane");
        return Err(GeometryError::MissingPlane);
    }
    classify_plane(&text)
}

/// Whether a brain scan may be a down-sampled "short" acquisition. Only an
/// explicit `short` mark rules it out.
pub fn read_is_simulated_short(container: &impl Container, extra_data: &str) -> bool {
    let path = join(extra_data, "specialmarks");
    if !container.contains(&path) {
        return true;
    }
    !read_text_cell(container, &path)
        .iter()
        .any(|mark| mark.contains("short"))
}
