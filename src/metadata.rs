use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::container::{Container, join};
use crate::decode::{self, DecodeError};

/// Photometric interpretations of colour images.
const COLOR_INTERPRETATIONS: [&str; 8] = [
    "RGB",
    "PALETTE COLOR",
    "YBR_FULL",
    "YBR_FULL_422",
    "YBR_PARTIAL_422",
    "YBR_PARTIAL_420",
    "YBR_RCT",
    "YBR_ICT",
];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Missing PhotometricInterpretation in {0}")]
    MissingPhotometricInterpretation(String),

    #[error("Unreadable PhotometricInterpretation: {0}")]
    PhotometricInterpretation(#[source] DecodeError),
}

/// Clinical fields of a scan. Every field except the photometric
/// interpretation may be absent from the container.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metadata {
    pub photometric_interpretation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accession_number: Option<String>,
    #[serde(rename = "StudyInstanceUID", skip_serializing_if = "Option::is_none")]
    pub study_instance_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescale_slope: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescale_intercept: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_spacing: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_thickness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing_between_slices: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_orientation_patient: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_position_patient: Option<Vec<f64>>,
    #[serde(rename = "FrameOfReferenceUID", skip_serializing_if = "Option::is_none")]
    pub frame_of_reference_uid: Option<String>,
}

impl Metadata {
    pub fn is_color_image(&self) -> bool {
        let interpretation = self.photometric_interpretation.trim().to_uppercase();
        COLOR_INTERPRETATIONS
            .iter()
            .any(|&color| color == interpretation)
    }
}

/// Reads an optional field. Missing keys yield `None`, unreadable values are
/// logged and also yield `None`.
fn optional<C, T>(
    container: &C,
    node: &str,
    key: &str,
    read: impl Fn(&C, &str) -> Result<T, DecodeError>,
) -> Option<T>
where
    C: Container,
{
    let path = join(node, key);
    if !container.contains(&path) {
        return None;
    }
    match read(container, &path) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(field = key, error = %err, "skipping unreadable metadata field");
            None
        }
    }
}

/// Accession number from the extra data node, falling back to the metadata node.
fn accession_number(
    container: &impl Container,
    metadata: &str,
    extra_data: &str,
) -> Option<String> {
    optional(container, extra_data, "AN", decode::read_text)
        .filter(|an| !an.is_empty())
        .or_else(|| optional(container, metadata, "AccessionNumber", decode::read_text))
}

/// Reads the clinical fields stored under `metadata`, with `extra_data` as the
/// preferred source of the accession number.
pub fn read_metadata(
    container: &impl Container,
    metadata: &str,
    extra_data: &str,
) -> Result<Metadata, MetadataError> {
    let interpretation_path = join(metadata, "PhotometricInterpretation");
    if !container.contains(&interpretation_path) {
        return Err(MetadataError::MissingPhotometricInterpretation(
            metadata.to_string(),
        ));
    }
    let photometric_interpretation = decode::read_text(container, &interpretation_path)
        .map_err(MetadataError::PhotometricInterpretation)?;

    Ok(Metadata {
        photometric_interpretation,
        accession_number: accession_number(container, metadata, extra_data),
        study_instance_uid: optional(container, metadata, "StudyInstanceUID", decode::read_text),
        rescale_slope: optional(container, metadata, "RescaleSlope", decode::read_scalar),
        rescale_intercept: optional(container, metadata, "RescaleIntercept", decode::read_scalar),
        pixel_spacing: optional(container, metadata, "PixelSpacing", decode::read_first_row),
        slice_thickness: optional(container, metadata, "SliceThickness", decode::read_scalar),
        spacing_between_slices: optional(
            container,
            metadata,
            "SpacingBetweenSlices",
            decode::read_scalar,
        ),
        image_orientation_patient: optional(
            container,
            metadata,
            "ImageOrientationPatient",
            decode::read_first_row,
        ),
        image_position_patient: optional(
            container,
            metadata,
            "ImagePositionPatient",
            decode::read_first_row,
        ),
        frame_of_reference_uid: optional(
            container,
            metadata,
            "FrameOfReferenceUID",
            decode::read_text,
        ),
    })
}
