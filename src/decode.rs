//! Decoding of text and numeric fields stored in a container.

use ndarray::Axis;
use thiserror::Error;

use crate::container::{Container, ContainerError};

/// Text whose code units all fall below this value is filler written for an
/// unset string.
const FILLER_LIMIT: u16 = 20;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("Invalid UTF-16 text in {0}")]
    InvalidText(String),

    #[error("Expected a single value in {path}, found {len}")]
    NotScalar { path: String, len: usize },

    #[error("Empty dataset {0}")]
    Empty(String),
}

/// Decodes 16-bit code units. Filler-only input, including no input at all,
/// decodes to an empty string.
pub fn decode_text(units: &[u16]) -> Result<String, std::string::FromUtf16Error> {
    if units.iter().all(|&unit| unit < FILLER_LIMIT) {
        return Ok(String::new());
    }
    String::from_utf16(units)
}

pub fn read_text(container: &impl Container, path: &str) -> Result<String, DecodeError> {
    let units = container.read_chars(path)?;
    decode_text(&units).map_err(|_| DecodeError::InvalidText(path.to_string()))
}

/// Reads a dataset holding exactly one number.
pub fn read_scalar(container: &impl Container, path: &str) -> Result<f64, DecodeError> {
    let array = container.read_numeric(path)?;
    match array.len() {
        1 => Ok(array.iter().copied().next().unwrap_or_default()),
        len => Err(DecodeError::NotScalar {
            path: path.to_string(),
            len,
        }),
    }
}

/// Reads the first row of a dataset. The producer repeats these fields per
/// element, only the first row carries meaning.
pub fn read_first_row(container: &impl Container, path: &str) -> Result<Vec<f64>, DecodeError> {
    let array = container.read_numeric(path)?;
    if array.is_empty() {
        return Err(DecodeError::Empty(path.to_string()));
    }
    if array.ndim() < 2 {
        return Ok(array.iter().take(1).copied().collect());
    }
    Ok(array.index_axis(Axis(0), 0).iter().copied().collect())
}

/// Reads every element of a dataset in storage order.
pub fn read_values(container: &impl Container, path: &str) -> Result<Vec<f64>, DecodeError> {
    Ok(container.read_numeric(path)?.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::memory::MemoryContainer;
    use ndarray::{ArrayD, IxDyn};

    fn utf16(text: &str) -> Vec<u16> {
        text.encode_utf16().collect()
    }

    #[test]
    fn filler_decodes_to_empty() {
        assert_eq!(decode_text(&[0, 0]).unwrap(), "");
        assert_eq!(decode_text(&[19, 3, 0]).unwrap(), "");
        assert_eq!(decode_text(&[]).unwrap(), "");
    }

    #[test]
    fn text_decodes_utf16() {
        assert_eq!(decode_text(&utf16("ACC123")).unwrap(), "ACC123");
        assert_eq!(decode_text(&utf16("Müller")).unwrap(), "Müller");
    }

    #[test]
    fn unpaired_surrogate_is_an_error() {
        let container = MemoryContainer::new().with_chars("name", vec![0x0041, 0xD800]);
        assert!(matches!(
            read_text(&container, "name"),
            Err(DecodeError::InvalidText(_))
        ));
    }

    #[test]
    fn scalar_unwraps_single_element() {
        let container = MemoryContainer::new()
            .with_values("slope", &[1.5])
            .with_values("pair", &[1.0, 2.0]);
        assert_eq!(read_scalar(&container, "slope").unwrap(), 1.5);
        assert!(matches!(
            read_scalar(&container, "pair"),
            Err(DecodeError::NotScalar { len: 2, .. })
        ));
    }

    #[test]
    fn first_row_of_repeated_field() {
        let repeated = ArrayD::from_shape_vec(
            IxDyn(&[2, 3]),
            vec![-120.0, -110.5, 40.0, -120.0, -110.5, 45.0],
        )
        .unwrap();
        let container = MemoryContainer::new().with_numeric("ImagePositionPatient", repeated);
        assert_eq!(
            read_first_row(&container, "ImagePositionPatient").unwrap(),
            vec![-120.0, -110.5, 40.0]
        );
    }

    #[test]
    fn first_row_of_empty_dataset() {
        let empty = ArrayD::from_shape_vec(IxDyn(&[0, 3]), vec![]).unwrap();
        let container = MemoryContainer::new().with_numeric("PixelSpacing", empty);
        assert!(matches!(
            read_first_row(&container, "PixelSpacing"),
            Err(DecodeError::Empty(_))
        ));
    }
}
