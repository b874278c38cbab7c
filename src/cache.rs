//! Gzip cache of raw voxel buffers.
//!
//! The decompressed stream is exactly the voxel bytes in (slice, row, column)
//! order, so it can be streamed to clients as is. Element type and shape are
//! kept in a subfield of the gzip `FEXTRA` header (RFC 1952, 2.3.1.1):
//!
//! | bytes  | content                          |
//! |--------|----------------------------------|
//! | 0..2   | subfield id `VX`                 |
//! | 2..4   | data length, 14 as u16 LE        |
//! | 4      | element type code                |
//! | 5      | reserved, zero                   |
//! | 6..18  | slices, rows, columns as u32 LE  |
//!
//! Files without the record are still readable; their layout is unknown.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use thiserror::Error;
use tracing::{debug, warn};

use crate::enums::VoxelType;
use crate::naming;
use crate::volume::{CachedVolume, VoxelLayout, Voxels};

const LAYOUT_ID: &[u8; 2] = b"VX";
/// Subfield data length: type code, reserved byte and three `u32` dimensions.
const LAYOUT_DATA_LEN: u16 = 14;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn encode_layout(layout: &VoxelLayout) -> Option<Vec<u8>> {
    let (slices, rows, columns) = layout.shape;
    let mut record = Vec::with_capacity(4 + usize::from(LAYOUT_DATA_LEN));
    record.extend_from_slice(LAYOUT_ID);
    record.extend_from_slice(&LAYOUT_DATA_LEN.to_le_bytes());
    record.push(layout.voxel_type.code());
    record.push(0);
    for dim in [slices, rows, columns] {
        record.extend_from_slice(&u32::try_from(dim).ok()?.to_le_bytes());
    }
    Some(record)
}

/// Finds the layout subfield among the `FEXTRA` subfields.
fn decode_layout(mut extra: &[u8]) -> Option<VoxelLayout> {
    while let [id0, id1, len0, len1, rest @ ..] = extra {
        let len = usize::from(u16::from_le_bytes([*len0, *len1]));
        let data = rest.get(..len)?;
        if [*id0, *id1] == *LAYOUT_ID {
            return decode_layout_data(data);
        }
        extra = &rest[len..];
    }
    None
}

fn decode_layout_data(data: &[u8]) -> Option<VoxelLayout> {
    if data.len() != usize::from(LAYOUT_DATA_LEN) {
        return None;
    }
    let voxel_type = VoxelType::from_code(data[0])?;
    let dim = |offset: usize| -> Option<usize> {
        let bytes: [u8; 4] = data[offset..offset + 4].try_into().ok()?;
        usize::try_from(u32::from_le_bytes(bytes)).ok()
    };
    Some(VoxelLayout {
        voxel_type,
        shape: (dim(2)?, dim(6)?, dim(10)?),
    })
}

/// Compresses `voxels` at the highest level into `path`. The data is written to
/// a sibling file first and renamed into place once complete.
pub fn write_volume(path: &Path, voxels: &Voxels) -> Result<(), CacheError> {
    let partial = path.with_extension("partial");
    let mut builder = GzBuilder::new();
    match encode_layout(&voxels.layout()) {
        Some(record) => builder = builder.extra(record),
        None => warn!(shape = ?voxels.dim(), "volume too large for a layout record"),
    }

    let file = File::create(&partial)?;
    let mut encoder = builder.write(BufWriter::new(file), Compression::best());
    encoder.write_all(&voxels.as_bytes())?;
    encoder.finish()?.flush()?;

    fs::rename(&partial, path)?;
    debug!(path = %path.display(), "wrote compressed volume");
    Ok(())
}

/// Decompresses a cache file completely into memory.
pub fn read_volume(path: &Path) -> Result<CachedVolume, CacheError> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes)?;

    let layout = decoder
        .header()
        .and_then(|header| header.extra())
        .and_then(decode_layout);
    let layout = match layout {
        Some(layout) if layout.byte_len() != bytes.len() => {
            warn!(
                path = %path.display(),
                expected = layout.byte_len(),
                actual = bytes.len(),
                "ignoring layout record that does not match the cached data"
            );
            None
        }
        layout => layout,
    };

    Ok(CachedVolume { bytes, layout })
}

/// Directory of cached volumes, keyed by scan identifier.
#[derive(Clone, Debug)]
pub struct VolumeCache {
    dir: PathBuf,
}

impl VolumeCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, uid: &str) -> PathBuf {
        naming::cache_path(&self.dir, uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.path_for(uid).is_file()
    }

    pub fn store(&self, uid: &str, voxels: &Voxels) -> Result<(), CacheError> {
        write_volume(&self.path_for(uid), voxels)
    }

    pub fn load(&self, uid: &str) -> Result<CachedVolume, CacheError> {
        read_volume(&self.path_for(uid))
    }
}
