use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheError, VolumeCache};
use crate::enums::{BodyPart, Plane, VoxelType};
use crate::metadata::Metadata;
use crate::positions::Position;
use crate::volume::{ScanVolume, VolumeError, VoxelLayout, Voxels};

/// Slice step applied to simulated short brain scans before caching.
pub const SHORT_SCAN_DECIMATION: usize = 4;

/// A CT scan with its geometry, clinical metadata and (optionally) voxels.
///
/// Built by [`crate::scan_loader::ScanLoader`]; the volume is ordered
/// (slice, row, column) whichever path it was loaded through.
#[derive(Clone, Debug)]
pub struct Scan {
    pub(crate) uid: String,
    pub(crate) directory: PathBuf,
    pub(crate) compressed_volume_directory: PathBuf,
    pub(crate) name: String,
    pub(crate) default_window: Vec<f64>,
    pub(crate) normalized_window: Vec<f64>,
    pub(crate) metadata: Metadata,
    pub(crate) body_part: BodyPart,
    pub(crate) plane: Plane,
    pub(crate) size: (usize, usize, usize),
    pub(crate) image_orientation: Option<Vec<f64>>,
    pub(crate) image_positions: Vec<Position>,
    pub(crate) is_simulated_short: bool,
    pub(crate) volume: ScanVolume,
}

/// Worklist entry for a scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub uid: String,
    pub accession_number: Option<String>,
    pub patient_name: String,
}

impl Scan {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn compressed_volume_directory(&self) -> &Path {
        &self.compressed_volume_directory
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_window(&self) -> &[f64] {
        &self.default_window
    }

    pub fn normalized_window(&self) -> &[f64] {
        &self.normalized_window
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn body_part(&self) -> BodyPart {
        self.body_part
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    /// (slices, rows, columns)
    pub fn size(&self) -> (usize, usize, usize) {
        self.size
    }

    pub fn image_orientation(&self) -> Option<&[f64]> {
        self.image_orientation.as_deref()
    }

    /// One position per slice. Empty when neither a position table nor the
    /// slice spacing was available.
    pub fn image_positions(&self) -> &[Position] {
        &self.image_positions
    }

    pub fn is_simulated_short(&self) -> bool {
        self.is_simulated_short
    }

    pub fn is_color_image(&self) -> bool {
        self.metadata.is_color_image()
    }

    pub fn volume(&self) -> &ScanVolume {
        &self.volume
    }

    pub fn is_volume_compressed(&self) -> bool {
        self.volume.is_compressed()
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            uid: self.uid.clone(),
            accession_number: self.metadata.accession_number.clone(),
            patient_name: self.name.clone(),
        }
    }

    pub fn cache(&self) -> VolumeCache {
        VolumeCache::new(&self.compressed_volume_directory)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache().path_for(&self.uid)
    }

    /// Whether the cached copy of this scan keeps only every fourth slice.
    pub fn decimates_cache(&self) -> bool {
        self.body_part == BodyPart::Brain && self.is_simulated_short
    }

    /// Voxel bytes in (slice, row, column) order, as served to viewers.
    pub fn volume_bytes(&self) -> Option<Cow<'_, [u8]>> {
        match &self.volume {
            ScanVolume::NotLoaded => None,
            ScanVolume::Raw(voxels) => Some(voxels.as_bytes()),
            ScanVolume::Compressed(cached) => Some(Cow::Borrowed(&cached.bytes)),
        }
    }

    /// The typed voxel buffer. Cached volumes are rebuilt from the layout
    /// stored with them; `None` if no volume was loaded or the cache file
    /// carries no layout (see [`Scan::typed_volume_as`]).
    pub fn typed_volume(&self) -> Result<Option<Cow<'_, Voxels>>, VolumeError> {
        match &self.volume {
            ScanVolume::NotLoaded => Ok(None),
            ScanVolume::Raw(voxels) => Ok(Some(Cow::Borrowed(voxels))),
            ScanVolume::Compressed(cached) => match cached.layout {
                Some(layout) => Ok(Some(Cow::Owned(Voxels::from_bytes(layout, &cached.bytes)?))),
                None => Ok(None),
            },
        }
    }

    /// Like [`Scan::typed_volume`], assuming `voxel_type` and the scan size for
    /// cache files without a layout record.
    pub fn typed_volume_as(
        &self,
        voxel_type: VoxelType,
    ) -> Result<Option<Cow<'_, Voxels>>, VolumeError> {
        match &self.volume {
            ScanVolume::Compressed(cached) if cached.layout.is_none() => {
                let layout = VoxelLayout {
                    voxel_type,
                    shape: self.cached_shape(),
                };
                Ok(Some(Cow::Owned(Voxels::from_bytes(layout, &cached.bytes)?)))
            }
            _ => self.typed_volume(),
        }
    }

    /// Shape of the buffer a cache file holds for this scan.
    fn cached_shape(&self) -> (usize, usize, usize) {
        let (slices, rows, columns) = self.size;
        if self.decimates_cache() {
            (slices.div_ceil(SHORT_SCAN_DECIMATION), rows, columns)
        } else {
            self.size
        }
    }

    /// Writes the voxel buffer to the compressed cache. Simulated short brain
    /// scans keep only every fourth slice, which cannot be undone.
    ///
    /// Returns `false` without writing if there is no raw volume to store.
    pub fn store_compressed_volume(&self) -> Result<bool, CacheError> {
        let ScanVolume::Raw(voxels) = &self.volume else {
            return Ok(false);
        };
        if voxels.is_empty() {
            return Ok(false);
        }

        let cache = self.cache();
        if self.decimates_cache() {
            debug!(uid = %self.uid, "decimating simulated short scan before caching");
            cache.store(&self.uid, &voxels.every_nth_slice(SHORT_SCAN_DECIMATION))?;
        } else {
            cache.store(&self.uid, voxels)?;
        }
        Ok(true)
    }
}
