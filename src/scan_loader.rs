use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::VolumeCache;
use crate::config::ScanStoreConfig;
use crate::container::{Container, ContainerError, ContainerOpener, NodeKind};
use crate::decode;
use crate::enums::{BodyPart, Plane};
use crate::geometry::{self, GeometryError};
use crate::metadata::{self, MetadataError};
use crate::naming;
use crate::positions::{self, Position};
use crate::scan::{Scan, ScanSummary};
use crate::volume::ScanVolume;

const VOLUME: &str = "volume";
const NAME: &str = "name";
const SIZE: &str = "size";
const DEFAULT_WINDOW: &str = "defWindow";
const WINDOW_SHIFT: &str = "matlabWindowShift";
const METADATA: &str = "metadata";
const EXTRA_DATA: &str = "extraData";
const ALL_METADATA: &str = "all_metadata";

#[derive(Debug, Error)]
pub enum ScanLoadError {
    #[error("Could not find file {0}")]
    NotFound(PathBuf),

    #[error("Invalid scan in file {0}")]
    InvalidFile(PathBuf),

    #[error("Unsupported plane: {0}")]
    UnsupportedPlane(String),

    #[error("Missing scan plane")]
    MissingPlane,

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
}

impl From<GeometryError> for ScanLoadError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::UnsupportedPlane(text) => ScanLoadError::UnsupportedPlane(text),
            GeometryError::MissingPlane => ScanLoadError::MissingPlane,
        }
    }
}

/// What to read besides metadata and geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    pub read_volume: bool,
    /// Use a cached volume when one exists instead of reading the container.
    pub prefer_compressed_cache: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            read_volume: true,
            prefer_compressed_cache: true,
        }
    }
}

impl LoadOptions {
    pub fn metadata_only() -> Self {
        Self {
            read_volume: false,
            ..Default::default()
        }
    }
}

/// Logs a position list that does not cover every slice. Returns whether
/// the counts agree; an empty list was already reported.
fn check_position_count(uid: &str, positions: &[Position], slices: usize) -> bool {
    if positions.is_empty() || positions.len() == slices {
        return true;
    }
    warn!(
        uid,
        expected = slices,
        found = positions.len(),
        "image position count does not match slice count"
    );
    false
}

/// Loads scans by identifier from the configured directories.
pub struct ScanLoader<O> {
    opener: O,
    config: ScanStoreConfig,
}

impl<O: ContainerOpener> ScanLoader<O> {
    pub fn new(opener: O, config: ScanStoreConfig) -> Self {
        Self { opener, config }
    }

    pub fn config(&self) -> &ScanStoreConfig {
        &self.config
    }

    /// Options matching the configured cache preference.
    pub fn default_options(&self) -> LoadOptions {
        LoadOptions {
            read_volume: true,
            prefer_compressed_cache: self.config.prefer_compressed_cache,
        }
    }

    pub fn container_path(&self, uid: &str) -> PathBuf {
        naming::container_path(&self.config.scans_dir, uid)
    }

    /// Load a scan by identifier
    ///
    /// # Errors
    ///
    /// Returns error if the container file does not exist, lacks a volume,
    /// has no readable photometric interpretation, or has a plane that cannot
    /// be resolved. Other unreadable fields are logged and left empty.
    pub fn load(&self, uid: &str, options: LoadOptions) -> Result<Scan, ScanLoadError> {
        let path = self.container_path(uid);
        if !path.is_file() {
            return Err(ScanLoadError::NotFound(path));
        }

        // The container is closed when it goes out of scope at the end of this call.
        let container = self.opener.open(&path)?;
        self.load_from_container(uid, &container, &path, options)
    }

    /// Builds a scan from an already opened container. `source` is only used
    /// in error messages.
    pub fn load_from_container(
        &self,
        uid: &str,
        container: &impl Container,
        source: &Path,
        options: LoadOptions,
    ) -> Result<Scan, ScanLoadError> {
        let Some(NodeKind::Dataset { shape: volume_shape }) = container.node(VOLUME) else {
            return Err(ScanLoadError::InvalidFile(source.to_path_buf()));
        };
        debug!(uid, path = %source.display(), "loading scan");

        let name = Self::read_name(uid, container);
        let (default_window, normalized_window) = Self::read_windows(uid, container);
        let metadata = metadata::read_metadata(container, METADATA, EXTRA_DATA)?;
        let body_part = geometry::read_body_part(container, EXTRA_DATA);
        let plane = Self::resolve_plane(uid, container, body_part)?;

        let image_orientation = metadata.image_orientation_patient.clone();
        if image_orientation.is_none() {
            warn!(uid, "missing ImageOrientationPatient");
        }

        let size = Self::read_size(uid, container, &volume_shape);

        let image_positions = positions::reconstruct_positions(
            container,
            ALL_METADATA,
            &metadata,
            plane,
            size.0,
        )
        .unwrap_or_else(|err| {
            warn!(uid, error = %err, "no image positions");
            Vec::new()
        });
        check_position_count(uid, &image_positions, size.0);

        let is_simulated_short = match body_part {
            BodyPart::Brain => geometry::read_is_simulated_short(container, EXTRA_DATA),
            BodyPart::Cspine => false,
        };

        let compressed_volume_directory = self.config.cache_dir().to_path_buf();
        let volume = if options.read_volume {
            Self::read_volume(
                uid,
                container,
                &VolumeCache::new(&compressed_volume_directory),
                options.prefer_compressed_cache,
            )?
        } else {
            ScanVolume::NotLoaded
        };

        Ok(Scan {
            uid: uid.to_string(),
            directory: self.config.scans_dir.clone(),
            compressed_volume_directory,
            name,
            default_window,
            normalized_window,
            metadata,
            body_part,
            plane,
            size,
            image_orientation,
            image_positions,
            is_simulated_short,
            volume,
        })
    }

    fn read_name(uid: &str, container: &impl Container) -> String {
        decode::read_text(container, NAME).unwrap_or_else(|err| {
            warn!(uid, error = %err, "unreadable patient name");
            String::new()
        })
    }

    /// Default window and the default window moved by the stored shift.
    fn read_windows(uid: &str, container: &impl Container) -> (Vec<f64>, Vec<f64>) {
        let window = decode::read_values(container, DEFAULT_WINDOW).unwrap_or_else(|err| {
            warn!(uid, error = %err, "unreadable default window");
            Vec::new()
        });
        let shift = if container.contains(WINDOW_SHIFT) {
            decode::read_values(container, WINDOW_SHIFT).unwrap_or_else(|err| {
                warn!(uid, error = %err, "unreadable window shift");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let normalized = window
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let offset = match shift.len() {
                    1 => shift[0],
                    _ => shift.get(i).copied().unwrap_or_default(),
                };
                value + offset
            })
            .collect();
        (window, normalized)
    }

    fn resolve_plane(
        uid: &str,
        container: &impl Container,
        body_part: BodyPart,
    ) -> Result<Plane, ScanLoadError> {
        match geometry::read_plane(container, EXTRA_DATA) {
            Ok(plane) => Ok(plane),
            Err(GeometryError::MissingPlane) if body_part == BodyPart::Brain => {
                warn!(uid, "missing scan plane, assuming axial");
                Ok(Plane::Axial)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// (slices, rows, columns) from the stored size, which is ordered
    /// (rows, columns, slices), or else from the volume shape, which is
    /// ordered (slices, columns, rows).
    fn read_size(
        uid: &str,
        container: &impl Container,
        volume_shape: &[usize],
    ) -> (usize, usize, usize) {
        if container.contains(SIZE) {
            match decode::read_values(container, SIZE).as_deref() {
                Ok(&[rows, columns, slices]) if rows >= 0.0 && columns >= 0.0 && slices >= 0.0 => {
                    return (slices as usize, rows as usize, columns as usize);
                }
                Ok(values) => warn!(uid, ?values, "malformed size field, computing from volume"),
                Err(err) => {
                    warn!(uid, error = %err, "unreadable size field, computing from volume")
                }
            }
        } else {
            warn!(uid, "missing size field, computing from volume");
        }

        match volume_shape {
            [slices, columns, rows] => (*slices, *rows, *columns),
            _ => {
                warn!(uid, shape = ?volume_shape, "volume is not three-dimensional");
                (volume_shape.first().copied().unwrap_or_default(), 0, 0)
            }
        }
    }

    fn read_volume(
        uid: &str,
        container: &impl Container,
        cache: &VolumeCache,
        prefer_compressed_cache: bool,
    ) -> Result<ScanVolume, ScanLoadError> {
        if prefer_compressed_cache && cache.contains(uid) {
            match cache.load(uid) {
                Ok(cached) if !cached.bytes.is_empty() => {
                    debug!(uid, "using compressed volume");
                    return Ok(ScanVolume::Compressed(cached));
                }
                Ok(_) => warn!(uid, "compressed volume is empty"),
                Err(err) => warn!(uid, error = %err, "error reading compressed volume"),
            }
        }

        let voxels = container.read_volume(VOLUME)?.swap_rows_and_columns();
        Ok(ScanVolume::Raw(voxels))
    }
}

impl<O: ContainerOpener + Sync> ScanLoader<O> {
    /// Worklist summaries for `uids`, in the given order. Scans that fail to
    /// load are logged and left out.
    pub fn load_many<S: AsRef<str> + Sync>(&self, uids: &[S]) -> Vec<ScanSummary> {
        let summaries: Vec<ScanSummary> = uids
            .par_iter()
            .filter_map(|uid| {
                let uid = uid.as_ref();
                match self.load(uid, LoadOptions::metadata_only()) {
                    Ok(scan) => Some(scan.summary()),
                    Err(err) => {
                        warn!(uid, error = %err, "skipping scan");
                        None
                    }
                }
            })
            .collect();
        info!(requested = uids.len(), loaded = summaries.len(), "loaded worklist");
        summaries
    }
}
