//! # CT scan store
//!
//! This crate loads CT scans and their geometry from the hierarchical
//! container files an upstream acquisition pipeline produces, and keeps a
//! gzip cache of the raw voxel buffers so repeated reads skip the container.
//!
//! Externally produced files are often incomplete, so loading is tolerant:
//! only a missing file, a missing volume, a missing photometric
//! interpretation or an unresolvable scan plane fail a load. Everything else
//! is logged and left empty. In particular:
//!  - Body part defaults to brain when the scan type tags are absent or unknown
//!  - Brain scans without a plane tag are assumed axial
//!  - Slice positions come from the per-slice table when present, otherwise
//!    they are extrapolated from the first slice and the slice spacing
//!
//! Volumes are always ordered (slice, row, column), whether they were read
//! from the container or from the cache.
//!
//! Container access goes through the [`container::Container`] trait. The
//! `hdf5` feature provides the file backed implementation; an in-memory
//! tree is always available.
//!
//! # Examples
//!
//! ## Loading a scan and caching its volume
//!
//! ```no_run
//! # #[cfg(feature = "hdf5")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ct_scan_store::{LoadOptions, ScanLoader, ScanStoreConfig, container::hdf5::Hdf5Opener};
//!
//! let loader = ScanLoader::new(Hdf5Opener, ScanStoreConfig::new("CTscans"));
//! let scan = loader.load("1.2.840.113704.1.111.7608.1361981364.7", LoadOptions::default())?;
//! println!("{} slices, {} plane", scan.size().0, scan.plane());
//! scan.store_compressed_volume()?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "hdf5"))]
//! # fn main() {}
//! ```

pub mod cache;
pub mod config;
pub mod container;
pub mod decode;
pub mod enums;
pub mod geometry;
pub mod metadata;
pub mod naming;
pub mod positions;
pub mod roi;
pub mod scan;
pub mod scan_loader;
pub mod volume;

pub use config::ScanStoreConfig;
pub use enums::{BodyPart, Plane, VoxelType};
pub use metadata::Metadata;
pub use positions::Position;
pub use scan::{Scan, ScanSummary};
pub use scan_loader::{LoadOptions, ScanLoadError, ScanLoader};
pub use volume::{ScanVolume, Voxels};
