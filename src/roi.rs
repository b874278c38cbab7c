//! Rectangular regions of interest drawn on scan slices.
//!
//! ROIs drawn with the same colour across slices form a group. The file store
//! keeps one newline-delimited JSON file per scan.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RoiStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scan id {0:?}")]
    InvalidScanId(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub id: String,
    pub label: String,
    pub slice: usize,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Roi {
    pub fn new(slice: usize, color: impl Into<String>, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: format!("ROI {slice}"),
            slice,
            color: color.into(),
            x,
            y,
            w,
            h,
        }
    }
}

/// Slice range covered by the ROIs of one colour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoiGroup {
    pub label: String,
    pub min_slice: usize,
    pub max_slice: usize,
    pub color: String,
}

pub fn rois_in_slice(rois: &[Roi], slice: usize) -> Vec<Roi> {
    rois.iter().filter(|roi| roi.slice == slice).cloned().collect()
}

/// Groups by colour, in order of first appearance.
pub fn roi_groups(rois: &[Roi]) -> Vec<RoiGroup> {
    let mut groups: Vec<RoiGroup> = Vec::new();
    for roi in rois {
        match groups.iter_mut().find(|group| group.color == roi.color) {
            Some(group) => {
                group.min_slice = group.min_slice.min(roi.slice);
                group.max_slice = group.max_slice.max(roi.slice);
            }
            None => groups.push(RoiGroup {
                label: "ROI".to_string(),
                min_slice: roi.slice,
                max_slice: roi.slice,
                color: roi.color.clone(),
            }),
        }
    }
    groups
}

pub trait RoiStore {
    fn get(&self, scan_id: &str) -> Vec<Roi>;

    fn append(&mut self, scan_id: &str, roi: Roi);

    /// Removes every ROI of colour `color` and returns the remaining ones.
    fn remove_by_group(&mut self, scan_id: &str, color: &str) -> Vec<Roi>;

    fn persist(&mut self, scan_id: &str) -> Result<(), RoiStoreError>;
}

/// ROIs kept in memory and saved to `<dir>/<scan id>`, one JSON record per line.
///
/// New ROIs are appended to the file on [`RoiStore::persist`]; the file is
/// rewritten only after a removal.
#[derive(Debug)]
pub struct JsonLinesRoiStore {
    dir: PathBuf,
    rois: HashMap<String, Vec<Roi>>,
    persisted: HashMap<String, usize>,
    needs_rewrite: HashSet<String>,
}

fn check_scan_id(scan_id: &str) -> Result<(), RoiStoreError> {
    let valid = !scan_id.is_empty()
        && scan_id != "."
        && scan_id != ".."
        && !scan_id.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(RoiStoreError::InvalidScanId(scan_id.to_string()))
    }
}

fn read_records(path: &Path) -> Result<Vec<Roi>, RoiStoreError> {
    let mut rois = Vec::new();
    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rois.push(serde_json::from_str(&line)?);
    }
    Ok(rois)
}

fn write_records(writer: impl Write, rois: &[Roi]) -> Result<(), RoiStoreError> {
    let mut writer = BufWriter::new(writer);
    for roi in rois {
        serde_json::to_writer(&mut writer, roi)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

impl JsonLinesRoiStore {
    /// Loads every scan file in `dir`, creating the directory if needed.
    /// Files that cannot be parsed are logged and skipped.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RoiStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut rois = HashMap::new();
        let mut persisted = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(scan_id) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !path.is_file() || scan_id.ends_with(".partial") {
                continue;
            }
            match read_records(&path) {
                Ok(records) => {
                    persisted.insert(scan_id.to_string(), records.len());
                    rois.insert(scan_id.to_string(), records);
                }
                Err(err) => warn!(path = %path.display(), error = %err, "skipping ROI file"),
            }
        }
        debug!(dir = %dir.display(), scans = rois.len(), "loaded ROIs");

        Ok(Self {
            dir,
            rois,
            persisted,
            needs_rewrite: HashSet::new(),
        })
    }

    fn path_for(&self, scan_id: &str) -> PathBuf {
        self.dir.join(scan_id)
    }
}

impl RoiStore for JsonLinesRoiStore {
    fn get(&self, scan_id: &str) -> Vec<Roi> {
        self.rois.get(scan_id).cloned().unwrap_or_default()
    }

    fn append(&mut self, scan_id: &str, roi: Roi) {
        self.rois.entry(scan_id.to_string()).or_default().push(roi);
    }

    fn remove_by_group(&mut self, scan_id: &str, color: &str) -> Vec<Roi> {
        let Some(rois) = self.rois.get_mut(scan_id) else {
            return Vec::new();
        };
        let before = rois.len();
        rois.retain(|roi| roi.color != color);
        if rois.len() != before {
            self.needs_rewrite.insert(scan_id.to_string());
        }
        rois.clone()
    }

    fn persist(&mut self, scan_id: &str) -> Result<(), RoiStoreError> {
        check_scan_id(scan_id)?;
        let rois = self.rois.get(scan_id).map(Vec::as_slice).unwrap_or_default();
        let path = self.path_for(scan_id);

        if self.needs_rewrite.contains(scan_id) {
            let partial = self.dir.join(format!("{scan_id}.partial"));
            write_records(File::create(&partial)?, rois)?;
            fs::rename(&partial, &path)?;
            self.needs_rewrite.remove(scan_id);
        } else {
            let written = self.persisted.get(scan_id).copied().unwrap_or_default();
            let pending = &rois[written.min(rois.len())..];
            if pending.is_empty() {
                return Ok(());
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            write_records(file, pending)?;
        }

        self.persisted.insert(scan_id.to_string(), rois.len());
        debug!(scan_id, count = rois.len(), "persisted ROIs");
        Ok(())
    }
}
