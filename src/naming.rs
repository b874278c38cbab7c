//! Content-addressed file names for scans and their cached volumes.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

pub const CONTAINER_EXTENSION: &str = ".mat";
pub const CACHE_EXTENSION: &str = ".dat.gz";

/// Hex digest a scan identifier is stored under.
pub fn file_stem(uid: &str) -> String {
    format!("{:x}", Sha256::digest(uid.as_bytes()))
}

pub fn container_path(scans_dir: impl AsRef<Path>, uid: &str) -> PathBuf {
    scans_dir
        .as_ref()
        .join(format!("{}{CONTAINER_EXTENSION}", file_stem(uid)))
}

pub fn cache_path(cache_dir: impl AsRef<Path>, uid: &str) -> PathBuf {
    cache_dir
        .as_ref()
        .join(format!("{}{CACHE_EXTENSION}", file_stem(uid)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_is_stable_sha256() {
        assert_eq!(
            file_stem("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn container_and_cache_share_the_stem() {
        let container = container_path("/scans", "1.2.840.113704");
        let cache = cache_path("/cache", "1.2.840.113704");
        let stem = file_stem("1.2.840.113704");
        assert_eq!(container, PathBuf::from(format!("/scans/{stem}.mat")));
        assert_eq!(cache, PathBuf::from(format!("/cache/{stem}.dat.gz")));
    }
}
