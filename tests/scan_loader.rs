use std::fs;
use std::path::Path;

use ct_scan_store::container::memory::MemoryContainer;
use ct_scan_store::container::{ContainerError, ContainerOpener};
use ct_scan_store::scan_loader::ScanLoadError;
use ct_scan_store::{
    BodyPart, LoadOptions, Plane, ScanLoader, ScanStoreConfig, ScanVolume, Voxels, naming,
};
use ndarray::Array3;
use tempfile::TempDir;

const UID: &str = "1.2.840.113704.1.111.7608.1361981364.7";

/// Stored (slice, column, row) buffer; the value encodes the indices.
fn stored_volume() -> Voxels {
    Voxels::I16(Array3::from_shape_fn((8, 3, 2), |(s, c, r)| {
        (s * 100 + c * 10 + r) as i16
    }))
}

fn brain_scan() -> MemoryContainer {
    MemoryContainer::new()
        .with_volume("volume", stored_volume())
        .with_text("name", "Doe^John")
        .with_values("defWindow", &[40.0, 80.0])
        .with_values("matlabWindowShift", &[1024.0])
        .with_values("size", &[2.0, 3.0, 8.0])
        .with_text("metadata/PhotometricInterpretation", "MONOCHROME2")
        .with_text("metadata/AccessionNumber", "ACC999")
        .with_values("metadata/SpacingBetweenSlices", &[5.0])
        .with_values("metadata/ImagePositionPatient", &[-100.0, -90.0, 10.0])
        .with_values(
            "metadata/ImageOrientationPatient",
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        )
        .with_text("extraData/AN", "ACC123")
        .with_text_cell("extraData/type", &["hemo"])
        .with_text("extraData/plane", "Ax recon")
        .with_text_cell("extraData/specialmarks", &["short"])
}

/// Places an empty file at the container path of each uid and serves
/// `container` for every open.
fn setup(
    container: MemoryContainer,
    uids: &[&str],
) -> (TempDir, ScanLoader<impl ContainerOpener + Sync>) {
    let dir = tempfile::tempdir().unwrap();
    let scans_dir = dir.path().join("scans");
    let cache_dir = dir.path().join("cache");
    fs::create_dir_all(&scans_dir).unwrap();
    fs::create_dir_all(&cache_dir).unwrap();
    for uid in uids {
        fs::write(naming::container_path(&scans_dir, uid), b"").unwrap();
    }

    let config = ScanStoreConfig::new(scans_dir).with_cache_dir(cache_dir);
    let opener = move |_: &Path| Ok::<_, ContainerError>(container.clone());
    (dir, ScanLoader::new(opener, config))
}

fn from_container() -> LoadOptions {
    LoadOptions {
        read_volume: true,
        prefer_compressed_cache: false,
    }
}

#[test]
fn loads_metadata_and_geometry() {
    let (_dir, loader) = setup(brain_scan(), &[UID]);
    let scan = loader.load(UID, LoadOptions::metadata_only()).unwrap();

    assert_eq!(scan.uid(), UID);
    assert_eq!(scan.name(), "Doe^John");
    assert_eq!(scan.default_window(), &[40.0, 80.0]);
    assert_eq!(scan.normalized_window(), &[1064.0, 1104.0]);
    assert_eq!(scan.metadata().accession_number.as_deref(), Some("ACC123"));
    assert_eq!(scan.body_part(), BodyPart::Brain);
    assert_eq!(scan.plane(), Plane::Axial);
    assert_eq!(scan.size(), (8, 2, 3));
    assert_eq!(
        scan.image_orientation(),
        Some(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0][..])
    );
    assert!(!scan.is_simulated_short());
    assert!(!scan.is_color_image());
    assert_eq!(scan.volume(), &ScanVolume::NotLoaded);
    assert!(scan.volume_bytes().is_none());
}

#[test]
fn extrapolated_positions_step_along_plane_axis() {
    let (_dir, loader) = setup(brain_scan(), &[UID]);
    let scan = loader.load(UID, LoadOptions::metadata_only()).unwrap();

    let positions = scan.image_positions();
    assert_eq!(positions.len(), scan.size().0);
    assert_eq!(positions[0], [-100.0, -90.0, 10.0]);
    for (i, position) in positions.iter().enumerate() {
        assert_eq!(*position, [-100.0, -90.0, 10.0 + i as f64 * 5.0]);
    }
}

#[test]
fn exact_positions_win_over_spacing() {
    let container = brain_scan()
        .with_values("#refs#/ipp0", &[1.0, 2.0, 3.0])
        .with_values("#refs#/ipp1", &[1.0, 2.0, 4.25])
        .with_cell(
            "all_metadata/ImagePositionPatient",
            &["#refs#/ipp0", "#refs#/ipp1"],
        );
    let (_dir, loader) = setup(container, &[UID]);
    let scan = loader.load(UID, LoadOptions::metadata_only()).unwrap();
    assert_eq!(scan.image_positions(), &[[1.0, 2.0, 3.0], [1.0, 2.0, 4.25]]);
}

#[test]
fn unrecoverable_positions_leave_list_empty() {
    let container = MemoryContainer::new()
        .with_volume("volume", stored_volume())
        .with_text("metadata/PhotometricInterpretation", "MONOCHROME2")
        .with_text("extraData/plane", "COR");
    let (_dir, loader) = setup(container, &[UID]);
    let scan = loader.load(UID, LoadOptions::metadata_only()).unwrap();

    assert!(scan.image_positions().is_empty());
    assert_eq!(scan.plane(), Plane::Coronal);
    assert_eq!(scan.name(), "");
    assert_eq!(scan.metadata().accession_number, None);
}

#[test]
fn size_falls_back_to_volume_shape() {
    let container = MemoryContainer::new()
        .with_volume("volume", stored_volume())
        .with_text("metadata/PhotometricInterpretation", "MONOCHROME2");
    let (_dir, loader) = setup(container, &[UID]);
    let scan = loader.load(UID, LoadOptions::metadata_only()).unwrap();
    assert_eq!(scan.size(), (8, 2, 3));
}

#[test]
fn volume_is_ordered_slice_row_column() {
    let (_dir, loader) = setup(brain_scan(), &[UID]);
    let scan = loader.load(UID, from_container()).unwrap();

    assert!(!scan.is_volume_compressed());
    let ScanVolume::Raw(Voxels::I16(volume)) = scan.volume() else {
        panic!("expected a raw i16 volume");
    };
    assert_eq!(volume.dim(), scan.size());
    // slice 5, row 1, column 2
    assert_eq!(volume[[5, 1, 2]], 521);
}

#[test]
fn missing_container_is_not_found() {
    let (_dir, loader) = setup(brain_scan(), &[]);
    let err = loader.load(UID, LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ScanLoadError::NotFound(_)));
}

#[test]
fn container_without_volume_is_invalid() {
    let container =
        MemoryContainer::new().with_text("metadata/PhotometricInterpretation", "MONOCHROME2");
    let (_dir, loader) = setup(container, &[UID]);
    let err = loader.load(UID, LoadOptions::metadata_only()).unwrap_err();
    assert!(matches!(err, ScanLoadError::InvalidFile(_)));
}

#[test]
fn missing_photometric_interpretation_fails() {
    let container = MemoryContainer::new().with_volume("volume", stored_volume());
    let (_dir, loader) = setup(container, &[UID]);
    let err = loader.load(UID, LoadOptions::metadata_only()).unwrap_err();
    assert!(matches!(err, ScanLoadError::Metadata(_)));
}

#[test]
fn brain_without_plane_is_axial() {
    let container = MemoryContainer::new()
        .with_volume("volume", stored_volume())
        .with_text("metadata/PhotometricInterpretation", "MONOCHROME2")
        .with_text_cell("extraData/type", &["hemo"]);
    let (_dir, loader) = setup(container, &[UID]);
    let scan = loader.load(UID, LoadOptions::metadata_only()).unwrap();
    assert_eq!(scan.plane(), Plane::Axial);
}

#[test]
fn cspine_without_plane_fails() {
    let container = MemoryContainer::new()
        .with_volume("volume", stored_volume())
        .with_text("metadata/PhotometricInterpretation", "MONOCHROME2")
        .with_text_cell("extraData/type", &["cspine"]);
    let (_dir, loader) = setup(container, &[UID]);
    let err = loader.load(UID, LoadOptions::metadata_only()).unwrap_err();
    assert!(matches!(err, ScanLoadError::MissingPlane));
}

#[test]
fn brain_with_filler_plane_is_axial() {
    let container = brain_scan().with_chars("extraData/plane", vec![0, 0]);
    let (_dir, loader) = setup(container, &[UID]);
    let scan = loader.load(UID, LoadOptions::metadata_only()).unwrap();
    assert_eq!(scan.plane(), Plane::Axial);
}

#[test]
fn cspine_with_filler_plane_fails() {
    let container = brain_scan()
        .with_text_cell("extraData/type", &["cspine"])
        .with_chars("extraData/plane", vec![0, 0]);
    let (_dir, loader) = setup(container, &[UID]);
    let err = loader.load(UID, LoadOptions::metadata_only()).unwrap_err();
    assert!(matches!(err, ScanLoadError::MissingPlane));
}

#[test]
fn unsupported_plane_fails_even_for_brain() {
    let container = brain_scan().with_text("extraData/plane", "oblique");
    let (_dir, loader) = setup(container, &[UID]);
    let err = loader.load(UID, LoadOptions::metadata_only()).unwrap_err();
    assert!(matches!(err, ScanLoadError::UnsupportedPlane(text) if text == "oblique"));
}

#[test]
fn cached_volume_round_trips() {
    let (_dir, loader) = setup(brain_scan(), &[UID]);
    let raw = loader.load(UID, from_container()).unwrap();
    assert!(!raw.decimates_cache());
    assert!(raw.store_compressed_volume().unwrap());
    assert!(raw.cache_path().is_file());

    let cached = loader.load(UID, LoadOptions::default()).unwrap();
    assert!(cached.is_volume_compressed());
    assert_eq!(cached.volume_bytes(), raw.volume_bytes());

    let typed = cached.typed_volume().unwrap().unwrap();
    assert_eq!(typed.dim(), cached.size());
    assert_eq!(*typed, *raw.typed_volume().unwrap().unwrap());

    // Storing again is a no-op once the volume came from the cache.
    assert!(!cached.store_compressed_volume().unwrap());
}

#[test]
fn simulated_short_brain_scan_is_decimated_in_cache() {
    let container = brain_scan().with_empty_cell("extraData/specialmarks");
    let (_dir, loader) = setup(container, &[UID]);
    let raw = loader.load(UID, from_container()).unwrap();
    assert!(raw.is_simulated_short());
    raw.store_compressed_volume().unwrap();

    let cached = loader.load(UID, LoadOptions::default()).unwrap();
    let typed = cached.typed_volume().unwrap().unwrap();
    assert_eq!(typed.dim(), (2, 2, 3));

    let ScanVolume::Raw(voxels) = raw.volume() else {
        panic!("expected a raw volume");
    };
    assert_eq!(*typed, voxels.every_nth_slice(4));
}

#[test]
fn cspine_scan_is_never_decimated() {
    let container = brain_scan()
        .with_text_cell("extraData/type", &["cspine"])
        .with_empty_cell("extraData/specialmarks");
    let (_dir, loader) = setup(container, &[UID]);
    let raw = loader.load(UID, from_container()).unwrap();
    assert_eq!(raw.body_part(), BodyPart::Cspine);
    assert!(!raw.is_simulated_short());
    assert!(!raw.decimates_cache());
}

#[test]
fn unreadable_cache_falls_back_to_container() {
    let (_dir, loader) = setup(brain_scan(), &[UID]);
    let cache_path = naming::cache_path(loader.config().cache_dir(), UID);
    fs::write(&cache_path, b"not gzip").unwrap();

    let scan = loader.load(UID, LoadOptions::default()).unwrap();
    assert!(!scan.is_volume_compressed());
    assert_eq!(scan.typed_volume().unwrap().unwrap().dim(), (8, 2, 3));
}

#[test]
fn worklist_skips_failures_in_order() {
    let (_dir, loader) = setup(brain_scan(), &["a", "c"]);
    let summaries = loader.load_many(&["a", "b", "c"]);
    let uids: Vec<&str> = summaries.iter().map(|summary| summary.uid.as_str()).collect();
    assert_eq!(uids, ["a", "c"]);
    assert_eq!(summaries[0].accession_number.as_deref(), Some("ACC123"));
    assert_eq!(summaries[0].patient_name, "Doe^John");
}
