// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! End-to-end detect, lift and refine on a generated capture pair.

use image::{Rgb, RgbImage};
use scene_change::{
    Change, ChangeDetectionResults, ChangeDetector, ChangeSummary, Error, LabelKey, Progress,
    loader::{ArkitGeometrySource, LoaderKind, YoloDetectionSource},
    refine::{ChangeDetection3dResults, RefinementParams, Refiner, convert_result_2d_to_3d},
};
use serde_json::json;
use std::{
    fs::{create_dir_all, remove_file, write},
    path::Path,
    sync::mpsc::channel,
};

const IMAGES: usize = 12;
/// Images in which the lamp is still detected after the change.
const STILL_SEEN: [usize; 3] = [2, 5, 7];

#[ctor::ctor]
fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn frame_json() -> serde_json::Value {
    json!({
        "intrinsics": [[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [2.0, 1.5, 1.0]],
        "view_matrix": [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.5, 0.0, 0.0, 1.0]
        ],
        "resolution": [3, 4],
        "depth_map": {"height": 4, "width": 3, "values": vec![2.0f32; 12]}
    })
}

/// A lamp seen from the same pose in every image; after the change the
/// detector still reports it in a few images.
fn write_capture(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    for name in ["before", "after"] {
        create_dir_all(root.join(name).join("depth"))?;
        for i in 0..IMAGES {
            let id = format!("image_{}", i);
            let image_dir = root.join(name).join(&id);
            create_dir_all(image_dir.join("labels"))?;
            RgbImage::from_pixel(4, 3, Rgb([40, 40, 40]))
                .save(image_dir.join(format!("{}.jpg", id)))?;

            let labels = if name == "before" || STILL_SEEN.contains(&i) {
                "lamp 0.2 0.2 0.1 0.1\n"
            } else {
                ""
            };
            write(image_dir.join("labels").join(format!("{}.txt", id)), labels)?;
            write(
                root.join(name).join("depth").join(format!("{}.json", id)),
                frame_json().to_string(),
            )?;
        }
    }
    Ok(())
}

#[test]
fn test_refinement_reconciles_views() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_capture(dir.path())?;
    let lamp = LabelKey::ByName("lamp".to_owned());

    let (tx, rx) = channel::<Progress>();
    let detector = ChangeDetector::new();
    let results = detector.run_all(dir.path(), &YoloDetectionSource, "before", Some(&tx))?;
    drop(tx);
    assert_eq!(rx.iter().last(), Some(Progress { current: IMAGES, total: IMAGES }));

    let path = detector.export(&results, dir.path())?;
    let results = ChangeDetectionResults::read(path)?;
    assert_eq!((results.image_width, results.image_height), (4, 3));
    assert_eq!(results.len(), IMAGES);

    let summary = ChangeSummary::from_results_2d(&results);
    let counts = summary.categories[&lamp];
    assert_eq!(counts.removed, IMAGES - STILL_SEEN.len());
    assert_eq!(counts.unchanged, STILL_SEEN.len());
    assert_eq!(counts.added, 0);

    let results_3d =
        convert_result_2d_to_3d(dir.path(), &results, &ArkitGeometrySource, "before", None)?;
    let path = results_3d.export(dir.path(), false)?;
    let results_3d = ChangeDetection3dResults::read(path)?;
    assert_eq!(results_3d.label_count(), IMAGES);

    // Every view anchors the lamp on the same world point.
    let first = results_3d
        .get("image_0")
        .and_then(|r| r.removed.iter().next())
        .map(|l| l.point)
        .ok_or("image_0 has no removed lamp")?;
    for (_, result) in &results_3d {
        for (_, label) in result.iter() {
            assert!(label.point.distance(&first) < 1e-9);
        }
    }

    let refiner = Refiner::new(RefinementParams::default())?;
    let (refined, path) = refiner.refine_and_export(&results_3d, dir.path())?;
    assert!(path.ends_with("refined_change_detection_result_3d.json"));
    assert_eq!(refined.label_count(), IMAGES);
    for (_, result) in &refined {
        assert_eq!(result.labels(Change::Removed).len(), 1);
        assert!(result.unchanged.is_empty() && result.added.is_empty());
    }
    Ok(())
}

#[test]
fn test_missing_after_labels_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_capture(dir.path())?;
    remove_file(
        dir.path()
            .join("after")
            .join("image_4")
            .join("labels")
            .join("image_4.txt"),
    )?;

    let (tx, rx) = channel::<Progress>();
    let results = ChangeDetector::new().run_all(dir.path(), &YoloDetectionSource, "before", Some(&tx))?;
    drop(tx);

    assert_eq!(results.len(), IMAGES - 1);
    assert!(!results.result.contains_key("image_4"));
    assert!(results.result.contains_key("image_3"));
    assert_eq!(rx.iter().last(), Some(Progress { current: IMAGES, total: IMAGES }));
    Ok(())
}

#[test]
fn test_too_many_after_datasets() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_capture(dir.path())?;
    create_dir_all(dir.path().join("after_2"))?;

    let source = LoaderKind::Yolo.detection_source()?;
    let err = ChangeDetector::new()
        .run_all(dir.path(), source.as_ref(), "before", None)
        .unwrap_err();
    match err {
        Error::TooManyDatasets(paths) => assert_eq!(paths.len(), 2),
        other => panic!("unexpected error: {}", other),
    }
    Ok(())
}
