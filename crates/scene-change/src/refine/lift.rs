// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Lifting 2D change detection results into world space.

use super::schema::{ChangeDetection3dResults, LabelInfo3d, SinglePairResult3d};
use crate::{
    Change, Error, Progress,
    geometry::{Pixel, Point},
    loader::{Frame, GeometrySource},
    progress::ProgressCounter,
    result::{ChangeDetectionResults, ImageId, SinglePairResult},
    unproject::unproject,
};
use nalgebra::Matrix4;
use rayon::prelude::*;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::Sender,
};

/// Capture that observed labels of each change: added and unchanged labels
/// are seen in the after frame, removed labels only in the before frame.
const FRAME_CHANGES: [(Frame, &[Change]); 2] = [
    (Frame::After, &[Change::Added, Change::Unchanged]),
    (Frame::Before, &[Change::Removed]),
];

/// Converts 2D results into 3D results.
///
/// Each label is anchored at the pixel under its box center and unprojected
/// with the depth and camera of the frame it was observed in. Labels whose
/// depth sample is missing, non-finite or not positive are skipped with a
/// warning. Images are processed in parallel; the first failure aborts the
/// conversion.
pub fn convert_result_2d_to_3d(
    datasets: &Path,
    results: &ChangeDetectionResults,
    source: &dyn GeometrySource,
    before_name: &str,
    progress: Option<&Sender<Progress>>,
) -> Result<ChangeDetection3dResults, Error> {
    let correction = source.correction_matrix();
    let counter = ProgressCounter::new(progress, results.len());
    let lifter = Lifter {
        datasets,
        source,
        before_name,
        correction: correction.as_ref(),
        width: results.image_width,
        height: results.image_height,
    };

    let lifted = results
        .result
        .par_iter()
        .map(|(image_id, pair)| -> Result<(ImageId, SinglePairResult3d), Error> {
            let result = lifter.lift(image_id, pair)?;
            counter.advance();
            Ok((image_id.clone(), result))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let results_3d: ChangeDetection3dResults = lifted.into_iter().collect();
    log::debug!(
        "Lifted {} labels across {} images",
        results_3d.label_count(),
        results_3d.len()
    );
    Ok(results_3d)
}

/// Writes 3D results into `dir`, see [`ChangeDetection3dResults::export`].
pub fn export_3d(
    results: &ChangeDetection3dResults,
    dir: &Path,
    refined: bool,
) -> Result<PathBuf, Error> {
    results.export(dir, refined)
}

struct Lifter<'a> {
    datasets: &'a Path,
    source: &'a dyn GeometrySource,
    before_name: &'a str,
    correction: Option<&'a Matrix4<f64>>,
    width: u32,
    height: u32,
}

impl Lifter<'_> {
    fn lift(&self, image_id: &str, pair: &SinglePairResult) -> Result<SinglePairResult3d, Error> {
        let mut lifted = SinglePairResult3d::default();

        for (frame, changes) in FRAME_CHANGES {
            if changes.iter().all(|change| pair.labels(*change).is_empty()) {
                continue;
            }
            let depth_map = self
                .source
                .depth_map(self.datasets, image_id, self.before_name, frame)?;
            let camera = self
                .source
                .camera(self.datasets, image_id, self.before_name, frame)?;

            let mut anchors = Vec::new();
            let mut pixels = Vec::new();
            let mut depths = Vec::new();
            for change in changes {
                for label in pair.labels(*change) {
                    let center = &label.bounding_box;
                    let pixel = Pixel::from_normalized(center.x, center.y, self.width, self.height);
                    match depth_map.get(pixel) {
                        Some(depth) if depth.is_finite() && depth > 0.0 => {
                            anchors.push((*change, label));
                            pixels.push(pixel);
                            depths.push(depth as f64);
                        }
                        depth => log::warn!(
                            "{}: skipping {} label {} at ({}, {}), depth {:?}",
                            image_id,
                            change,
                            label.key,
                            pixel.x,
                            pixel.y,
                            depth
                        ),
                    }
                }
            }

            let points = unproject(&camera, &pixels, &depths, self.correction)?;
            for (((change, label), pixel), point) in anchors.into_iter().zip(pixels).zip(points) {
                check_finite(image_id, &point)?;
                lifted.insert(change, LabelInfo3d::new(label.key.clone(), pixel, point));
            }
        }

        Ok(lifted)
    }
}

fn check_finite(image_id: &str, point: &Point) -> Result<(), Error> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(Error::NonFinitePoint(format!(
            "{}: ({}, {}, {})",
            image_id, point.x, point.y, point.z
        )))
    }
}
