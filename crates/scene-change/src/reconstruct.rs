// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Point-cloud reconstruction from depth frames.
//!
//! Reconstruction is not part of change detection. It unprojects every depth
//! sample of a capture with the same camera conventions the refinement uses,
//! so a misread camera (row-major instead of column-major, inverted view
//! matrix, missing axis correction) shows up as a scrambled point cloud long
//! before it silently skews clustering.

use crate::{
    Error, Progress,
    geometry::{Camera, DepthMap, Pixel, Point},
    loader::ArkitDataset,
    progress::ProgressCounter,
    refine::ChangeDetection3dResults,
    unproject::Unprojector,
};
use image::{GrayImage, imageops};
use nalgebra::Matrix4;
use rand::seq::index::sample;
use rayon::prelude::*;
use std::{
    fs::{File, create_dir_all},
    io::{BufWriter, Write},
    path::Path,
    sync::mpsc::Sender,
};

/// File name of the reconstructed point cloud.
pub const POINT_CLOUD_FILE: &str = "point_cloud.ply";

/// A world point with an RGB color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredPoint {
    pub point: Point,
    pub color: [u8; 3],
}

/// Unprojects whole depth frames into point clouds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconstructor;

impl Reconstructor {
    pub fn new() -> Self {
        Reconstructor
    }

    /// Unprojects the valid samples of one depth map.
    ///
    /// Samples with a non-positive or non-finite depth are dropped. With a
    /// `confidence` map and `min_confidence`, samples below that level are
    /// dropped as well. When more than `max_samples` remain, a uniform random
    /// subset is kept. Points come back in row-major pixel order.
    pub fn reconstruct(
        &self,
        depth: &DepthMap,
        camera: &Camera,
        confidence: Option<&GrayImage>,
        min_confidence: Option<u8>,
        max_samples: Option<usize>,
        correction: Option<&Matrix4<f64>>,
    ) -> Result<Vec<(Pixel, Point)>, Error> {
        if let Some(confidence) = confidence
            && confidence.dimensions() != (depth.width(), depth.height())
        {
            return Err(Error::InvalidDepthMap(format!(
                "confidence map is {}x{} but depth map is {}x{}",
                confidence.width(),
                confidence.height(),
                depth.width(),
                depth.height()
            )));
        }

        let mut pixels: Vec<Pixel> = depth
            .valid_pixels()
            .filter(|pixel| match (confidence, min_confidence) {
                (Some(confidence), Some(level)) => {
                    confidence.get_pixel(pixel.x, pixel.y)[0] >= level
                }
                _ => true,
            })
            .collect();

        if let Some(max_samples) = max_samples
            && pixels.len() > max_samples
        {
            let mut indices =
                sample(&mut rand::thread_rng(), pixels.len(), max_samples).into_vec();
            indices.sort_unstable();
            pixels = indices.into_iter().map(|i| pixels[i]).collect();
        }

        let unprojector = Unprojector::new(camera, correction)?;
        Ok(pixels
            .into_iter()
            .filter_map(|pixel| {
                depth
                    .get(pixel)
                    .map(|d| (pixel, unprojector.point(pixel, d as f64)))
            })
            .collect())
    }

    /// Reconstructs every frame of an ARKit capture, colored from the
    /// captured images.
    ///
    /// Frames are processed in parallel and concatenated in capture order.
    pub fn reconstruct_dataset(
        &self,
        dataset: &ArkitDataset,
        min_confidence: Option<u8>,
        max_samples_per_frame: Option<usize>,
        progress: Option<&Sender<Progress>>,
    ) -> Result<Vec<ColoredPoint>, Error> {
        let image_ids = dataset.image_ids()?;
        if image_ids.is_empty() {
            return Err(Error::MissingImages(format!(
                "no frames in {}",
                dataset.path().display()
            )));
        }
        let correction = dataset.correction_matrix();
        let counter = ProgressCounter::new(progress, image_ids.len());

        let frames = image_ids
            .par_iter()
            .map(|image_id| -> Result<Vec<ColoredPoint>, Error> {
                let frame = dataset.frame(image_id)?;
                let depth = frame.depth_map()?;
                let camera = frame.camera()?;
                let image = dataset.image(image_id)?;
                let confidence = dataset
                    .confidence_map(image_id)?
                    .map(|c| align_confidence(c, &depth));

                let points = self.reconstruct(
                    &depth,
                    &camera,
                    confidence.as_ref(),
                    min_confidence,
                    max_samples_per_frame,
                    Some(&correction),
                )?;
                log::debug!("{}: {} points", image_id, points.len());

                let colored = points
                    .into_iter()
                    .map(|(pixel, point)| ColoredPoint {
                        point,
                        color: image
                            .get_pixel_checked(pixel.x, pixel.y)
                            .map_or([0, 0, 0], |p| p.0),
                    })
                    .collect();
                counter.advance();
                Ok(colored)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(frames.into_iter().flatten().collect())
    }
}

/// Brings a confidence map recorded in sensor orientation onto the depth
/// grid. Confidence levels are categorical, so resampling is nearest.
fn align_confidence(confidence: GrayImage, depth: &DepthMap) -> GrayImage {
    let target = (depth.width(), depth.height());
    if confidence.dimensions() == target {
        return confidence;
    }
    let rotated = imageops::rotate90(&confidence);
    if rotated.dimensions() == target {
        return rotated;
    }
    imageops::resize(&rotated, target.0, target.1, imageops::FilterType::Nearest)
}

/// Points of 3D change detection results, colored by change.
pub fn change_points(results: &ChangeDetection3dResults) -> Vec<ColoredPoint> {
    results
        .iter()
        .flat_map(|(_, result)| result.iter())
        .map(|(change, label)| ColoredPoint {
            point: label.point,
            color: change.rgb(),
        })
        .collect()
}

/// Writes colored points as an ASCII PLY file.
pub fn write_ply<P: AsRef<Path>>(path: P, points: &[ColoredPoint]) -> Result<(), Error> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    let mut writer = BufWriter::with_capacity(64 * 1024, File::create(path)?);

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", points.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property double {}", axis)?;
    }
    for channel in ["red", "green", "blue"] {
        writeln!(writer, "property uchar {}", channel)?;
    }
    writeln!(writer, "end_header")?;

    for ColoredPoint { point, color } in points {
        writeln!(
            writer,
            "{} {} {} {} {} {}",
            point.x, point.y, point.z, color[0], color[1], color[2]
        )?;
    }
    writer.flush()?;

    log::info!("Point cloud saved to {}", path.display());
    Ok(())
}
