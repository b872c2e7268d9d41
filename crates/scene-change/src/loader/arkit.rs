// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Frames captured with Apple ARKit.
//!
//! Each frame is stored as a JSON document next to the captured image:
//!
//! ```text
//! dataset/
//! ├── images/
//! │   ├── image_0.png
//! │   └── ...
//! ├── confidence/
//! │   ├── image_0.png
//! │   └── ...
//! └── depth/
//!     ├── image_0.json
//!     └── ...
//! ```
//!
//! Camera matrices are serialized column by column. The depth map is stored
//! in sensor orientation at a lower resolution than the image; it is turned
//! 90 degrees clockwise and resampled to line up with the image.

use super::{Frame, GeometrySource};
use crate::{
    Error,
    geometry::{Camera, DepthMap, flip_yz},
    persist::read_json,
};
use image::{GrayImage, RgbImage, imageops};
use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Raw depth samples of an ARKit frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArkitDepthMap {
    pub height: u32,
    pub width: u32,
    pub values: Vec<f32>,
}

/// Raw confidence levels of an ARKit frame, `0` (low) to `2` (high).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArkitConfidenceMap {
    pub height: u32,
    pub width: u32,
    pub values: Vec<u8>,
}

/// One ARKit frame document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArkitFrame {
    /// Intrinsic matrix, column-major.
    #[serde(alias = "intrinsics")]
    pub intrinsic: Vec<Vec<f64>>,
    /// World-to-camera matrix, column-major.
    pub view_matrix: Vec<Vec<f64>>,
    /// Image resolution as `[height, width]`.
    pub resolution: [u32; 2],
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub frame_number: u64,
    pub depth_map: ArkitDepthMap,
    #[serde(default)]
    pub confidence_map: Option<ArkitConfidenceMap>,
}

fn column_major<const N: usize>(
    columns: &[Vec<f64>],
    name: &str,
) -> Result<[[f64; N]; N], Error> {
    if columns.len() != N || columns.iter().any(|c| c.len() != N) {
        return Err(Error::InvalidCamera(format!("{} must be {}x{}", name, N, N)));
    }
    let mut rows = [[0.0; N]; N];
    for (c, column) in columns.iter().enumerate() {
        for (r, value) in column.iter().enumerate() {
            rows[r][c] = *value;
        }
    }
    Ok(rows)
}

impl ArkitFrame {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        read_json(path)
    }

    pub fn image_width(&self) -> u32 {
        self.resolution[1]
    }

    pub fn image_height(&self) -> u32 {
        self.resolution[0]
    }

    pub fn camera(&self) -> Result<Camera, Error> {
        let intrinsic = column_major::<3>(&self.intrinsic, "intrinsic")?;
        let view_matrix = column_major::<4>(&self.view_matrix, "view_matrix")?;
        Ok(Camera::new(
            Matrix3::from_fn(|r, c| intrinsic[r][c]),
            Matrix4::from_fn(|r, c| view_matrix[r][c]),
        ))
    }

    /// Depth map upright and resampled to the image resolution.
    pub fn depth_map(&self) -> Result<DepthMap, Error> {
        let raw = &self.depth_map;
        if let Some(v) = raw.values.iter().find(|v| v.is_nan() || **v < 0.0) {
            return Err(Error::InvalidDepthMap(format!("invalid depth sample {}", v)));
        }
        DepthMap::new(raw.width, raw.height, raw.values.clone())?
            .rotate90()?
            .resize(self.image_width(), self.image_height())
    }
}

/// Frames of a single ARKit capture, used for point-cloud reconstruction.
#[derive(Debug, Clone)]
pub struct ArkitDataset {
    path: PathBuf,
}

impl ArkitDataset {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ArkitDataset { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Image ids in capture order, so `image_2` precedes `image_12`.
    pub fn image_ids(&self) -> Result<Vec<String>, Error> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(self.path.join("images")).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| Error::IoError(e.into()))?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|e| e == "png")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_owned());
            }
        }
        ids.sort_by_cached_key(|id| (frame_index(id), id.clone()));
        Ok(ids)
    }

    pub fn frame(&self, image_id: &str) -> Result<ArkitFrame, Error> {
        ArkitFrame::read(self.path.join("depth").join(format!("{}.json", image_id)))
    }

    pub fn image(&self, image_id: &str) -> Result<RgbImage, Error> {
        let path = self.path.join("images").join(format!("{}.png", image_id));
        Ok(image::open(path)?.into_rgb8())
    }

    /// Confidence levels of a frame, or `None` when no confidence image was
    /// recorded.
    ///
    /// Recorded confidence images carry one padding column on the right,
    /// which is dropped.
    pub fn confidence_map(&self, image_id: &str) -> Result<Option<GrayImage>, Error> {
        let path = self.path.join("confidence").join(format!("{}.png", image_id));
        if !path.exists() {
            return Ok(None);
        }
        let confidence = image::open(path)?.into_luma8();
        let (width, height) = confidence.dimensions();
        if width < 2 {
            return Err(Error::InvalidDepthMap(format!(
                "confidence map of {} is {} pixels wide",
                image_id, width
            )));
        }
        Ok(Some(
            imageops::crop_imm(&confidence, 0, 0, width - 1, height).to_image(),
        ))
    }

    pub fn correction_matrix(&self) -> Matrix4<f64> {
        flip_yz()
    }
}

/// Trailing `_N` frame number of an image id.
fn frame_index(image_id: &str) -> Option<u64> {
    image_id.rsplit('_').next().and_then(|n| n.parse().ok())
}

/// Geometry of a dataset pair where both captures were recorded with ARKit.
///
/// Each dataset stores `depth/<image_id>.json` frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArkitGeometrySource;

impl ArkitGeometrySource {
    pub(crate) fn frame_path(
        &self,
        datasets: &Path,
        image_id: &str,
        before_name: &str,
        frame: Frame,
    ) -> Result<PathBuf, Error> {
        Ok(self
            .dataset_path(datasets, before_name, frame)?
            .join("depth")
            .join(format!("{}.json", image_id)))
    }
}

impl GeometrySource for ArkitGeometrySource {
    fn depth_map(
        &self,
        datasets: &Path,
        image_id: &str,
        before_name: &str,
        frame: Frame,
    ) -> Result<DepthMap, Error> {
        ArkitFrame::read(self.frame_path(datasets, image_id, before_name, frame)?)?.depth_map()
    }

    fn camera(
        &self,
        datasets: &Path,
        image_id: &str,
        before_name: &str,
        frame: Frame,
    ) -> Result<Camera, Error> {
        ArkitFrame::read(self.frame_path(datasets, image_id, before_name, frame)?)?.camera()
    }

    fn correction_matrix(&self) -> Option<Matrix4<f64>> {
        Some(flip_yz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs::{File, create_dir_all, write};

    fn frame_json() -> serde_json::Value {
        json!({
            "intrinsics": [[500.0, 0.0, 0.0], [0.0, 600.0, 0.0], [320.0, 240.0, 1.0]],
            "view_matrix": [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [2.0, 3.0, 4.0, 1.0]
            ],
            "resolution": [6, 4],
            "timestamp": 12.5,
            "frame_number": 7,
            "depth_map": {"height": 2, "width": 3, "values": [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]},
            "confidence_map": {"height": 2, "width": 3, "values": [2, 2, 1, 0, 2, 2]}
        })
    }

    #[test]
    fn test_frame_camera_is_transposed() {
        let frame: ArkitFrame = serde_json::from_value(frame_json()).unwrap();
        let camera = frame.camera().unwrap();
        assert_eq!(camera.intrinsic[(0, 0)], 500.0);
        assert_eq!(camera.intrinsic[(0, 2)], 320.0);
        assert_eq!(camera.intrinsic[(1, 2)], 240.0);
        assert_eq!(camera.view_matrix[(0, 3)], 2.0);
        assert_eq!(camera.view_matrix[(2, 3)], 4.0);
        assert_eq!(camera.view_matrix[(3, 0)], 0.0);
        assert_eq!(frame.frame_number, 7);
    }

    #[test]
    fn test_frame_depth_matches_resolution() {
        let frame: ArkitFrame = serde_json::from_value(frame_json()).unwrap();
        let depth = frame.depth_map().unwrap();
        assert_eq!(depth.width(), 4);
        assert_eq!(depth.height(), 6);
        assert!(depth.values().iter().all(|d| (d - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_frame_rejects_bad_camera() {
        let mut value = frame_json();
        value["view_matrix"] = json!([[1.0, 0.0], [0.0, 1.0]]);
        let frame: ArkitFrame = serde_json::from_value(value).unwrap();
        assert!(matches!(frame.camera(), Err(Error::InvalidCamera(_))));
    }

    #[test]
    fn test_geometry_source_reads_both_frames() {
        let dir = tempfile::tempdir().unwrap();
        for dataset in ["before", "after"] {
            let depth_dir = dir.path().join(dataset).join("depth");
            create_dir_all(&depth_dir).unwrap();
            write(depth_dir.join("image_0.json"), frame_json().to_string()).unwrap();
        }

        let source = ArkitGeometrySource;
        for frame in [Frame::Before, Frame::After] {
            let depth = source.depth_map(dir.path(), "image_0", "before", frame).unwrap();
            assert_eq!((depth.width(), depth.height()), (4, 6));
            assert!(source.camera(dir.path(), "image_0", "before", frame).is_ok());
        }
        assert!(source.correction_matrix().is_some());
        assert!(source.camera(dir.path(), "image_9", "before", Frame::After).is_err());
    }

    #[test]
    fn test_dataset_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        create_dir_all(&images).unwrap();
        for id in ["image_12", "image_2", "image_1"] {
            File::create(images.join(format!("{}.png", id))).unwrap();
        }
        let dataset = ArkitDataset::new(dir.path());
        assert_eq!(
            dataset.image_ids().unwrap(),
            vec!["image_1", "image_2", "image_12"]
        );
        assert!(dataset.confidence_map("image_1").unwrap().is_none());
    }

    #[test]
    fn test_confidence_map_drops_padding_column() {
        let dir = tempfile::tempdir().unwrap();
        let confidence_dir = dir.path().join("confidence");
        create_dir_all(&confidence_dir).unwrap();
        GrayImage::from_pixel(5, 3, image::Luma([2]))
            .save(confidence_dir.join("image_0.png"))
            .unwrap();

        let dataset = ArkitDataset::new(dir.path());
        let confidence = dataset.confidence_map("image_0").unwrap().unwrap();
        assert_eq!(confidence.dimensions(), (4, 3));
    }
}
