// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Dataset loaders.
//!
//! The pipeline consumes two kinds of data through small traits so that new
//! capture formats can be added without touching the matching or refinement
//! code:
//!
//! - [`DetectionSource`]: per-image object detections of one dataset.
//! - [`GeometrySource`]: per-image depth maps and camera parameters of the
//!   before and after captures.
//!
//! # Loader Implementations
//!
//! - [`YoloDetectionSource`]: YOLO text label files
//! - [`ArkitGeometrySource`]: both captures recorded with ARKit
//! - [`ArkitUe5GeometrySource`]: before rendered in Unreal Engine 5, after
//!   recorded with ARKit
//!
//! Implementations are chosen at runtime with a [`LoaderKind`] key.
//!
//! # Dataset Layout
//!
//! A datasets directory holds exactly two dataset directories: the before
//! dataset (named `before` unless configured otherwise) and one after
//! dataset with any other name.
//!
//! ```text
//! datasets/
//! ├── after/
//! └── before/
//! ```

mod arkit;
mod arkit_ue5;
mod yolo;

pub use arkit::{ArkitConfidenceMap, ArkitDataset, ArkitDepthMap, ArkitFrame, ArkitGeometrySource};
pub use arkit_ue5::{ArkitUe5GeometrySource, read_ue5_depth_csv};
pub use yolo::YoloDetectionSource;

use crate::{
    Error,
    geometry::{Camera, DepthMap},
    label::LabelInfo,
};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::read_dir,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Which capture of a dataset pair to load from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frame {
    Before,
    After,
}

/// Source of object detections for one dataset.
///
/// The source must be thread-safe (`Send + Sync`) since image pairs are
/// matched in parallel.
pub trait DetectionSource: Send + Sync {
    /// Paths to the images of a dataset, sorted.
    fn images_path(&self, dataset: &Path) -> Result<Vec<PathBuf>, Error>;

    /// Paths to the label files of a dataset, sorted.
    ///
    /// The stem of each label file is the image id.
    fn labels_path(&self, dataset: &Path) -> Result<Vec<PathBuf>, Error>;

    /// Reads the labels of one image.
    fn read_labels(&self, path: &Path) -> Result<Vec<LabelInfo>, Error>;
}

/// Source of depth and camera geometry for a before/after dataset pair.
///
/// Depth maps must match the resolution of the images the detections were
/// produced on.
pub trait GeometrySource: Send + Sync {
    /// Depth map of `image_id` in the requested capture.
    fn depth_map(
        &self,
        datasets: &Path,
        image_id: &str,
        before_name: &str,
        frame: Frame,
    ) -> Result<DepthMap, Error>;

    /// Camera parameters of `image_id` in the requested capture.
    fn camera(
        &self,
        datasets: &Path,
        image_id: &str,
        before_name: &str,
        frame: Frame,
    ) -> Result<Camera, Error>;

    /// Correction applied in camera space before the inverse view matrix.
    fn correction_matrix(&self) -> Option<Matrix4<f64>> {
        None
    }

    /// Dataset directory holding `frame`.
    fn dataset_path(
        &self,
        datasets: &Path,
        before_name: &str,
        frame: Frame,
    ) -> Result<PathBuf, Error> {
        match frame {
            Frame::Before => Ok(datasets.join(before_name)),
            Frame::After => locate_after_dataset(datasets, before_name),
        }
    }
}

/// Finds the single dataset directory next to `before_name`.
///
/// Returns [`Error::TooManyDatasets`] when more than one candidate exists
/// and [`Error::AfterDatasetNotFound`] when there is none. Plain files are
/// ignored.
pub fn locate_after_dataset(datasets: &Path, before_name: &str) -> Result<PathBuf, Error> {
    let mut candidates = Vec::new();
    for entry in read_dir(datasets)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if path.file_name().is_some_and(|name| name == before_name) {
            continue;
        }
        candidates.push(path);
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(Error::AfterDatasetNotFound(datasets.join(before_name))),
        1 => Ok(candidates.remove(0)),
        _ => Err(Error::TooManyDatasets(candidates)),
    }
}

/// Configuration key selecting a loader implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderKind {
    Yolo,
    Arkit,
    ArkitUe5,
}

impl LoaderKind {
    pub fn detection_source(self) -> Result<Box<dyn DetectionSource>, Error> {
        match self {
            LoaderKind::Yolo => Ok(Box::new(YoloDetectionSource)),
            other => Err(Error::UnsupportedFormat(format!(
                "{} does not provide detections",
                other
            ))),
        }
    }

    pub fn geometry_source(self) -> Result<Box<dyn GeometrySource>, Error> {
        match self {
            LoaderKind::Arkit => Ok(Box::new(ArkitGeometrySource)),
            LoaderKind::ArkitUe5 => Ok(Box::new(ArkitUe5GeometrySource)),
            other => Err(Error::UnsupportedFormat(format!(
                "{} does not provide depth and camera geometry",
                other
            ))),
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoaderKind::Yolo => "yolo",
            LoaderKind::Arkit => "arkit",
            LoaderKind::ArkitUe5 => "arkit_ue5",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LoaderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "yolo" => Ok(LoaderKind::Yolo),
            "arkit" => Ok(LoaderKind::Arkit),
            "arkit_ue5" => Ok(LoaderKind::ArkitUe5),
            _ => Err(Error::UnsupportedFormat(format!("unknown loader: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, create_dir_all};

    #[test]
    fn test_locate_after_dataset() {
        let dir = tempfile::tempdir().unwrap();
        create_dir_all(dir.path().join("before")).unwrap();
        create_dir_all(dir.path().join("after_scan")).unwrap();
        File::create(dir.path().join("change_detection_result.json")).unwrap();

        let after = locate_after_dataset(dir.path(), "before").unwrap();
        assert_eq!(after, dir.path().join("after_scan"));
    }

    #[test]
    fn test_locate_after_dataset_errors() {
        let dir = tempfile::tempdir().unwrap();
        create_dir_all(dir.path().join("before")).unwrap();
        assert!(matches!(
            locate_after_dataset(dir.path(), "before"),
            Err(Error::AfterDatasetNotFound(_))
        ));

        create_dir_all(dir.path().join("after")).unwrap();
        create_dir_all(dir.path().join("other")).unwrap();
        match locate_after_dataset(dir.path(), "before") {
            Err(Error::TooManyDatasets(paths)) => assert_eq!(paths.len(), 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_loader_kind_keys() {
        assert_eq!("yolo".parse::<LoaderKind>().unwrap(), LoaderKind::Yolo);
        assert_eq!("arkit-ue5".parse::<LoaderKind>().unwrap(), LoaderKind::ArkitUe5);
        assert_eq!("ARKIT_UE5".parse::<LoaderKind>().unwrap(), LoaderKind::ArkitUe5);
        assert!("colmap".parse::<LoaderKind>().is_err());
        assert_eq!(LoaderKind::ArkitUe5.to_string(), "arkit_ue5");

        assert!(LoaderKind::Yolo.detection_source().is_ok());
        assert!(LoaderKind::Yolo.geometry_source().is_err());
        assert!(LoaderKind::Arkit.detection_source().is_err());
        assert!(LoaderKind::ArkitUe5.geometry_source().is_ok());
    }
}
