// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # Scene Change Detection
//!
//! Detects objects that were added, removed or left unchanged between two
//! captures of the same scene, then reconciles the per-image decisions in 3D.
//!
//! ## Pipeline
//!
//! 1. **Detect**: [`ChangeDetector::run_all`] matches the detections of each
//!    before/after image pair. A before detection overlapping any after
//!    detection of the same category is unchanged, otherwise removed; after
//!    detections no before detection overlaps are added.
//! 2. **Lift**: [`refine::convert_result_2d_to_3d`] unprojects every
//!    classified detection into world space using per-frame depth maps and
//!    cameras.
//! 3. **Refine**: [`refine::Refiner`] clusters the 3D observations of each
//!    category with DBSCAN and assigns each cluster its majority change.
//!
//! Each stage persists its results as JSON so stages can run separately.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_change::{
//!     ChangeDetector, Error,
//!     loader::{ArkitUe5GeometrySource, YoloDetectionSource},
//!     refine::{RefinementParams, Refiner, convert_result_2d_to_3d},
//! };
//! use std::path::Path;
//!
//! fn main() -> Result<(), Error> {
//!     let datasets = Path::new("data/office");
//!
//!     let results = ChangeDetector::new().run_all(datasets, &YoloDetectionSource, "before", None)?;
//!     results.export(datasets)?;
//!
//!     let results_3d =
//!         convert_result_2d_to_3d(datasets, &results, &ArkitUe5GeometrySource, "before", None)?;
//!     let refiner = Refiner::new(RefinementParams::default())?;
//!     let (refined, path) = refiner.refine_and_export(&results_3d, datasets)?;
//!     println!("{} labels refined into {}", refined.label_count(), path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Dataset Layout
//!
//! A datasets directory holds the before dataset and exactly one after
//! dataset. See [`loader`] for the file layouts each loader reads.

mod change;
mod config;
mod detector;
mod error;
mod geometry;
mod label;
mod persist;
mod progress;
mod reconstruct;
mod result;
mod summary;
mod unproject;

pub mod loader;
pub mod refine;

pub use crate::{
    change::Change,
    config::{
        ChangeDetectionConfig, DatasetConfig, ENV_PREFIX, PipelineConfig, RefinementConfig,
    },
    detector::ChangeDetector,
    error::Error,
    geometry::{Camera, DepthMap, Pixel, Point, flip_yz},
    label::{BOUNDARY_EPSILON, BoundaryDiagnostic, BoundingBox, BoxEdge, LabelInfo, LabelKey},
    persist::{REFINED_RESULT_3D_FILE, RESULT_3D_FILE, RESULT_FILE},
    progress::Progress,
    reconstruct::{ColoredPoint, POINT_CLOUD_FILE, Reconstructor, change_points, write_ply},
    result::{ChangeDetectionResults, ImageId, SinglePairResult},
    summary::ChangeSummary,
    unproject::{Unprojector, unproject, unproject_pixel},
};
