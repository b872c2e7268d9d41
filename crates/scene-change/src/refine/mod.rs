// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Multi-view refinement of per-image change decisions.
//!
//! A single image pair often misjudges an object: occlusion, a missed
//! detection or a box shifted onto a neighbour all flip the decision for that
//! one view. Refinement pools the observations of every image in 3D, groups
//! those that land on the same physical object and lets them vote.
//!
//! The stages are:
//!
//! 1. [`convert_result_2d_to_3d`] anchors each label at the pixel under its
//!    box center and unprojects it with the depth and camera of the frame it
//!    was seen in.
//! 2. [`ChangePointsBuilder`] groups the 3D observations by category.
//! 3. [`Dbscan`] clusters each category's points.
//! 4. [`vote`] gives every point of a cluster the cluster's dominant change
//!    and reports noise points as unchanged.
//! 5. The per-category results are merged back into per-image results.

mod cluster;
mod lift;
mod schema;
mod vote;

pub use cluster::{ClusterId, ClusteredPoint, Dbscan, NOISE, cluster_points};
pub use lift::{convert_result_2d_to_3d, export_3d};
pub use schema::{
    ChangeDetection3dResults, ChangePoint, ChangePoints, ChangePointsBuilder, LabelInfo3d,
    SinglePairResult3d,
};
pub use vote::{ChangeCounts, dominant_change, vote};

use crate::Error;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Clustering parameters, shared by every category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementParams {
    /// Neighborhood radius in world units.
    pub epsilon: f64,
    /// Neighborhood size, self included, that makes a point a core point.
    pub min_samples: usize,
}

impl Default for RefinementParams {
    fn default() -> Self {
        RefinementParams {
            epsilon: 0.5,
            min_samples: 10,
        }
    }
}

/// Refines 3D change detection results by clustering and voting.
#[derive(Debug, Clone, Copy)]
pub struct Refiner {
    dbscan: Dbscan,
}

impl Refiner {
    /// Returns [`Error::InvalidParameters`] for a non-positive or non-finite
    /// epsilon or a zero `min_samples`.
    pub fn new(params: RefinementParams) -> Result<Self, Error> {
        Ok(Refiner {
            dbscan: Dbscan::new(params.epsilon, params.min_samples)?,
        })
    }

    pub fn params(&self) -> RefinementParams {
        RefinementParams {
            epsilon: self.dbscan.epsilon(),
            min_samples: self.dbscan.min_samples(),
        }
    }

    /// Refines every category independently and merges the results.
    ///
    /// Each input label appears exactly once in the output, under the same
    /// image, pixel and point, possibly with a different change.
    pub fn refine(&self, results: &ChangeDetection3dResults) -> ChangeDetection3dResults {
        let categories = ChangePointsBuilder::from_results(results).build();
        log::debug!(
            "Refining {} labels in {} categories (epsilon {}, min_samples {})",
            results.label_count(),
            categories.len(),
            self.dbscan.epsilon(),
            self.dbscan.min_samples()
        );

        let refined: Vec<ChangeDetection3dResults> = categories
            .into_par_iter()
            .map(|(key, points)| vote(&key, cluster_points(points, &self.dbscan)))
            .collect();

        let mut merged = ChangeDetection3dResults::new();
        for category in refined {
            merged.merge(category);
        }
        merged
    }

    /// Refines `results` and writes them to
    /// `refined_change_detection_result_3d.json` inside `dir`.
    pub fn refine_and_export(
        &self,
        results: &ChangeDetection3dResults,
        dir: &Path,
    ) -> Result<(ChangeDetection3dResults, PathBuf), Error> {
        let refined = self.refine(results);
        let path = refined.export(dir, true)?;
        Ok((refined, path))
    }
}
