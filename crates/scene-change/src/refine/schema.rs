// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! 3D change detection results and per-category point indexes.

use crate::{
    Change, Error,
    geometry::{Pixel, Point},
    label::LabelKey,
    persist::{REFINED_RESULT_3D_FILE, RESULT_3D_FILE, read_json, write_json},
    result::ImageId,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, btree_map},
    path::{Path, PathBuf},
};

/// A detection lifted to 3D: category, source pixel and world point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "LabelRecord3d", into = "LabelRecord3d")]
pub struct LabelInfo3d {
    pub key: LabelKey,
    pub pixel: Pixel,
    pub point: Point,
}

#[derive(Serialize, Deserialize)]
struct LabelRecord3d {
    label_id: Option<u32>,
    label_name: Option<String>,
    pixel: Pixel,
    point: Point,
}

impl TryFrom<LabelRecord3d> for LabelInfo3d {
    type Error = Error;

    fn try_from(record: LabelRecord3d) -> Result<Self, Self::Error> {
        Ok(LabelInfo3d {
            key: LabelKey::from_parts(record.label_id, record.label_name)?,
            pixel: record.pixel,
            point: record.point,
        })
    }
}

impl From<LabelInfo3d> for LabelRecord3d {
    fn from(label: LabelInfo3d) -> Self {
        let (label_id, label_name) = label.key.into_parts();
        LabelRecord3d {
            label_id,
            label_name,
            pixel: label.pixel,
            point: label.point,
        }
    }
}

impl LabelInfo3d {
    pub fn new(key: LabelKey, pixel: Pixel, point: Point) -> Self {
        LabelInfo3d { key, pixel, point }
    }

    /// Category of the label, used to group points for refinement.
    pub fn label(&self) -> &LabelKey {
        &self.key
    }
}

/// Classified 3D labels of one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinglePairResult3d {
    pub added: BTreeSet<LabelInfo3d>,
    pub removed: BTreeSet<LabelInfo3d>,
    pub unchanged: BTreeSet<LabelInfo3d>,
}

impl SinglePairResult3d {
    pub fn labels(&self, change: Change) -> &BTreeSet<LabelInfo3d> {
        match change {
            Change::Added => &self.added,
            Change::Removed => &self.removed,
            Change::Unchanged => &self.unchanged,
        }
    }

    pub fn insert(&mut self, change: Change, label: LabelInfo3d) -> bool {
        match change {
            Change::Added => self.added.insert(label),
            Change::Removed => self.removed.insert(label),
            Change::Unchanged => self.unchanged.insert(label),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Change, &LabelInfo3d)> {
        Change::ALL
            .into_iter()
            .flat_map(move |change| self.labels(change).iter().map(move |l| (change, l)))
    }

    /// Adds every label of `other` to the matching set.
    pub fn merge(&mut self, other: SinglePairResult3d) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.unchanged.extend(other.unchanged);
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-image 3D results, keyed by image id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeDetection3dResults {
    results: BTreeMap<ImageId, SinglePairResult3d>,
}

impl ChangeDetection3dResults {
    pub fn new() -> Self {
        ChangeDetection3dResults::default()
    }

    pub fn get(&self, image_id: &str) -> Option<&SinglePairResult3d> {
        self.results.get(image_id)
    }

    pub fn insert(&mut self, image_id: ImageId, result: SinglePairResult3d) {
        self.results.insert(image_id, result);
    }

    /// Result of `image_id`, created empty when missing.
    pub fn entry(&mut self, image_id: ImageId) -> &mut SinglePairResult3d {
        self.results.entry(image_id).or_default()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ImageId, SinglePairResult3d> {
        self.results.iter()
    }

    /// Merges `other` into `self` by per-image set union.
    pub fn merge(&mut self, other: ChangeDetection3dResults) {
        for (image_id, result) in other.results {
            self.entry(image_id).merge(result);
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Total number of labels across all images.
    pub fn label_count(&self) -> usize {
        self.results.values().map(SinglePairResult3d::len).sum()
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        read_json(path)
    }

    /// Writes the results into `dir` and returns the file path.
    ///
    /// Refined results go to `refined_change_detection_result_3d.json`,
    /// others to `change_detection_result_3d.json`.
    pub fn export<P: AsRef<Path>>(&self, dir: P, refined: bool) -> Result<PathBuf, Error> {
        let file_name = if refined {
            REFINED_RESULT_3D_FILE
        } else {
            RESULT_3D_FILE
        };
        let path = dir.as_ref().join(file_name);
        write_json(self, &path)?;
        log::info!("3D change detection results saved to {}", path.display());
        Ok(path)
    }
}

impl FromIterator<(ImageId, SinglePairResult3d)> for ChangeDetection3dResults {
    fn from_iter<I: IntoIterator<Item = (ImageId, SinglePairResult3d)>>(iter: I) -> Self {
        let mut results = ChangeDetection3dResults::new();
        for (image_id, result) in iter {
            results.entry(image_id).merge(result);
        }
        results
    }
}

impl<'a> IntoIterator for &'a ChangeDetection3dResults {
    type Item = (&'a ImageId, &'a SinglePairResult3d);
    type IntoIter = btree_map::Iter<'a, ImageId, SinglePairResult3d>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// One classified 3D observation of a category.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePoint {
    pub image_id: ImageId,
    pub change: Change,
    pub point: Point,
    pub pixel: Pixel,
}

/// All observations of one category across a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangePoints(Vec<ChangePoint>);

impl ChangePoints {
    pub fn new(points: Vec<ChangePoint>) -> Self {
        ChangePoints(points)
    }

    pub fn points(&self) -> &[ChangePoint] {
        &self.0
    }

    pub fn coordinates(&self) -> Vec<Point> {
        self.0.iter().map(|p| p.point).collect()
    }

    pub fn count(&self, change: Change) -> usize {
        self.0.iter().filter(|p| p.change == change).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<ChangePoint> {
        self.0
    }
}

/// Collects observations into one [`ChangePoints`] per category.
#[derive(Debug, Default)]
pub struct ChangePointsBuilder {
    points: BTreeMap<LabelKey, Vec<ChangePoint>>,
}

impl ChangePointsBuilder {
    pub fn new() -> Self {
        ChangePointsBuilder::default()
    }

    /// Builder seeded with every label of `results`.
    pub fn from_results(results: &ChangeDetection3dResults) -> Self {
        let mut builder = ChangePointsBuilder::new();
        for (image_id, result) in results {
            for (change, label) in result.iter() {
                builder.push(
                    label.label().clone(),
                    ChangePoint {
                        image_id: image_id.clone(),
                        change,
                        point: label.point,
                        pixel: label.pixel,
                    },
                );
            }
        }
        builder
    }

    pub fn push(&mut self, key: LabelKey, point: ChangePoint) -> &mut Self {
        self.points.entry(key).or_default().push(point);
        self
    }

    pub fn build(self) -> BTreeMap<LabelKey, ChangePoints> {
        self.points
            .into_iter()
            .map(|(key, points)| {
                let points = ChangePoints::new(points);
                if log::log_enabled!(log::Level::Debug) {
                    for change in Change::ALL {
                        log::debug!(
                            "[{}] {}: {} points",
                            key,
                            change,
                            points.count(change)
                        );
                    }
                }
                (key, points)
            })
            .collect()
    }
}
