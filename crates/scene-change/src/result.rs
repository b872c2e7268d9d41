// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! 2D change detection results.

use crate::{
    Change, Error,
    label::LabelInfo,
    persist::{RESULT_FILE, read_json, write_json},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

/// Identifier of an image, the stem of its label file.
pub type ImageId = String;

/// Classified labels of one before/after image pair.
///
/// `added` holds after-image labels, `removed` before-image labels and
/// `unchanged` the before-image side of every matched pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinglePairResult {
    pub added: BTreeSet<LabelInfo>,
    pub removed: BTreeSet<LabelInfo>,
    pub unchanged: BTreeSet<LabelInfo>,
}

impl SinglePairResult {
    pub fn labels(&self, change: Change) -> &BTreeSet<LabelInfo> {
        match change {
            Change::Added => &self.added,
            Change::Removed => &self.removed,
            Change::Unchanged => &self.unchanged,
        }
    }

    pub fn insert(&mut self, change: Change, label: LabelInfo) -> bool {
        match change {
            Change::Added => self.added.insert(label),
            Change::Removed => self.removed.insert(label),
            Change::Unchanged => self.unchanged.insert(label),
        }
    }

    /// Iterates every label with its classification.
    pub fn iter(&self) -> impl Iterator<Item = (Change, &LabelInfo)> {
        Change::ALL
            .into_iter()
            .flat_map(move |change| self.labels(change).iter().map(move |l| (change, l)))
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-image results for a whole dataset pair.
///
/// All images of a dataset share one resolution, recorded once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDetectionResults {
    pub result: BTreeMap<ImageId, SinglePairResult>,
    pub image_height: u32,
    pub image_width: u32,
}

impl ChangeDetectionResults {
    pub fn new(image_width: u32, image_height: u32) -> Self {
        ChangeDetectionResults {
            result: BTreeMap::new(),
            image_height,
            image_width,
        }
    }

    /// Reads results from a JSON file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let results: ChangeDetectionResults = read_json(path)?;
        if results.image_width == 0 || results.image_height == 0 {
            return Err(Error::InvalidParameters(format!(
                "image size {}x{} must be positive",
                results.image_width, results.image_height
            )));
        }
        Ok(results)
    }

    /// Writes the results to `change_detection_result.json` inside `dir`
    /// and returns the file path.
    pub fn export<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf, Error> {
        let path = dir.as_ref().join(RESULT_FILE);
        write_json(self, &path)?;
        log::info!("Change detection results saved to {}", path.display());
        Ok(path)
    }

    pub fn len(&self) -> usize {
        self.result.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::BoundingBox;

    fn sample() -> ChangeDetectionResults {
        let bbox = |x, y, w, h| BoundingBox::new(x, y, w, h).unwrap();
        let mut results = ChangeDetectionResults::new(1440, 1920);
        let mut pair = SinglePairResult::default();
        pair.insert(Change::Removed, LabelInfo::with_id(0, bbox(0.1, 0.1, 0.2, 0.2)));
        pair.insert(Change::Added, LabelInfo::with_id(0, bbox(0.9, 0.9, 0.1, 0.1)));
        pair.insert(Change::Unchanged, LabelInfo::with_id(1, bbox(0.8, 0.8, 0.4, 0.4)));
        pair.insert(Change::Unchanged, LabelInfo::with_id(2, bbox(0.3, 0.4, 0.1, 0.1)));
        results.result.insert("image_0".to_owned(), pair);

        let mut named = SinglePairResult::default();
        named.insert(Change::Added, LabelInfo::with_name("chair", bbox(0.5, 0.5, 0.2, 0.3)));
        results.result.insert("image_1".to_owned(), named);
        results
    }

    #[test]
    fn test_json_layout() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["image_height"], 1920);
        assert_eq!(value["image_width"], 1440);
        let pair = &value["result"]["image_0"];
        assert_eq!(pair["added"].as_array().unwrap().len(), 1);
        assert_eq!(pair["removed"].as_array().unwrap().len(), 1);
        assert_eq!(pair["unchanged"].as_array().unwrap().len(), 2);
        assert_eq!(value["result"]["image_1"]["added"][0]["label_name"], "chair");
    }

    #[test]
    fn test_json_round_trip_ignores_order() {
        let results = sample();
        let mut value = serde_json::to_value(&results).unwrap();

        // Reverse the set order; parsing must yield the same sets.
        let unchanged = value["result"]["image_0"]["unchanged"].as_array_mut().unwrap();
        unchanged.reverse();

        let parsed: ChangeDetectionResults = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, results);
    }

    #[test]
    fn test_export_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let results = sample();
        let path = results.export(dir.path()).unwrap();
        assert!(path.ends_with(RESULT_FILE));
        assert_eq!(ChangeDetectionResults::read(&path).unwrap(), results);
    }

    #[test]
    fn test_pair_iteration() {
        let results = sample();
        let pair = &results.result["image_0"];
        assert_eq!(pair.len(), 4);
        let changes: Vec<_> = pair.iter().map(|(change, _)| change).collect();
        assert_eq!(
            changes,
            vec![Change::Removed, Change::Unchanged, Change::Unchanged, Change::Added]
        );
    }
}
