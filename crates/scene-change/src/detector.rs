// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! 2D change detection between a before and an after dataset.
//!
//! Labels of one image pair are matched by overlap rather than by an optimal
//! assignment: a before label is unchanged as soon as any after label of the
//! same category overlaps it, and one after label may satisfy several before
//! labels.

use crate::{
    Change, Error, Progress,
    label::LabelInfo,
    loader::{DetectionSource, locate_after_dataset},
    progress::ProgressCounter,
    result::{ChangeDetectionResults, ImageId, SinglePairResult},
};
use rayon::prelude::*;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::mpsc::Sender,
};

/// Classifies detections of image pairs as added, removed or unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        ChangeDetector
    }

    /// Returns whether two labels share a category and overlap.
    ///
    /// Fails with [`Error::LabelInconsistent`] when the labels use different
    /// identity schemes.
    pub fn check_intersection(&self, a: &LabelInfo, b: &LabelInfo) -> Result<bool, Error> {
        if !a.same_category(b)? {
            return Ok(false);
        }
        Ok(a.compute_iou(b) > 0.0)
    }

    /// Matches the labels of one image pair.
    ///
    /// Every before label lands in `unchanged` or `removed`, and every
    /// after label not claimed by an overlapping before label in `added`.
    pub fn compare_labels(
        &self,
        before: &[LabelInfo],
        after: &[LabelInfo],
    ) -> Result<SinglePairResult, Error> {
        let mut result = SinglePairResult::default();
        let mut claimed = HashSet::new();

        for before_label in before {
            let mut matched = false;
            for (index, after_label) in after.iter().enumerate() {
                if self.check_intersection(before_label, after_label)? {
                    matched = true;
                    claimed.insert(index);
                }
            }
            let change = if matched {
                Change::Unchanged
            } else {
                Change::Removed
            };
            result.insert(change, before_label.clone());
        }

        for (index, after_label) in after.iter().enumerate() {
            if !claimed.contains(&index) {
                result.insert(Change::Added, after_label.clone());
            }
        }

        Ok(result)
    }

    /// Reads and matches one pair of label files.
    pub fn run(
        &self,
        before_path: &Path,
        after_path: &Path,
        source: &dyn DetectionSource,
    ) -> Result<SinglePairResult, Error> {
        let before = source.read_labels(before_path)?;
        let after = source.read_labels(after_path)?;
        self.compare_labels(&before, &after)
    }

    /// Matches every image of the before dataset against its after
    /// counterpart.
    ///
    /// `datasets` must contain the `before_name` dataset and exactly one
    /// other dataset directory. The after label file of each image is found
    /// at the same relative path; images without one are skipped. The image
    /// resolution is read once from the first before image.
    ///
    /// Image pairs are matched in parallel. Any identity mismatch aborts
    /// the whole run.
    pub fn run_all(
        &self,
        datasets: &Path,
        source: &dyn DetectionSource,
        before_name: &str,
        progress: Option<&Sender<Progress>>,
    ) -> Result<ChangeDetectionResults, Error> {
        let before_dataset = datasets.join(before_name);
        if !before_dataset.is_dir() {
            return Err(Error::DatasetNotFound(before_dataset));
        }
        let after_dataset = locate_after_dataset(datasets, before_name)?;
        log::debug!(
            "Comparing {} with {}",
            before_dataset.display(),
            after_dataset.display()
        );

        let first_image = source
            .images_path(&before_dataset)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::MissingImages(format!("no images in {}", before_dataset.display()))
            })?;
        let size = imagesize::size(&first_image)?;
        let mut results = ChangeDetectionResults::new(size.width as u32, size.height as u32);

        let label_paths = source.labels_path(&before_dataset)?;
        let counter = ProgressCounter::new(progress, label_paths.len());

        let pairs = label_paths
            .par_iter()
            .map(|before_path| -> Result<Option<(ImageId, SinglePairResult)>, Error> {
                let relative = before_path.strip_prefix(&before_dataset)?;
                let after_path = after_dataset.join(relative);
                let image_id = before_path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        Error::InvalidLabel(format!("no file name in {}", before_path.display()))
                    })?;

                let pair = if after_path.exists() {
                    Some((image_id, self.run(before_path, &after_path, source)?))
                } else {
                    log::debug!("Skipping {}: no after labels", image_id);
                    None
                };
                counter.advance();
                Ok(pair)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        results.result.extend(pairs.into_iter().flatten());
        log::debug!("Matched {} image pairs", results.len());
        Ok(results)
    }

    /// Writes `change_detection_result.json` into `dir`.
    pub fn export(&self, results: &ChangeDetectionResults, dir: &Path) -> Result<PathBuf, Error> {
        results.export(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{BoundingBox, LabelKey};

    fn label(id: u32, x: f64, y: f64, w: f64, h: f64) -> LabelInfo {
        LabelInfo::with_id(id, BoundingBox::new(x, y, w, h).unwrap())
    }

    #[test]
    fn test_check_intersection() {
        let detector = ChangeDetector::new();
        let base = label(0, 0.5, 0.5, 1.0, 0.5);

        assert!(!detector
            .check_intersection(&base, &label(1, 0.5, 0.5, 1.0, 1.0))
            .unwrap());
        assert!(detector
            .check_intersection(&base, &label(0, 0.25, 0.25, 0.5, 0.5))
            .unwrap());
        assert!(!detector
            .check_intersection(&base, &label(0, 0.125, 0.125, 0.125, 0.125))
            .unwrap());
    }

    #[test]
    fn test_compare_labels() {
        let before = vec![label(0, 0.1, 0.1, 0.2, 0.2), label(1, 0.8, 0.8, 0.4, 0.4)];
        let after = vec![label(0, 0.9, 0.9, 0.1, 0.1), label(1, 0.7, 0.7, 0.1, 0.1)];

        let result = ChangeDetector::new().compare_labels(&before, &after).unwrap();
        assert_eq!(result.removed.iter().collect::<Vec<_>>(), vec![&before[0]]);
        assert_eq!(result.added.iter().collect::<Vec<_>>(), vec![&after[0]]);
        assert_eq!(result.unchanged.iter().collect::<Vec<_>>(), vec![&before[1]]);
    }

    #[test]
    fn test_one_after_label_satisfies_many() {
        let before = vec![label(2, 0.3, 0.3, 0.2, 0.2), label(2, 0.4, 0.4, 0.2, 0.2)];
        let after = vec![label(2, 0.35, 0.35, 0.2, 0.2)];

        let result = ChangeDetector::new().compare_labels(&before, &after).unwrap();
        assert_eq!(result.unchanged.len(), 2);
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_every_label_classified_once() {
        let before = vec![
            label(0, 0.2, 0.2, 0.1, 0.1),
            label(0, 0.6, 0.6, 0.3, 0.3),
            label(3, 0.5, 0.5, 0.5, 0.5),
        ];
        let after = vec![
            label(0, 0.65, 0.6, 0.3, 0.3),
            label(3, 0.1, 0.9, 0.1, 0.1),
            label(4, 0.5, 0.5, 0.5, 0.5),
        ];

        let result = ChangeDetector::new().compare_labels(&before, &after).unwrap();
        for l in &before {
            let hits = [result.unchanged.contains(l), result.removed.contains(l)];
            assert_eq!(hits.iter().filter(|h| **h).count(), 1);
            assert!(!result.added.contains(l));
        }
        assert_eq!(result.added.len(), 2);
        assert_eq!(result.len(), before.len() + 2);
    }

    #[test]
    fn test_empty_sides() {
        let labels = vec![label(0, 0.5, 0.5, 0.2, 0.2)];
        let detector = ChangeDetector::new();

        let added = detector.compare_labels(&[], &labels).unwrap();
        assert_eq!(added.added.len(), 1);

        let removed = detector.compare_labels(&labels, &[]).unwrap();
        assert_eq!(removed.removed.len(), 1);
    }

    #[test]
    fn test_mixed_identity_aborts() {
        let bbox = BoundingBox::new(0.5, 0.5, 0.2, 0.2).unwrap();
        let before = vec![LabelInfo::with_id(1, bbox)];
        let after = vec![LabelInfo::with_name("x", bbox)];

        let err = ChangeDetector::new()
            .compare_labels(&before, &after)
            .unwrap_err();
        match err {
            Error::LabelInconsistent(a, b) => {
                assert_eq!(a, LabelKey::ById(1));
                assert_eq!(b, LabelKey::ByName("x".to_owned()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
