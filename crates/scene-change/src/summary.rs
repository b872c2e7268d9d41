// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-category change counts.

use crate::{
    Change,
    label::LabelKey,
    refine::{ChangeCounts, ChangeDetection3dResults},
    result::ChangeDetectionResults,
};
use std::{collections::BTreeMap, fmt};

/// Added, removed and unchanged label counts of a result file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    /// Number of images in the results.
    pub image_count: usize,
    /// Counts per category.
    pub categories: BTreeMap<LabelKey, ChangeCounts>,
}

impl ChangeSummary {
    pub fn from_results_2d(results: &ChangeDetectionResults) -> Self {
        let mut summary = ChangeSummary {
            image_count: results.len(),
            ..Default::default()
        };
        for pair in results.result.values() {
            for (change, label) in pair.iter() {
                summary.record(&label.key, change);
            }
        }
        summary
    }

    pub fn from_results_3d(results: &ChangeDetection3dResults) -> Self {
        let mut summary = ChangeSummary {
            image_count: results.len(),
            ..Default::default()
        };
        for (_, pair) in results {
            for (change, label) in pair.iter() {
                summary.record(label.label(), change);
            }
        }
        summary
    }

    fn record(&mut self, key: &LabelKey, change: Change) {
        self.categories.entry(key.clone()).or_default().add(change);
    }

    /// Counts summed over every category.
    pub fn total(&self) -> ChangeCounts {
        self.categories
            .values()
            .fold(ChangeCounts::default(), |acc, counts| ChangeCounts {
                removed: acc.removed + counts.removed,
                unchanged: acc.unchanged + counts.unchanged,
                added: acc.added + counts.added,
            })
    }

    /// One-line summary of the totals.
    pub fn summary(&self) -> String {
        let total = self.total();
        format!(
            "{} images, {} categories: {} added, {} removed, {} unchanged",
            self.image_count,
            self.categories.len(),
            total.added,
            total.removed,
            total.unchanged
        )
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "╔══════════════════════════════════════════════════════════════╗"
        )?;
        writeln!(
            f,
            "║                    SCENE CHANGE SUMMARY                      ║"
        )?;
        writeln!(
            f,
            "╠══════════════════════════════════════════════════════════════╣"
        )?;
        writeln!(
            f,
            "║ Images:     {}  Categories: {}",
            self.image_count,
            self.categories.len()
        )?;
        writeln!(
            f,
            "╠══════════════════════════════════════════════════════════════╣"
        )?;
        writeln!(
            f,
            "║ {:<24} {:>10} {:>10} {:>10}",
            "Category", "Added", "Removed", "Unchanged"
        )?;
        for (key, counts) in &self.categories {
            writeln!(
                f,
                "║ {:<24} {:>10} {:>10} {:>10}",
                key.to_string(),
                counts.added,
                counts.removed,
                counts.unchanged
            )?;
        }
        writeln!(
            f,
            "╠══════════════════════════════════════════════════════════════╣"
        )?;
        let total = self.total();
        writeln!(
            f,
            "║ {:<24} {:>10} {:>10} {:>10}",
            "Total", total.added, total.removed, total.unchanged
        )?;
        writeln!(
            f,
            "╚══════════════════════════════════════════════════════════════╝"
        )?;
        Ok(())
    }
}
