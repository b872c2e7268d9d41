// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Majority voting inside clusters.

use super::{
    cluster::{ClusteredPoint, NOISE},
    schema::{ChangeDetection3dResults, LabelInfo3d},
};
use crate::{Change, geometry::Point, label::LabelKey};
use itertools::Itertools;

/// Number of observations per [`Change`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub removed: usize,
    pub unchanged: usize,
    pub added: usize,
}

impl ChangeCounts {
    pub fn get(&self, change: Change) -> usize {
        match change {
            Change::Removed => self.removed,
            Change::Unchanged => self.unchanged,
            Change::Added => self.added,
        }
    }

    pub fn add(&mut self, change: Change) {
        match change {
            Change::Removed => self.removed += 1,
            Change::Unchanged => self.unchanged += 1,
            Change::Added => self.added += 1,
        }
    }
}

impl<'a> FromIterator<&'a Change> for ChangeCounts {
    fn from_iter<I: IntoIterator<Item = &'a Change>>(iter: I) -> Self {
        let mut counts = ChangeCounts::default();
        for change in iter {
            counts.add(*change);
        }
        counts
    }
}

/// The change with the highest count.
///
/// Ties go to the lowest change in `Removed < Unchanged < Added` order, so a
/// cluster split evenly between removed and added observations is reported as
/// removed.
pub fn dominant_change(counts: &ChangeCounts) -> Change {
    let mut best = Change::Removed;
    for change in Change::ALL {
        if counts.get(change) > counts.get(best) {
            best = change;
        }
    }
    best
}

/// Re-labels the observations of one category by cluster majority.
///
/// Every point of a cluster takes the cluster's dominant change; noise points
/// are reported as unchanged.
pub fn vote(key: &LabelKey, points: Vec<ClusteredPoint>) -> ChangeDetection3dResults {
    let clusters = points.into_iter().into_group_map_by(|p| p.cluster_id);

    let mut results = ChangeDetection3dResults::new();
    for (cluster_id, members) in clusters.into_iter().sorted_by_key(|(id, _)| *id) {
        let change = if cluster_id == NOISE {
            log::debug!("[{}] {} noise points", key, members.len());
            Change::Unchanged
        } else {
            let counts: ChangeCounts = members.iter().map(|m| &m.point.change).collect();
            let change = dominant_change(&counts);
            log::debug!(
                "[{}] cluster {} at {:?}: {:?} -> {}",
                key,
                cluster_id,
                centroid(&members),
                counts,
                change
            );
            change
        };

        for member in members {
            let observation = member.point;
            results.entry(observation.image_id).insert(
                change,
                LabelInfo3d::new(key.clone(), observation.pixel, observation.point),
            );
        }
    }
    results
}

fn centroid(members: &[ClusteredPoint]) -> Option<Point> {
    let (x, y, z) = members
        .iter()
        .map(|m| m.point.point)
        .fold((0.0, 0.0, 0.0), |(x, y, z), p| (x + p.x, y + p.y, z + p.z));
    let len = members.len() as f64;
    (len > 0.0).then(|| Point::new(x / len, y / len, z / len))
}
