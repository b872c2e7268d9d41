// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Density-based clustering of 3D observations.

use super::schema::{ChangePoint, ChangePoints};
use crate::{Error, geometry::Point};
use std::collections::HashMap;

/// Cluster index assigned by [`Dbscan`]; [`NOISE`] marks unclustered points.
pub type ClusterId = i32;

/// Cluster id of points outside every dense region.
pub const NOISE: ClusterId = -1;

/// DBSCAN over Euclidean distance.
///
/// The neighborhood of a point holds every point within `epsilon`
/// (inclusive), the point itself included. A point is a core point when its
/// neighborhood has at least `min_samples` members. Clusters are numbered
/// from 0 in the order their first core point appears in the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    epsilon: f64,
    min_samples: usize,
}

impl Dbscan {
    pub fn new(epsilon: f64, min_samples: usize) -> Result<Self, Error> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(Error::InvalidParameters(format!(
                "epsilon must be positive, got {}",
                epsilon
            )));
        }
        if min_samples == 0 {
            return Err(Error::InvalidParameters(
                "min_samples must be at least 1".to_owned(),
            ));
        }
        Ok(Dbscan {
            epsilon,
            min_samples,
        })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Cluster id of every point, in input order.
    pub fn fit_predict(&self, points: &[Point]) -> Vec<ClusterId> {
        let grid = Grid::new(points, self.epsilon);
        let is_core: Vec<bool> = (0..points.len())
            .map(|i| grid.neighbors(points, i).count() >= self.min_samples)
            .collect();

        let mut labels = vec![NOISE; points.len()];
        let mut next_id: ClusterId = 0;
        let mut stack = Vec::new();

        for seed in 0..points.len() {
            if labels[seed] != NOISE || !is_core[seed] {
                continue;
            }
            labels[seed] = next_id;
            stack.push(seed);
            while let Some(i) = stack.pop() {
                if !is_core[i] {
                    continue;
                }
                for j in grid.neighbors(points, i) {
                    if labels[j] == NOISE {
                        labels[j] = next_id;
                        stack.push(j);
                    }
                }
            }
            next_id += 1;
        }

        labels
    }
}

/// Uniform grid with `epsilon`-sized cells; neighbors of a point lie in the
/// 27 cells around its own.
struct Grid {
    cell_size: f64,
    cells: HashMap<[i64; 3], Vec<usize>>,
    epsilon_squared: f64,
}

impl Grid {
    fn new(points: &[Point], epsilon: f64) -> Self {
        let mut grid = Grid {
            cell_size: epsilon,
            cells: HashMap::new(),
            epsilon_squared: epsilon * epsilon,
        };
        for (i, point) in points.iter().enumerate() {
            let cell = grid.cell(point);
            grid.cells.entry(cell).or_default().push(i);
        }
        grid
    }

    fn cell(&self, point: &Point) -> [i64; 3] {
        [
            (point.x / self.cell_size).floor() as i64,
            (point.y / self.cell_size).floor() as i64,
            (point.z / self.cell_size).floor() as i64,
        ]
    }

    fn neighbors<'a>(&'a self, points: &'a [Point], i: usize) -> impl Iterator<Item = usize> + 'a {
        let center = points[i];
        let [cx, cy, cz] = self.cell(&center);
        (-1..=1)
            .flat_map(move |dx| (-1..=1).flat_map(move |dy| (-1..=1).map(move |dz| [dx, dy, dz])))
            .filter_map(move |[dx, dy, dz]| {
                self.cells.get(&[
                    cx.saturating_add(dx),
                    cy.saturating_add(dy),
                    cz.saturating_add(dz),
                ])
            })
            .flatten()
            .copied()
            .filter(move |j| points[*j].distance_squared(&center) <= self.epsilon_squared)
    }
}

/// A [`ChangePoint`] with the cluster it was assigned to.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredPoint {
    pub point: ChangePoint,
    pub cluster_id: ClusterId,
}

impl ClusteredPoint {
    pub fn is_noise(&self) -> bool {
        self.cluster_id == NOISE
    }
}

/// Clusters the observations of one category by their coordinates.
pub fn cluster_points(points: ChangePoints, dbscan: &Dbscan) -> Vec<ClusteredPoint> {
    let labels = dbscan.fit_predict(&points.coordinates());
    points
        .into_inner()
        .into_iter()
        .zip(labels)
        .map(|(point, cluster_id)| ClusteredPoint { point, cluster_id })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Change, geometry::Pixel};

    fn blob(cx: f64, cy: f64, cz: f64, n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let t = i as f64 * 0.01;
                Point::new(cx + t, cy - t, cz + t / 2.0)
            })
            .collect()
    }

    #[test]
    fn test_two_clusters_and_noise() {
        let mut points = blob(0.0, 0.0, 0.0, 12);
        points.push(Point::new(50.0, 50.0, 50.0));
        points.extend(blob(10.0, 10.0, 10.0, 12));

        let labels = Dbscan::new(0.5, 10).unwrap().fit_predict(&points);
        assert!(labels[..12].iter().all(|l| *l == 0));
        assert_eq!(labels[12], NOISE);
        assert!(labels[13..].iter().all(|l| *l == 1));
    }

    #[test]
    fn test_too_sparse_is_all_noise() {
        let points = blob(0.0, 0.0, 0.0, 9);
        let labels = Dbscan::new(0.5, 10).unwrap().fit_predict(&points);
        assert!(labels.iter().all(|l| *l == NOISE));
    }

    #[test]
    fn test_neighborhood_includes_self() {
        let points = vec![Point::new(0.0, 0.0, 0.0), Point::new(100.0, 0.0, 0.0)];
        let labels = Dbscan::new(0.5, 1).unwrap().fit_predict(&points);
        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn test_border_point_joins_cluster() {
        // Core point at 0.4 with border points at 0.0 and 0.8 on either
        // side; the far point at 1.4 is noise.
        let points = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(0.4, 0.0, 0.0),
            Point::new(0.8, 0.0, 0.0),
            Point::new(1.4, 0.0, 0.0),
        ];
        let labels = Dbscan::new(0.5, 3).unwrap().fit_predict(&points);
        assert_eq!(labels, vec![0, 0, 0, NOISE]);
    }

    #[test]
    fn test_epsilon_is_inclusive() {
        let points = vec![Point::new(0.0, 0.0, 0.0), Point::new(0.5, 0.0, 0.0)];
        let labels = Dbscan::new(0.5, 2).unwrap().fit_predict(&points);
        assert_eq!(labels, vec![0, 0]);
    }

    #[test]
    fn test_neighbors_across_cell_boundaries() {
        let points = vec![
            Point::new(-0.1, -0.1, -0.1),
            Point::new(0.1, 0.1, 0.1),
            Point::new(0.0, -0.2, 0.2),
        ];
        let labels = Dbscan::new(0.5, 3).unwrap().fit_predict(&points);
        assert_eq!(labels, vec![0, 0, 0]);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Dbscan::new(0.0, 10).is_err());
        assert!(Dbscan::new(f64::NAN, 10).is_err());
        assert!(Dbscan::new(0.5, 0).is_err());
    }

    #[test]
    fn test_cluster_points_keeps_observations() {
        let points = ChangePoints::new(
            blob(0.0, 0.0, 0.0, 3)
                .into_iter()
                .enumerate()
                .map(|(i, point)| ChangePoint {
                    image_id: format!("image_{}", i),
                    change: Change::Added,
                    point,
                    pixel: Pixel::new(i as u32, 0),
                })
                .collect(),
        );
        let clustered = cluster_points(points, &Dbscan::new(0.5, 3).unwrap());
        assert_eq!(clustered.len(), 3);
        assert!(clustered.iter().all(|p| p.cluster_id == 0 && !p.is_noise()));
        assert_eq!(clustered[2].point.image_id, "image_2");
    }
}
