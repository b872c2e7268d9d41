// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use super::{ArkitFrame, ArkitGeometrySource, Frame, GeometrySource};
use crate::{
    Error,
    geometry::{Camera, DepthMap, flip_yz},
};
use nalgebra::Matrix4;
use std::{fs::read_to_string, path::Path};

/// Geometry of a dataset pair rendered in Unreal Engine 5 (before) and
/// recorded with ARKit (after).
///
/// ```text
/// datasets/
/// ├── after/
/// │   └── depth/
/// │       ├── image_0.json
/// │       └── ...
/// └── before/
///     └── depth/
///         ├── image_0.csv
///         └── ...
/// ```
///
/// Rendered frames carry no camera, and both captures are registered to the
/// same poses, so the ARKit camera of the after frame serves both.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArkitUe5GeometrySource;

impl GeometrySource for ArkitUe5GeometrySource {
    fn depth_map(
        &self,
        datasets: &Path,
        image_id: &str,
        before_name: &str,
        frame: Frame,
    ) -> Result<DepthMap, Error> {
        match frame {
            Frame::Before => {
                let path = datasets
                    .join(before_name)
                    .join("depth")
                    .join(format!("{}.csv", image_id));
                read_ue5_depth_csv(&path)
            }
            Frame::After => ArkitGeometrySource.depth_map(datasets, image_id, before_name, frame),
        }
    }

    fn camera(
        &self,
        datasets: &Path,
        image_id: &str,
        before_name: &str,
        _frame: Frame,
    ) -> Result<Camera, Error> {
        let path = ArkitGeometrySource.frame_path(datasets, image_id, before_name, Frame::After)?;
        ArkitFrame::read(path)?.camera()
    }

    fn correction_matrix(&self) -> Option<Matrix4<f64>> {
        Some(flip_yz())
    }
}

/// Reads a headerless comma-separated depth grid exported by Unreal Engine 5.
pub fn read_ue5_depth_csv(path: &Path) -> Result<DepthMap, Error> {
    let contents = read_to_string(path)?;
    let mut width = None;
    let mut height = 0u32;
    let mut values = Vec::new();

    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let before = values.len();
        for field in line.split(',') {
            values.push(field.trim().parse::<f32>()?);
        }
        let row_width = values.len() - before;
        match width {
            None => width = Some(row_width),
            Some(w) if w != row_width => {
                return Err(Error::InvalidDepthMap(format!(
                    "{}:{}: expected {} columns, found {}",
                    path.display(),
                    number + 1,
                    w,
                    row_width
                )));
            }
            Some(_) => {}
        }
        height += 1;
    }

    DepthMap::new(width.unwrap_or(0) as u32, height, values)
}
