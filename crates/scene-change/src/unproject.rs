// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Back-projection of pixels with depth into world space.
//!
//! A pixel `(u, v)` with depth `d` maps to
//!
//! ```text
//! p_cam   = K⁻¹ · [u, v, 1]ᵀ · d
//! p_world = V⁻¹ · C · [p_cam, 1]ᵀ
//! ```
//!
//! where `K` is the camera intrinsic matrix, `V` the view matrix and `C` an
//! optional correction matrix for device coordinate conventions (identity
//! when absent). Depth is not validated: a zero, negative or NaN depth
//! yields whatever the formula produces, so callers filter samples first.

use crate::{
    Error,
    geometry::{Camera, DepthMap, Pixel, Point},
};
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

/// Precomputed inverse matrices for repeated unprojection with one camera.
#[derive(Debug, Clone, Copy)]
pub struct Unprojector {
    intrinsic_inv: Matrix3<f64>,
    world_from_camera: Matrix4<f64>,
}

impl Unprojector {
    /// Inverts the camera matrices once.
    ///
    /// Returns [`Error::SingularMatrix`] when either matrix has no inverse.
    pub fn new(camera: &Camera, correction: Option<&Matrix4<f64>>) -> Result<Self, Error> {
        let intrinsic_inv = camera
            .intrinsic
            .try_inverse()
            .ok_or(Error::SingularMatrix("intrinsic"))?;
        let view_inv = camera
            .view_matrix
            .try_inverse()
            .ok_or(Error::SingularMatrix("view"))?;
        let world_from_camera = match correction {
            Some(correction) => view_inv * correction,
            None => view_inv,
        };
        Ok(Unprojector {
            intrinsic_inv,
            world_from_camera,
        })
    }

    pub fn point(&self, pixel: Pixel, depth: f64) -> Point {
        let ray = self.intrinsic_inv * Vector3::new(pixel.x as f64, pixel.y as f64, 1.0);
        let camera_space = ray * depth;
        let world = self.world_from_camera
            * Vector4::new(camera_space.x, camera_space.y, camera_space.z, 1.0);
        Point::new(world.x, world.y, world.z)
    }
}

/// Unprojects a batch of pixels with their depth samples.
pub fn unproject(
    camera: &Camera,
    pixels: &[Pixel],
    depths: &[f64],
    correction: Option<&Matrix4<f64>>,
) -> Result<Vec<Point>, Error> {
    if pixels.len() != depths.len() {
        return Err(Error::InvalidParameters(format!(
            "{} pixels but {} depth samples",
            pixels.len(),
            depths.len()
        )));
    }
    let unprojector = Unprojector::new(camera, correction)?;
    Ok(pixels
        .iter()
        .zip(depths)
        .map(|(pixel, depth)| unprojector.point(*pixel, *depth))
        .collect())
}

/// Unprojects one pixel, sampling its depth from `depth_map`.
pub fn unproject_pixel(
    camera: &Camera,
    pixel: Pixel,
    depth_map: &DepthMap,
    correction: Option<&Matrix4<f64>>,
) -> Result<Point, Error> {
    let depth = depth_map.get(pixel).ok_or_else(|| {
        Error::InvalidDepthMap(format!(
            "pixel ({}, {}) is outside the {}x{} depth map",
            pixel.x,
            pixel.y,
            depth_map.width(),
            depth_map.height()
        ))
    })?;
    let points = unproject(camera, &[pixel], &[depth as f64], correction)?;
    points
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidParameters("empty unprojection".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::flip_yz;

    fn assert_point(p: Point, x: f64, y: f64, z: f64) {
        assert!(
            (p.x - x).abs() < 1e-9 && (p.y - y).abs() < 1e-9 && (p.z - z).abs() < 1e-9,
            "{:?} != ({}, {}, {})",
            p,
            x,
            y,
            z
        );
    }

    #[test]
    fn test_principal_point_lies_on_axis() {
        let camera = Camera::pinhole(500.0, 500.0, 320.0, 240.0);
        let points = unproject(&camera, &[Pixel::new(320, 240)], &[2.0], None).unwrap();
        assert_point(points[0], 0.0, 0.0, 2.0);
    }

    #[test]
    fn test_offset_pixel_scales_with_depth() {
        let camera = Camera::pinhole(100.0, 100.0, 50.0, 50.0);
        let pixels = [Pixel::new(150, 50), Pixel::new(50, 0)];
        let points = unproject(&camera, &pixels, &[1.0, 4.0], None).unwrap();
        assert_point(points[0], 1.0, 0.0, 1.0);
        assert_point(points[1], 0.0, -2.0, 4.0);
    }

    #[test]
    fn test_view_matrix_translation() {
        // World-to-camera shifts by -5 along X, so the camera sits at x = 5.
        let view = Matrix4::new_translation(&Vector3::new(-5.0, 0.0, 0.0));
        let camera = Camera::pinhole(100.0, 100.0, 50.0, 50.0).with_view_matrix(view);
        let points = unproject(&camera, &[Pixel::new(50, 50)], &[3.0], None).unwrap();
        assert_point(points[0], 5.0, 0.0, 3.0);
    }

    #[test]
    fn test_correction_flips_axes() {
        let camera = Camera::pinhole(100.0, 100.0, 50.0, 50.0);
        let correction = flip_yz();
        let points =
            unproject(&camera, &[Pixel::new(50, 150)], &[2.0], Some(&correction)).unwrap();
        assert_point(points[0], 0.0, -2.0, -2.0);
    }

    #[test]
    fn test_single_pixel_matches_batch() {
        let camera = Camera::pinhole(200.0, 210.0, 64.0, 48.0);
        let depth = DepthMap::new(2, 2, vec![1.0, 1.5, 2.0, 2.5]).unwrap();
        let pixel = Pixel::new(1, 1);

        let single = unproject_pixel(&camera, pixel, &depth, None).unwrap();
        let batch = unproject(&camera, &[pixel], &[2.5], None).unwrap();
        assert_eq!(single, batch[0]);

        assert!(unproject_pixel(&camera, Pixel::new(2, 0), &depth, None).is_err());
    }

    #[test]
    fn test_singular_matrices() {
        let mut camera = Camera::pinhole(0.0, 100.0, 50.0, 50.0);
        assert!(matches!(
            unproject(&camera, &[Pixel::new(0, 0)], &[1.0], None),
            Err(Error::SingularMatrix("intrinsic"))
        ));

        camera.intrinsic = Matrix3::identity();
        camera.view_matrix = Matrix4::zeros();
        assert!(matches!(
            unproject(&camera, &[Pixel::new(0, 0)], &[1.0], None),
            Err(Error::SingularMatrix("view"))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let camera = Camera::pinhole(1.0, 1.0, 0.0, 0.0);
        assert!(unproject(&camera, &[Pixel::new(0, 0)], &[], None).is_err());
    }
}
