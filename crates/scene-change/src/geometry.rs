// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Points, pixels, cameras and depth maps.

use crate::Error;
use image::{ImageBuffer, Luma, imageops};
use nalgebra::{Matrix3, Matrix4, Vector4};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
};

/// A point in 3D world space.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Point { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_squared(other).sqrt()
    }

    fn bits(&self) -> [u64; 3] {
        [self.x.to_bits(), self.y.to_bits(), self.z.to_bits()]
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Point {}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
            .then_with(|| self.z.total_cmp(&other.z))
    }
}

/// Integer pixel coordinate, `x` along the image width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
}

impl Pixel {
    pub fn new(x: u32, y: u32) -> Self {
        Pixel { x, y }
    }

    /// Pixel under a normalized image coordinate, clamped to the image.
    pub fn from_normalized(x: f64, y: f64, width: u32, height: u32) -> Self {
        let to_pixel = |v: f64, size: u32| -> u32 {
            let max = size.saturating_sub(1) as f64;
            (v * size as f64).floor().clamp(0.0, max) as u32
        };
        Pixel {
            x: to_pixel(x, width),
            y: to_pixel(y, height),
        }
    }
}

/// Pinhole camera: 3x3 intrinsic matrix and 4x4 world-to-camera view
/// matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub intrinsic: Matrix3<f64>,
    pub view_matrix: Matrix4<f64>,
}

impl Camera {
    pub fn new(intrinsic: Matrix3<f64>, view_matrix: Matrix4<f64>) -> Self {
        Camera {
            intrinsic,
            view_matrix,
        }
    }

    /// Builds a camera from row-major nested arrays.
    pub fn from_rows(intrinsic: &[[f64; 3]; 3], view_matrix: &[[f64; 4]; 4]) -> Self {
        Camera {
            intrinsic: Matrix3::from_fn(|r, c| intrinsic[r][c]),
            view_matrix: Matrix4::from_fn(|r, c| view_matrix[r][c]),
        }
    }

    /// Camera at the world origin looking down +Z with the given focal
    /// lengths and principal point.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Camera {
            intrinsic: Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            view_matrix: Matrix4::identity(),
        }
    }

    pub fn with_view_matrix(mut self, view_matrix: Matrix4<f64>) -> Self {
        self.view_matrix = view_matrix;
        self
    }
}

/// Correction matrix that flips the Y and Z axes.
///
/// Portrait-oriented capture frames have Y pointing down and Z pointing
/// along the viewing direction; flipping both yields a right-handed frame
/// with Y up and the camera looking down -Z.
pub fn flip_yz() -> Matrix4<f64> {
    Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, -1.0, 1.0))
}

/// Row-major grid of depth samples in world units.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDepthMap(format!(
                "empty depth map {}x{}",
                width, height
            )));
        }
        if values.len() != width as usize * height as usize {
            return Err(Error::InvalidDepthMap(format!(
                "expected {} values for {}x{}, found {}",
                width as usize * height as usize,
                width,
                height,
                values.len()
            )));
        }
        Ok(DepthMap {
            width,
            height,
            values,
        })
    }

    /// Depth map with every sample set to `depth`.
    pub fn filled(width: u32, height: u32, depth: f32) -> Result<Self, Error> {
        DepthMap::new(width, height, vec![depth; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Depth at `pixel`, or `None` when the pixel lies outside the map.
    pub fn get(&self, pixel: Pixel) -> Option<f32> {
        if pixel.x >= self.width || pixel.y >= self.height {
            return None;
        }
        self.values
            .get(pixel.y as usize * self.width as usize + pixel.x as usize)
            .copied()
    }

    /// Pixels with a strictly positive, finite depth, in row-major order.
    pub fn valid_pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        let width = self.width as usize;
        self.values
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_finite() && **d > 0.0)
            .map(move |(i, _)| Pixel::new((i % width) as u32, (i / width) as u32))
    }

    /// Rotates the map 90 degrees clockwise.
    pub fn rotate90(&self) -> Result<Self, Error> {
        let rotated = imageops::rotate90(&self.to_image()?);
        DepthMap::from_image(rotated)
    }

    /// Bilinearly resamples the map to `width` x `height`.
    pub fn resize(&self, width: u32, height: u32) -> Result<Self, Error> {
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }

        // imageops::resize clamps float samples to [0, 1], so resample a
        // normalized copy and scale back. Invalid samples become 0.
        let scale = self
            .values
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(0.0f32, f32::max);
        if scale <= 0.0 {
            return DepthMap::filled(width, height, 0.0);
        }
        let normalized = DepthMap {
            width: self.width,
            height: self.height,
            values: self
                .values
                .iter()
                .map(|d| if d.is_finite() && *d > 0.0 { d / scale } else { 0.0 })
                .collect(),
        };

        let resized = imageops::resize(
            &normalized.to_image()?,
            width,
            height,
            imageops::FilterType::Triangle,
        );
        let mut depth = DepthMap::from_image(resized)?;
        depth.values.iter_mut().for_each(|d| *d *= scale);
        Ok(depth)
    }

    fn to_image(&self) -> Result<ImageBuffer<Luma<f32>, Vec<f32>>, Error> {
        ImageBuffer::from_raw(self.width, self.height, self.values.clone()).ok_or_else(|| {
            Error::InvalidDepthMap(format!(
                "cannot view {}x{} depth map as an image",
                self.width, self.height
            ))
        })
    }

    fn from_image(image: ImageBuffer<Luma<f32>, Vec<f32>>) -> Result<Self, Error> {
        let (width, height) = image.dimensions();
        DepthMap::new(width, height, image.into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_from_normalized_clamps() {
        assert_eq!(Pixel::from_normalized(0.5, 0.5, 1440, 1920), Pixel::new(720, 960));
        assert_eq!(Pixel::from_normalized(0.1, 0.1, 1440, 1920), Pixel::new(144, 192));
        assert_eq!(Pixel::from_normalized(1.0, 1.0, 1440, 1920), Pixel::new(1439, 1919));
        assert_eq!(Pixel::from_normalized(0.0, 0.0, 10, 10), Pixel::new(0, 0));
    }

    #[test]
    fn test_depth_map_lookup() {
        let depth = DepthMap::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(depth.get(Pixel::new(0, 0)), Some(1.0));
        assert_eq!(depth.get(Pixel::new(2, 1)), Some(6.0));
        assert_eq!(depth.get(Pixel::new(3, 0)), None);
        assert!(DepthMap::new(3, 2, vec![0.0; 5]).is_err());
    }

    #[test]
    fn test_depth_map_rotate_clockwise() {
        // 1 2 3        4 1
        // 4 5 6   ->   5 2
        //              6 3
        let depth = DepthMap::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let rotated = depth.rotate90().unwrap();
        assert_eq!(rotated.width(), 2);
        assert_eq!(rotated.height(), 3);
        assert_eq!(rotated.values(), &[4.0, 1.0, 5.0, 2.0, 6.0, 3.0]);
    }

    #[test]
    fn test_depth_map_resize_constant() {
        let depth = DepthMap::filled(4, 3, 2.5).unwrap();
        let resized = depth.resize(16, 12).unwrap();
        assert_eq!(resized.width(), 16);
        assert_eq!(resized.height(), 12);
        assert!(resized.values().iter().all(|d| (d - 2.5).abs() < 1e-5));
    }

    #[test]
    fn test_valid_pixels_skip_non_positive() {
        let depth = DepthMap::new(2, 2, vec![0.0, 1.0, -1.0, f32::NAN]).unwrap();
        let pixels: Vec<_> = depth.valid_pixels().collect();
        assert_eq!(pixels, vec![Pixel::new(1, 0)]);
    }

    #[test]
    fn test_flip_yz() {
        let m = flip_yz();
        let p = m * Vector4::new(1.0, 2.0, 3.0, 1.0);
        assert_eq!(p, Vector4::new(1.0, -2.0, -3.0, 1.0));
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert!(!Point::new(f64::NAN, 0.0, 0.0).is_finite());
    }
}
