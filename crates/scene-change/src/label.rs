// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Detection labels and normalized bounding boxes.
//!
//! A [`LabelInfo`] pairs a category identity ([`LabelKey`]) with a
//! [`BoundingBox`] expressed in normalized image coordinates. Labels are
//! value types: equality, hashing and ordering treat the float fields by
//! their bit patterns so labels can live in hash or ordered sets.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

/// Tolerance applied to box corners before reporting them as out of range.
pub const BOUNDARY_EPSILON: f64 = 1e-6;

/// Category identity of a detection.
///
/// A label is identified either by a numeric class id or by a class name,
/// never both. Labels of different schemes cannot be compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelKey {
    ById(u32),
    ByName(String),
}

impl LabelKey {
    /// Returns whether both keys name the same category.
    ///
    /// Comparing an id against a name is an identity inconsistency and
    /// returns [`Error::LabelInconsistent`].
    pub fn same_category(&self, other: &LabelKey) -> Result<bool, Error> {
        match (self, other) {
            (LabelKey::ById(a), LabelKey::ById(b)) => Ok(a == b),
            (LabelKey::ByName(a), LabelKey::ByName(b)) => Ok(a == b),
            _ => Err(Error::LabelInconsistent(self.clone(), other.clone())),
        }
    }

    pub fn id(&self) -> Option<u32> {
        match self {
            LabelKey::ById(id) => Some(*id),
            LabelKey::ByName(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            LabelKey::ById(_) => None,
            LabelKey::ByName(name) => Some(name),
        }
    }

    /// Builds a key from the nullable `label_id` / `label_name` pair used by
    /// the persisted JSON formats.
    pub fn from_parts(id: Option<u32>, name: Option<String>) -> Result<Self, Error> {
        match (id, name) {
            (Some(id), None) => Ok(LabelKey::ById(id)),
            (None, Some(name)) => Ok(LabelKey::ByName(name)),
            (None, None) => Err(Error::InvalidLabel(
                "label has neither label_id nor label_name".to_owned(),
            )),
            (Some(id), Some(name)) => Err(Error::InvalidLabel(format!(
                "label has both label_id {} and label_name {:?}",
                id, name
            ))),
        }
    }

    /// Splits the key into the nullable `label_id` / `label_name` pair.
    pub fn into_parts(self) -> (Option<u32>, Option<String>) {
        match self {
            LabelKey::ById(id) => (Some(id), None),
            LabelKey::ByName(name) => (None, Some(name)),
        }
    }
}

impl fmt::Display for LabelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelKey::ById(id) => write!(f, "{}", id),
            LabelKey::ByName(name) => write!(f, "{}", name),
        }
    }
}

/// Which edge of a box a [`BoundaryDiagnostic`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxEdge {
    Left,
    Top,
    Right,
    Bottom,
}

impl fmt::Display for BoxEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoxEdge::Left => "left",
            BoxEdge::Top => "top",
            BoxEdge::Right => "right",
            BoxEdge::Bottom => "bottom",
        };
        write!(f, "{}", name)
    }
}

/// A box edge that lies outside `[0, 1]` by more than
/// [`BOUNDARY_EPSILON`].
///
/// Diagnostics never stop a computation; the out-of-range value is used as
/// is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryDiagnostic {
    pub edge: BoxEdge,
    pub value: f64,
}

impl fmt::Display for BoundaryDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bounding box {} edge {} is outside [0, 1]",
            self.edge, self.value
        )
    }
}

/// Axis-aligned box in normalized center format.
///
/// `x` and `y` are the box center and `width` / `height` its extent, all
/// relative to the image size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Deserialize)]
struct RawBoundingBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = Error;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        BoundingBox::new(raw.x, raw.y, raw.width, raw.height)
    }
}

impl BoundingBox {
    /// Creates a box, rejecting centers outside `[0, 1]` and sizes outside
    /// `(0, 1]` beyond [`BOUNDARY_EPSILON`].
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, Error> {
        let in_unit = |v: f64| {
            v.is_finite() && (-BOUNDARY_EPSILON..=1.0 + BOUNDARY_EPSILON).contains(&v)
        };
        if !in_unit(x) || !in_unit(y) {
            return Err(Error::InvalidBoundingBox(format!(
                "center ({}, {}) is outside [0, 1]",
                x, y
            )));
        }
        if !in_unit(width) || !in_unit(height) || width <= 0.0 || height <= 0.0 {
            return Err(Error::InvalidBoundingBox(format!(
                "size {}x{} is outside (0, 1]",
                width, height
            )));
        }
        Ok(BoundingBox {
            x,
            y,
            width,
            height,
        })
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Corner coordinates `[x1, y1, x2, y2]` together with any edges that
    /// fall outside the unit square.
    pub fn xyxy_checked(&self) -> ([f64; 4], Vec<BoundaryDiagnostic>) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        let corners = [
            self.x - half_w,
            self.y - half_h,
            self.x + half_w,
            self.y + half_h,
        ];

        let edges = [BoxEdge::Left, BoxEdge::Top, BoxEdge::Right, BoxEdge::Bottom];
        let diagnostics = edges
            .iter()
            .zip(corners)
            .filter(|(_, v)| *v < -BOUNDARY_EPSILON || *v > 1.0 + BOUNDARY_EPSILON)
            .map(|(edge, value)| BoundaryDiagnostic { edge: *edge, value })
            .collect();

        (corners, diagnostics)
    }

    /// Corner coordinates `[x1, y1, x2, y2]`. Out-of-range edges are logged
    /// as warnings.
    pub fn xyxy(&self) -> [f64; 4] {
        let (corners, diagnostics) = self.xyxy_checked();
        for diagnostic in diagnostics {
            log::warn!("{}", diagnostic);
        }
        corners
    }

    pub fn boundary_diagnostics(&self) -> Vec<BoundaryDiagnostic> {
        self.xyxy_checked().1
    }

    /// Intersection over union of two boxes.
    ///
    /// Areas are taken from the corner extents so that identical boxes give
    /// exactly `1.0` and disjoint boxes exactly `0.0`.
    pub fn compute_iou(&self, other: &BoundingBox) -> f64 {
        let [a_x1, a_y1, a_x2, a_y2] = self.xyxy();
        let [b_x1, b_y1, b_x2, b_y2] = other.xyxy();

        let inter_w = (a_x2.min(b_x2) - a_x1.max(b_x1)).max(0.0);
        let inter_h = (a_y2.min(b_y2) - a_y1.max(b_y1)).max(0.0);
        let inter_area = inter_w * inter_h;

        let a_area = (a_x2 - a_x1) * (a_y2 - a_y1);
        let b_area = (b_x2 - b_x1) * (b_y2 - b_y1);
        let union_area = a_area + b_area - inter_area;

        if union_area <= 0.0 {
            0.0
        } else {
            inter_area / union_area
        }
    }

    fn bits(&self) -> [u64; 4] {
        [
            self.x.to_bits(),
            self.y.to_bits(),
            self.width.to_bits(),
            self.height.to_bits(),
        ]
    }
}

impl PartialEq for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for BoundingBox {}

impl Hash for BoundingBox {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl PartialOrd for BoundingBox {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BoundingBox {
    fn cmp(&self, other: &Self) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
            .then_with(|| self.width.total_cmp(&other.width))
            .then_with(|| self.height.total_cmp(&other.height))
    }
}

/// A single 2D detection: category identity plus bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "LabelRecord", into = "LabelRecord")]
pub struct LabelInfo {
    pub key: LabelKey,
    pub bounding_box: BoundingBox,
}

/// Persisted form of [`LabelInfo`] with nullable id and name columns.
#[derive(Serialize, Deserialize)]
struct LabelRecord {
    label_id: Option<u32>,
    label_name: Option<String>,
    bounding_box: BoundingBox,
}

impl TryFrom<LabelRecord> for LabelInfo {
    type Error = Error;

    fn try_from(record: LabelRecord) -> Result<Self, Self::Error> {
        Ok(LabelInfo {
            key: LabelKey::from_parts(record.label_id, record.label_name)?,
            bounding_box: record.bounding_box,
        })
    }
}

impl From<LabelInfo> for LabelRecord {
    fn from(label: LabelInfo) -> Self {
        let (label_id, label_name) = label.key.into_parts();
        LabelRecord {
            label_id,
            label_name,
            bounding_box: label.bounding_box,
        }
    }
}

impl LabelInfo {
    pub fn new(key: LabelKey, bounding_box: BoundingBox) -> Self {
        LabelInfo { key, bounding_box }
    }

    pub fn with_id(id: u32, bounding_box: BoundingBox) -> Self {
        LabelInfo::new(LabelKey::ById(id), bounding_box)
    }

    pub fn with_name(name: impl Into<String>, bounding_box: BoundingBox) -> Self {
        LabelInfo::new(LabelKey::ByName(name.into()), bounding_box)
    }

    pub fn label_id(&self) -> Option<u32> {
        self.key.id()
    }

    pub fn label_name(&self) -> Option<&str> {
        self.key.name()
    }

    /// See [`LabelKey::same_category`].
    pub fn same_category(&self, other: &LabelInfo) -> Result<bool, Error> {
        self.key.same_category(&other.key)
    }

    pub fn compute_iou(&self, other: &LabelInfo) -> f64 {
        self.bounding_box.compute_iou(&other.bounding_box)
    }
}
