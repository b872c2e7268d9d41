// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::label::LabelKey;
use std::path::PathBuf;

/// Error type for scene change detection operations.
///
/// This enum covers the failure modes of every pipeline stage, from dataset
/// layout problems and malformed label files to label identity mismatches and
/// degenerate camera geometry.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred during file operations.
    IoError(std::io::Error),
    /// Configuration parsing or loading error.
    ConfigError(config::ConfigError),
    /// JSON serialization or deserialization error.
    JsonError(serde_json::Error),
    /// Image decoding or encoding error.
    ImageError(image::ImageError),
    /// Image header could not be probed for its dimensions.
    ImageSizeError(imagesize::ImageError),
    /// Path prefix stripping error.
    StripPrefixError(std::path::StripPrefixError),
    /// Floating point parsing error.
    ParseFloatError(std::num::ParseFloatError),
    /// Two labels using different identity schemes were compared.
    LabelInconsistent(LabelKey, LabelKey),
    /// More than one candidate "after" dataset sits next to the "before"
    /// dataset.
    TooManyDatasets(Vec<PathBuf>),
    /// No candidate "after" dataset sits next to the "before" dataset.
    AfterDatasetNotFound(PathBuf),
    /// The requested dataset directory does not exist.
    DatasetNotFound(PathBuf),
    /// Required image files are missing from the dataset.
    MissingImages(String),
    /// A label file line or label record could not be interpreted.
    InvalidLabel(String),
    /// Bounding box values fall outside the normalized range.
    InvalidBoundingBox(String),
    /// Depth map dimensions or values are inconsistent.
    InvalidDepthMap(String),
    /// Camera parameters are malformed.
    InvalidCamera(String),
    /// Invalid parameters provided to an operation.
    InvalidParameters(String),
    /// A camera matrix could not be inverted.
    SingularMatrix(&'static str),
    /// Unprojection produced a NaN or infinite coordinate.
    NonFinitePoint(String),
    /// Unsupported file format or loader.
    UnsupportedFormat(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::ConfigError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageError(err)
    }
}

impl From<imagesize::ImageError> for Error {
    fn from(err: imagesize::ImageError) -> Self {
        Error::ImageSizeError(err)
    }
}

impl From<std::path::StripPrefixError> for Error {
    fn from(err: std::path::StripPrefixError) -> Self {
        Error::StripPrefixError(err)
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::ParseFloatError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::ImageError(e) => write!(f, "Image error: {}", e),
            Error::ImageSizeError(e) => write!(f, "Image size error: {}", e),
            Error::StripPrefixError(e) => write!(f, "Path prefix error: {}", e),
            Error::ParseFloatError(e) => write!(f, "Float parse error: {}", e),
            Error::LabelInconsistent(a, b) => write!(
                f,
                "Label identity mismatch: cannot compare {} with {}",
                a, b
            ),
            Error::TooManyDatasets(paths) => {
                write!(f, "Too many candidate after datasets:")?;
                for path in paths {
                    write!(f, " {}", path.display())?;
                }
                Ok(())
            }
            Error::AfterDatasetNotFound(p) => {
                write!(f, "No after dataset found next to {}", p.display())
            }
            Error::DatasetNotFound(p) => write!(f, "Dataset not found: {}", p.display()),
            Error::MissingImages(s) => write!(f, "Missing images: {}", s),
            Error::InvalidLabel(s) => write!(f, "Invalid label: {}", s),
            Error::InvalidBoundingBox(s) => write!(f, "Invalid bounding box: {}", s),
            Error::InvalidDepthMap(s) => write!(f, "Invalid depth map: {}", s),
            Error::InvalidCamera(s) => write!(f, "Invalid camera: {}", s),
            Error::InvalidParameters(s) => write!(f, "Invalid parameters: {}", s),
            Error::SingularMatrix(s) => write!(f, "Singular {} matrix", s),
            Error::NonFinitePoint(s) => write!(f, "Non-finite point: {}", s),
            Error::UnsupportedFormat(s) => write!(f, "Unsupported format: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::ConfigError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::ImageError(e) => Some(e),
            Error::ImageSizeError(e) => Some(e),
            Error::StripPrefixError(e) => Some(e),
            Error::ParseFloatError(e) => Some(e),
            _ => None,
        }
    }
}
