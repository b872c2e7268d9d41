// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Layered pipeline configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults.
//! 2. A TOML file: an explicit path, or `config.toml` in the user config
//!    directory when present.
//! 3. `SCENE_CHANGE_*` environment variables, with `__` between nested keys,
//!    for example `SCENE_CHANGE_REFINEMENT__EPSILON=0.3`.
//!
//! ```toml
//! [dataset]
//! datasets_path = "data/office"
//! before_name = "before"
//!
//! [change_detection]
//! loader = "yolo"
//!
//! [refinement]
//! loader = "arkit_ue5"
//! epsilon = 0.5
//! min_samples = 10
//! ```

use crate::{Error, loader::LoaderKind, refine::RefinementParams};
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read by [`PipelineConfig::load`].
pub const ENV_PREFIX: &str = "SCENE_CHANGE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Directory holding the before dataset and exactly one after dataset.
    pub datasets_path: PathBuf,
    /// Name of the before dataset directory.
    pub before_name: String,
    /// Where results are written; defaults to `datasets_path`.
    pub results_path: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            datasets_path: PathBuf::new(),
            before_name: "before".to_owned(),
            results_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeDetectionConfig {
    /// Source of the object detections.
    pub loader: LoaderKind,
}

impl Default for ChangeDetectionConfig {
    fn default() -> Self {
        ChangeDetectionConfig {
            loader: LoaderKind::Yolo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Source of depth maps and cameras.
    pub loader: LoaderKind,
    pub epsilon: f64,
    pub min_samples: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        let params = RefinementParams::default();
        RefinementConfig {
            loader: LoaderKind::ArkitUe5,
            epsilon: params.epsilon,
            min_samples: params.min_samples,
        }
    }
}

impl RefinementConfig {
    pub fn params(&self) -> RefinementParams {
        RefinementParams {
            epsilon: self.epsilon,
            min_samples: self.min_samples,
        }
    }
}

/// Configuration of a full detect, lift and refine run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    pub change_detection: ChangeDetectionConfig,
    pub refinement: RefinementConfig,
}

impl PipelineConfig {
    /// Loads the configuration from `path`, or from the default file when
    /// `path` is `None`, then applies environment overrides.
    ///
    /// An explicit file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let file = match path {
            Some(path) => Some((path.to_path_buf(), true)),
            None => Self::default_path().map(|path| (path, false)),
        };
        let config = Self::build(file, ENV_PREFIX)?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// `config.toml` in the user config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("ai", "EdgeFirst", "Scene Change")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn build(file: Option<(PathBuf, bool)>, env_prefix: &str) -> Result<Self, Error> {
        let mut builder = Config::builder();
        if let Some((path, required)) = file {
            log::debug!("Reading configuration from {}", path.display());
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }
        let config = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Checks the settings a run cannot start without.
    pub fn validate(&self) -> Result<(), Error> {
        if self.dataset.datasets_path.as_os_str().is_empty() {
            return Err(Error::InvalidParameters(
                "dataset.datasets_path is required".to_owned(),
            ));
        }
        if self.dataset.before_name.is_empty() {
            return Err(Error::InvalidParameters(
                "dataset.before_name must not be empty".to_owned(),
            ));
        }
        self.change_detection.loader.detection_source()?;
        self.refinement.loader.geometry_source()?;
        crate::refine::Refiner::new(self.refinement.params())?;
        Ok(())
    }

    /// Directory results are written to.
    pub fn results_path(&self) -> &Path {
        self.dataset
            .results_path
            .as_deref()
            .unwrap_or(&self.dataset.datasets_path)
    }
}
