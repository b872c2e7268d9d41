// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! JSON persistence helpers shared by the result types.

use crate::Error;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs::{File, create_dir_all},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// File name of the 2D change detection results.
pub const RESULT_FILE: &str = "change_detection_result.json";
/// File name of the 3D change detection results.
pub const RESULT_3D_FILE: &str = "change_detection_result_3d.json";
/// File name of the refined 3D change detection results.
pub const REFINED_RESULT_3D_FILE: &str = "refined_change_detection_result_3d.json";

pub(crate) fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, Error> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::with_capacity(64 * 1024, file);
    Ok(serde_json::from_reader(reader)?)
}

/// Writes `value` as pretty JSON, creating parent directories as needed.
pub(crate) fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<(), Error> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
