// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use super::DetectionSource;
use crate::{
    Error,
    label::{BoundingBox, LabelInfo, LabelKey},
};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Detections written by YOLO, one directory per image.
///
/// ```text
/// dataset/
/// ├── image_0/
/// │   ├── labels/
/// │   │   └── image_0.txt
/// │   └── image_0.jpg
/// └── ...
/// ```
///
/// Each label line is `class x y width height [confidence]` in normalized
/// center format. A purely numeric class is a class id, anything else a
/// class name.
#[derive(Debug, Clone, Copy, Default)]
pub struct YoloDetectionSource;

impl YoloDetectionSource {
    fn parse_line(line: &str) -> Result<LabelInfo, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 && fields.len() != 6 {
            return Err(format!("expected 5 or 6 fields, found {}", fields.len()));
        }

        let class = fields[0];
        let key = if class.chars().all(|c| c.is_ascii_digit()) {
            LabelKey::ById(class.parse().map_err(|e| format!("class {}: {}", class, e))?)
        } else {
            LabelKey::ByName(class.to_owned())
        };

        let mut values = [0.0f64; 4];
        for (value, field) in values.iter_mut().zip(&fields[1..5]) {
            *value = field
                .parse()
                .map_err(|e| format!("value {:?}: {}", field, e))?;
        }
        let bounding_box = BoundingBox::new(values[0], values[1], values[2], values[3])
            .map_err(|e| e.to_string())?;

        Ok(LabelInfo::new(key, bounding_box))
    }
}

impl DetectionSource for YoloDetectionSource {
    fn images_path(&self, dataset: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dataset).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| Error::IoError(e.into()))?;
            let is_image = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
            if entry.file_type().is_file() && is_image {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn labels_path(&self, dataset: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dataset).min_depth(3).max_depth(3) {
            let entry = entry.map_err(|e| Error::IoError(e.into()))?;
            let path = entry.path();
            let in_labels_dir = path
                .parent()
                .and_then(|p| p.file_name())
                .is_some_and(|name| name == "labels");
            let is_text = path.extension().is_some_and(|ext| ext == "txt");
            if entry.file_type().is_file() && in_labels_dir && is_text {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read_labels(&self, path: &Path) -> Result<Vec<LabelInfo>, Error> {
        let contents = read_to_string(path)?;
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                YoloDetectionSource::parse_line(line).map_err(|reason| {
                    Error::InvalidLabel(format!("{}:{}: {}", path.display(), number + 1, reason))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, create_dir_all, write};

    #[test]
    fn test_read_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image_0.txt");
        write(
            &path,
            "0 0.1 0.1 0.2 0.2\nchair 0.5 0.5 0.25 0.5 0.87\n\n12 0.8 0.8 0.4 0.4\n",
        )
        .unwrap();

        let labels = YoloDetectionSource.read_labels(&path).unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].key, LabelKey::ById(0));
        assert_eq!(labels[1].key, LabelKey::ByName("chair".to_owned()));
        assert_eq!(labels[2].key, LabelKey::ById(12));
        assert!((labels[1].bounding_box.height - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_read_labels_rejects_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");

        write(&path, "0 0.1 0.1 0.2\n").unwrap();
        assert!(matches!(
            YoloDetectionSource.read_labels(&path),
            Err(Error::InvalidLabel(_))
        ));

        write(&path, "0 0.1 abc 0.2 0.2\n").unwrap();
        assert!(YoloDetectionSource.read_labels(&path).is_err());

        write(&path, "0 0.1 0.1 0.0 0.2\n").unwrap();
        assert!(YoloDetectionSource.read_labels(&path).is_err());
    }

    #[test]
    fn test_class_id_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overflow.txt");
        write(&path, "0 0.1 0.1 0.2 0.2\n99999999999 0.5 0.5 0.2 0.2\n").unwrap();

        match YoloDetectionSource.read_labels(&path) {
            Err(Error::InvalidLabel(reason)) => {
                assert!(reason.contains(":2:"), "{}", reason);
                assert!(reason.contains("class 99999999999"), "{}", reason);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_dataset_paths() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["image_1", "image_0"] {
            let image_dir = dir.path().join(name);
            create_dir_all(image_dir.join("labels")).unwrap();
            File::create(image_dir.join(format!("{}.jpg", name))).unwrap();
            File::create(image_dir.join("labels").join(format!("{}.txt", name))).unwrap();
            File::create(image_dir.join("notes.md")).unwrap();
        }

        let images = YoloDetectionSource.images_path(dir.path()).unwrap();
        assert_eq!(
            images,
            vec![
                dir.path().join("image_0").join("image_0.jpg"),
                dir.path().join("image_1").join("image_1.jpg"),
            ]
        );

        let labels = YoloDetectionSource.labels_path(dir.path()).unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].ends_with("image_0/labels/image_0.txt"));
    }
}
