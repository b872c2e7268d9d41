// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a label between the before and after captures.
///
/// Variants are declared in ascending value order so the derived `Ord`
/// matches `Removed < Unchanged < Added`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Removed = -1,
    Unchanged = 0,
    Added = 1,
}

impl Change {
    /// All variants in ascending value order.
    pub const ALL: [Change; 3] = [Change::Removed, Change::Unchanged, Change::Added];

    pub fn value(self) -> i8 {
        self as i8
    }

    /// Display color used by overlay renderers.
    pub fn color(self) -> &'static str {
        match self {
            Change::Removed => "red",
            Change::Unchanged => "black",
            Change::Added => "green",
        }
    }

    /// RGB triple matching [`Change::color`].
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Change::Removed => [255, 0, 0],
            Change::Unchanged => [0, 0, 0],
            Change::Added => [0, 255, 0],
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Change::Removed => "removed",
            Change::Unchanged => "unchanged",
            Change::Added => "added",
        };
        write!(f, "{}", name)
    }
}
