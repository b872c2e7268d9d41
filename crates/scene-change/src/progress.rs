// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use std::sync::{Mutex, mpsc::Sender};

/// Progress information for long-running operations.
///
/// Pipeline stages that walk every image or category accept an optional
/// channel and report the number of finished items after each one.
///
/// # Examples
///
/// ```rust
/// use scene_change::Progress;
///
/// let progress = Progress {
///     current: 25,
///     total: 100,
/// };
/// let percentage = (progress.current as f64 / progress.total as f64) * 100.0;
/// println!(
///     "Progress: {:.1}% ({}/{})",
///     percentage, progress.current, progress.total
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Current number of completed items.
    pub current: usize,
    /// Total number of items to process.
    pub total: usize,
}

/// Thread-safe completion counter feeding an optional progress channel.
///
/// Updates are sent while the count is locked, so the receiver sees them in
/// increasing order even when workers finish concurrently. Send failures are
/// ignored: a dropped receiver only stops the updates.
pub(crate) struct ProgressCounter<'a> {
    sender: Option<&'a Sender<Progress>>,
    current: Mutex<usize>,
    total: usize,
}

impl<'a> ProgressCounter<'a> {
    pub(crate) fn new(sender: Option<&'a Sender<Progress>>, total: usize) -> Self {
        if let Some(sender) = sender {
            let _ = sender.send(Progress { current: 0, total });
        }
        ProgressCounter {
            sender,
            current: Mutex::new(0),
            total,
        }
    }

    pub(crate) fn advance(&self) {
        let mut current = match self.current.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current += 1;
        if let Some(sender) = self.sender {
            let _ = sender.send(Progress {
                current: *current,
                total: self.total,
            });
        }
    }
}
