// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! V4L2 Device Enumerator
//!
//! This module provides the [`DeviceEnumerator`] type for discovering video
//! capture nodes on Linux systems.

use crate::Error;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Directory scanned by [`DeviceEnumerator::enumerate`].
pub const DEVICE_ROOT: &str = "/dev";

/// V4L2 Device Enumerator
///
/// Discovers `video<N>` device nodes. Discovery is purely name based: nodes
/// are not opened, so a listed device may still turn out to be busy or not a
/// capture device when opened.
///
/// # Example
///
/// ```no_run
/// use rpi_hwio::v4l2::DeviceEnumerator;
///
/// for path in DeviceEnumerator::enumerate()? {
///     println!("{}", path.display());
/// }
/// # Ok::<(), rpi_hwio::Error>(())
/// ```
pub struct DeviceEnumerator;

impl DeviceEnumerator {
    /// Enumerate the video nodes in `/dev`.
    ///
    /// # Returns
    ///
    /// Canonical paths ordered by device number. The vector is empty when no
    /// nodes exist.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if `/dev` cannot be read.
    pub fn enumerate() -> Result<Vec<PathBuf>, Error> {
        Self::enumerate_in(DEVICE_ROOT)
    }

    /// Enumerate the video nodes in `root`.
    ///
    /// Entries whose name is `video` followed by one or more ASCII digits are
    /// resolved to their canonical path. Entries that fail to resolve, such as
    /// dangling symlinks, are skipped.
    pub fn enumerate_in<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>, Error> {
        let root = root.as_ref();
        let mut devices = Vec::new();

        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(index) = name.to_str().and_then(device_index) else {
                continue;
            };

            match fs::canonicalize(entry.path()) {
                Ok(path) => devices.push((index, path)),
                Err(err) => log::debug!("skipping {}: {}", entry.path().display(), err),
            }
        }

        devices.sort();
        log::debug!("found {} video nodes in {}", devices.len(), root.display());
        Ok(devices.into_iter().map(|(_, path)| path).collect())
    }

    /// First video node in `/dev`.
    ///
    /// # Errors
    ///
    /// [`Error::NoCaptureDevices`] when none exist.
    pub fn first() -> Result<PathBuf, Error> {
        Self::first_in(DEVICE_ROOT)
    }

    pub fn first_in<P: AsRef<Path>>(root: P) -> Result<PathBuf, Error> {
        Self::enumerate_in(root)?
            .into_iter()
            .next()
            .ok_or(Error::NoCaptureDevices)
    }
}

/// Device number of a `video<N>` node name.
fn device_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("video")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
