// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use super::{
    device::V4l2Device,
    driver::{Driver, FormatDescription, PixFormat},
};
use crate::{fourcc::FourCC, Error};
use rpi_hwio_sys::v4l2 as ffi;
use std::{fmt, io, path::Path};

/// Largest width or height accepted in a format request.
pub const MAX_DIMENSION: u32 = 32768;

/// Choice of pixel format among those a device enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatPolicy {
    /// The last format the driver lists
    #[default]
    Last,
    /// The first format the driver lists
    First,
    /// The given format if listed, otherwise the last
    Prefer(FourCC),
}

impl FormatPolicy {
    pub fn select<'a>(&self, formats: &'a [FormatDescription]) -> Option<&'a FormatDescription> {
        match self {
            FormatPolicy::Last => formats.last(),
            FormatPolicy::First => formats.first(),
            FormatPolicy::Prefer(fourcc) => formats
                .iter()
                .find(|desc| desc.fourcc == *fourcc)
                .or_else(|| formats.last()),
        }
    }
}

impl fmt::Display for FormatPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormatPolicy::Last => write!(f, "last"),
            FormatPolicy::First => write!(f, "first"),
            FormatPolicy::Prefer(fourcc) => write!(f, "prefer {}", fourcc),
        }
    }
}

/// Field order of a video format (`enum v4l2_field`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Field {
    Any = ffi::V4L2_FIELD_ANY,
    /// Progressive
    None = ffi::V4L2_FIELD_NONE,
    Top = ffi::V4L2_FIELD_TOP,
    Bottom = ffi::V4L2_FIELD_BOTTOM,
    Interlaced = ffi::V4L2_FIELD_INTERLACED,
    SeqTb = ffi::V4L2_FIELD_SEQ_TB,
    SeqBt = ffi::V4L2_FIELD_SEQ_BT,
    Alternate = ffi::V4L2_FIELD_ALTERNATE,
    InterlacedTb = ffi::V4L2_FIELD_INTERLACED_TB,
    InterlacedBt = ffi::V4L2_FIELD_INTERLACED_BT,
}

impl Field {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            ffi::V4L2_FIELD_ANY => Field::Any,
            ffi::V4L2_FIELD_NONE => Field::None,
            ffi::V4L2_FIELD_TOP => Field::Top,
            ffi::V4L2_FIELD_BOTTOM => Field::Bottom,
            ffi::V4L2_FIELD_INTERLACED => Field::Interlaced,
            ffi::V4L2_FIELD_SEQ_TB => Field::SeqTb,
            ffi::V4L2_FIELD_SEQ_BT => Field::SeqBt,
            ffi::V4L2_FIELD_ALTERNATE => Field::Alternate,
            ffi::V4L2_FIELD_INTERLACED_TB => Field::InterlacedTb,
            ffi::V4L2_FIELD_INTERLACED_BT => Field::InterlacedBt,
            _ => return None,
        })
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn is_progressive(self) -> bool {
        self == Field::None
    }
}

/// Format committed to the driver.
///
/// All values are those read back from the driver after the commit, which may
/// differ from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    pub field: Field,
    /// Row stride of the kernel buffer
    pub bytes_per_line: u32,
    /// Size in bytes of one kernel buffer image
    pub size_image: u32,
}

impl CaptureFormat {
    /// Bytes per pixel from the component table, falling back to the row
    /// stride divided by the width for unknown formats.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self.fourcc.components() {
            Some(n) => n,
            None if self.width > 0 => self.bytes_per_line / self.width,
            None => 0,
        }
    }

    /// Whether rows can be repacked from the driver's stride: the code is in
    /// the component table and a reported stride holds at least one row.
    pub fn is_packed(&self) -> bool {
        match self.fourcc.components() {
            Some(n) => {
                self.bytes_per_line == 0
                    || u64::from(self.bytes_per_line) >= u64::from(self.width) * u64::from(n)
            }
            None => false,
        }
    }

    /// Bytes in one packed row.
    pub fn row_bytes(&self) -> usize {
        (self.width as usize).saturating_mul(self.bytes_per_pixel() as usize)
    }

    /// Frame store size: `width * height * bytes_per_pixel` for packed
    /// formats, the driver's image size for compressed and planar ones.
    /// `None` when the size does not fit in `usize`.
    pub fn checked_buffer_size(&self) -> Option<usize> {
        if self.is_packed() {
            (self.width as usize)
                .checked_mul(self.bytes_per_pixel() as usize)?
                .checked_mul(self.height as usize)
        } else {
            usize::try_from(self.size_image).ok()
        }
    }

    /// Frame store size, see [`checked_buffer_size`](Self::checked_buffer_size).
    /// A negotiated format always fits; 0 otherwise.
    pub fn buffer_size(&self) -> usize {
        self.checked_buffer_size().unwrap_or(0)
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} stride {} size {}",
            self.width, self.height, self.fourcc, self.bytes_per_line, self.size_image
        )
    }
}

/// Enumerates the formats of a capture device and commits one of them.
#[derive(Debug)]
pub struct FormatNegotiator<D: Driver = V4l2Device> {
    driver: D,
    formats: Vec<FormatDescription>,
}

impl FormatNegotiator<V4l2Device> {
    /// Open the device node at `path` for non-blocking read/write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Ok(Self::new(V4l2Device::open(path)?))
    }
}

impl<D: Driver> FormatNegotiator<D> {
    pub fn new(driver: D) -> Self {
        FormatNegotiator {
            driver,
            formats: Vec::new(),
        }
    }

    /// Query the driver's format list in order, index 0 upward, until the
    /// driver reports the end of the list.
    ///
    /// # Errors
    ///
    /// [`Error::FormatEnumeration`] if a query fails for a reason other than
    /// the end of the list, [`Error::NoFormats`] if the list is empty.
    pub fn enumerate_formats(&mut self) -> Result<&[FormatDescription], Error> {
        let mut formats = Vec::new();
        let mut index = 0;
        while let Some(desc) = self
            .driver
            .enum_format(index)
            .map_err(Error::FormatEnumeration)?
        {
            log::debug!("format {}: {} ({})", index, desc.fourcc, desc.description);
            formats.push(desc);
            index += 1;
        }

        if formats.is_empty() {
            return Err(Error::NoFormats);
        }
        self.formats = formats;
        Ok(&self.formats)
    }

    /// Formats found by the last enumeration.
    pub fn formats(&self) -> &[FormatDescription] {
        &self.formats
    }

    /// Commit `width` x `height` in the format chosen by `policy`.
    ///
    /// Formats are enumerated first if that has not happened yet. The request
    /// is clamped to `1..=MAX_DIMENSION` with progressive field order, and the
    /// driver is free to adjust it further.
    pub fn negotiate(
        &mut self,
        width: u32,
        height: u32,
        policy: FormatPolicy,
    ) -> Result<CaptureFormat, Error> {
        if self.formats.is_empty() {
            self.enumerate_formats()?;
        }
        let selected = policy.select(&self.formats).ok_or(Error::NoFormats)?;

        let request = PixFormat {
            width: width.clamp(1, MAX_DIMENSION),
            height: height.clamp(1, MAX_DIMENSION),
            fourcc: selected.fourcc,
            field: ffi::V4L2_FIELD_NONE,
            bytes_per_line: 0,
            size_image: 0,
        };
        let committed = self
            .driver
            .set_format(&request)
            .map_err(Error::FormatNegotiation)?;

        let field = match Field::from_raw(committed.field) {
            Some(field) if field.is_progressive() => field,
            _ => return Err(Error::UnsupportedField(committed.field)),
        };

        if committed.width > MAX_DIMENSION || committed.height > MAX_DIMENSION {
            return Err(Error::FormatNegotiation(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "driver committed {}x{} beyond {}",
                    committed.width, committed.height, MAX_DIMENSION
                ),
            )));
        }

        if committed.fourcc != request.fourcc {
            log::warn!(
                "driver substituted {} for requested {}",
                committed.fourcc,
                request.fourcc
            );
        }

        let format = CaptureFormat {
            width: committed.width,
            height: committed.height,
            fourcc: committed.fourcc,
            field,
            bytes_per_line: committed.bytes_per_line,
            size_image: committed.size_image,
        };
        if format.checked_buffer_size().is_none() {
            return Err(Error::FormatNegotiation(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame size of {} overflows", format),
            )));
        }
        log::debug!("committed {} (policy {})", format, policy);
        Ok(format)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }
}
