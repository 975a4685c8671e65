// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Four character pixel format codes.
//!
//! V4L2 packs a code as `a | b << 8 | c << 16 | d << 24` independent of host
//! endianness, so conversions go through little-endian byte order.

use std::{fmt, str::FromStr};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

/// Components per pixel for the packed formats the capture path understands.
const COMPONENTS: &[(FourCC, u32)] = &[
    (FourCC(*b"RGB1"), 3),
    (FourCC(*b"RGB3"), 3),
    (FourCC(*b"RGB4"), 4),
    (FourCC(*b"YUYV"), 2),
    (FourCC(*b"YVYU"), 2),
    (FourCC(*b"VYUY"), 2),
    (FourCC(*b"UYVY"), 2),
    (FourCC(*b"BGR3"), 3),
    (FourCC(*b"BGR4"), 4),
];

impl FourCC {
    pub const YUYV: FourCC = FourCC(*b"YUYV");

    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Number of byte components per pixel, if the code is a known packed
    /// format.
    pub fn components(self) -> Option<u32> {
        COMPONENTS
            .iter()
            .find(|(code, _)| *code == self)
            .map(|(_, n)| *n)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(buf: &[u8; 4]) -> FourCC {
        FourCC(*buf)
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        FourCC(val.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.as_u32()
    }
}

impl FromStr for FourCC {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| format!("FOURCC must be exactly 4 bytes: {}", s))?;
        Ok(FourCC(bytes))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                for b in self.0 {
                    write!(f, "{}", std::ascii::escape_default(b))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_conversion() {
        assert_eq!(FourCC::YUYV.as_u32(), 0x5659_5559);
        assert_eq!(FourCC::from(0x3231_564e), FourCC(*b"NV12"));
    }

    #[test]
    fn test_components() {
        assert_eq!(FourCC::YUYV.components(), Some(2));
        assert_eq!(FourCC(*b"RGB3").components(), Some(3));
        assert_eq!(FourCC(*b"BGR4").components(), Some(4));
        assert_eq!(FourCC(*b"MJPG").components(), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("UYVY".parse::<FourCC>().unwrap(), FourCC(*b"UYVY"));
        assert!("YUV".parse::<FourCC>().is_err());
    }

    #[test]
    fn test_display_non_ascii() {
        assert_eq!(FourCC(*b"YUYV").to_string(), "YUYV");
        assert_eq!(FourCC([0xff, b'A', b'B', b'C']).to_string(), "\\xffABC");
    }
}
