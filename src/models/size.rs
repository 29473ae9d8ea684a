use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::terminal::AxisMetrics;

/// A length along one terminal axis, either in pixels or in whole cells
///
/// Conversions go through the cell size of the axis they are measured on,
/// so the same `Size` can mean different pixel counts horizontally and
/// vertically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    Px(i32),
    Cells(i32),
}

impl Size {
    pub const ZERO: Size = Size::Px(0);

    /// Length in pixels
    pub fn px(self, axis: AxisMetrics) -> i64 {
        match self {
            Size::Px(px) => px as i64,
            Size::Cells(cells) => cells as i64 * axis.cell_px as i64,
        }
    }

    /// Length in cells, a partial cell counting as a whole one
    pub fn cells(self, axis: AxisMetrics) -> i64 {
        match self {
            Size::Px(px) => ceil_div(px as i64, axis.cell_px as i64),
            Size::Cells(cells) => cells as i64,
        }
    }

    /// Length in cells, dropping any partial cell
    pub fn floor_cells(self, axis: AxisMetrics) -> i64 {
        match self {
            Size::Px(px) => (px as i64).div_euclid(axis.cell_px.max(1) as i64),
            Size::Cells(cells) => cells as i64,
        }
    }

    pub fn is_zero(self) -> bool {
        matches!(self, Size::Px(0) | Size::Cells(0))
    }
}

/// Signed resize bounds: positive numbers are pixels, negative numbers are
/// a count of cells.
impl From<i32> for Size {
    fn from(value: i32) -> Self {
        if value < 0 {
            Size::Cells(value.saturating_abs())
        } else {
            Size::Px(value)
        }
    }
}

impl Default for Size {
    fn default() -> Self {
        Size::ZERO
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    let divisor = divisor.max(1);
    -((-value).div_euclid(divisor))
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Px(px) => write!(f, "{}", px),
            Size::Cells(cells) => write!(f, "{}t", cells),
        }
    }
}

/// Parses `"12"` as pixels and `"12t"` as terminal cells
impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (number, cells) = match s.strip_suffix('t') {
            Some(number) => (number, true),
            None => (s, false),
        };

        let value: i32 = number
            .trim()
            .parse()
            .map_err(|_| format!("invalid size '{}': expected e.g. 120 (pixels) or 12t (cells)", s))?;

        Ok(if cells {
            Size::Cells(value)
        } else {
            Size::Px(value)
        })
    }
}

impl Serialize for Size {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Size {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SizeVisitor;

        impl Visitor<'_> for SizeVisitor {
            type Value = Size;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a pixel count or a string such as \"12t\"")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Size, E> {
                i32::try_from(v)
                    .map(Size::Px)
                    .map_err(|_| E::custom(format!("size {} out of range", v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Size, E> {
                i32::try_from(v)
                    .map(Size::Px)
                    .map_err(|_| E::custom(format!("size {} out of range", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Size, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}
