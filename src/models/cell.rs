use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::size::Size;
use crate::terminal::AxisMetrics;

/// Placement of content inside a cell, along one axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

impl Align {
    /// Offset in whole cells to place `child` inside `cell`
    ///
    /// Left is always 0, center floors half the free space to a cell,
    /// right floors all of it. Never negative.
    pub fn offset(self, cell: Size, child: Size, axis: AxisMetrics) -> u32 {
        let free = cell.px(axis) - child.px(axis);
        let px = match self {
            Align::Left => 0,
            Align::Center => free.div_euclid(2),
            Align::Right => free,
        };

        px.div_euclid(axis.cell_px.max(1) as i64)
            .clamp(0, u32::MAX as i64) as u32
    }
}

impl FromStr for Align {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Align::Left),
            "center" | "centre" => Ok(Align::Center),
            "right" => Ok(Align::Right),
            _ => Err(format!("invalid alignment '{}': use left, center or right", s)),
        }
    }
}

const DEFAULT_CELL_PX: i32 = 256;

/// Horizontal specification of a grid slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub size: Size,
    #[serde(default)]
    pub align: Align,
}

impl Column {
    pub fn new(size: Size) -> Self {
        Column {
            size,
            align: Align::default(),
        }
    }

    pub fn aligned(size: Size, align: Align) -> Self {
        Column { size, align }
    }
}

impl Default for Column {
    fn default() -> Self {
        Column::new(Size::Px(DEFAULT_CELL_PX))
    }
}

/// Vertical specification of a grid slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub size: Size,
    #[serde(default)]
    pub align: Align,
}

impl Row {
    pub fn new(size: Size) -> Self {
        Row {
            size,
            align: Align::default(),
        }
    }

    pub fn aligned(size: Size, align: Align) -> Self {
        Row { size, align }
    }
}

impl Default for Row {
    fn default() -> Self {
        Row::new(Size::Px(DEFAULT_CELL_PX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> AxisMetrics {
        AxisMetrics {
            cells: 100,
            px: 800,
            cell_px: 8,
        }
    }

    #[test]
    fn test_align_offsets() {
        let cell = Size::Cells(10);
        let child = Size::Cells(4);
        assert_eq!(Align::Left.offset(cell, child, axis()), 0);
        assert_eq!(Align::Center.offset(cell, child, axis()), 3);
        assert_eq!(Align::Right.offset(cell, child, axis()), 6);
    }

    #[test]
    fn test_align_center_floors_odd_space() {
        assert_eq!(Align::Center.offset(Size::Cells(10), Size::Cells(5), axis()), 2);
    }

    #[test]
    fn test_align_pixel_child() {
        // 80px cell, 50px image: 15px on the left, floored to one cell
        assert_eq!(Align::Center.offset(Size::Cells(10), Size::Px(50), axis()), 1);
        assert_eq!(Align::Right.offset(Size::Cells(10), Size::Px(50), axis()), 3);
    }

    #[test]
    fn test_align_never_negative() {
        assert_eq!(Align::Right.offset(Size::Cells(2), Size::Cells(5), axis()), 0);
        assert_eq!(Align::Center.offset(Size::Cells(2), Size::Cells(5), axis()), 0);
    }

    #[test]
    fn test_align_parse() {
        assert_eq!("Right".parse::<Align>(), Ok(Align::Right));
        assert!("middle".parse::<Align>().is_err());
    }
}
