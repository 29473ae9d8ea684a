//! Terminal collaborator: geometry, cursor queries and answer input.

#[cfg(test)]
pub mod mock;
pub mod stdio;

use std::io::{self, Write};
use std::time::Duration;

#[cfg(test)]
pub use mock::MockTerminal;
pub use stdio::StdioTerminal;

/// Geometry of one terminal axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMetrics {
    /// Extent in cells
    pub cells: u32,
    /// Extent in pixels
    pub px: u32,
    /// Pixels per cell, at least 1
    pub cell_px: u32,
}

/// Terminal size in cells and pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub columns: u16,
    pub rows: u16,
    pub px_width: u32,
    pub px_height: u32,
}

impl Metrics {
    pub fn new(columns: u16, rows: u16, px_width: u32, px_height: u32) -> Self {
        Metrics {
            columns,
            rows,
            px_width,
            px_height,
        }
    }

    /// Metrics for a terminal whose pixel size is unknown, from a guessed
    /// cell size
    pub fn with_cell_size(columns: u16, rows: u16, cell_width: u32, cell_height: u32) -> Self {
        Metrics::new(
            columns,
            rows,
            columns as u32 * cell_width,
            rows as u32 * cell_height,
        )
    }

    pub fn cell_px_width(&self) -> u32 {
        (self.px_width / (self.columns.max(1) as u32)).max(1)
    }

    pub fn cell_px_height(&self) -> u32 {
        (self.px_height / (self.rows.max(1) as u32)).max(1)
    }

    pub fn horizontal(&self) -> AxisMetrics {
        AxisMetrics {
            cells: self.columns as u32,
            px: self.px_width,
            cell_px: self.cell_px_width(),
        }
    }

    pub fn vertical(&self) -> AxisMetrics {
        AxisMetrics {
            cells: self.rows as u32,
            px: self.px_height,
            cell_px: self.cell_px_height(),
        }
    }
}

/// Output sink plus the few queries graphics rendering needs
///
/// Writes go to the terminal's output stream; answers to graphics queries
/// are read back one byte at a time.
pub trait Terminal: Write {
    /// Current size of the terminal
    fn metrics(&mut self) -> io::Result<Metrics>;

    /// Zero based column of the cursor
    fn cursor_column(&mut self) -> io::Result<u16>;

    /// Switch input to unbuffered, unechoed mode (or back)
    fn set_raw_input(&mut self, enabled: bool) -> io::Result<()>;

    /// Read one byte of terminal input, waiting at most `timeout`
    ///
    /// `Ok(None)` means nothing arrived in time. An `Interrupted` error may
    /// be retried.
    fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_size_from_pixels() {
        let metrics = Metrics::new(80, 24, 640, 384);
        assert_eq!(metrics.cell_px_width(), 8);
        assert_eq!(metrics.cell_px_height(), 16);
        assert_eq!(metrics.horizontal().cells, 80);
        assert_eq!(metrics.vertical().px, 384);
    }

    #[test]
    fn test_cell_size_never_zero() {
        let metrics = Metrics::new(0, 0, 0, 0);
        assert_eq!(metrics.cell_px_width(), 1);
        assert_eq!(metrics.cell_px_height(), 1);
    }

    #[test]
    fn test_guessed_cell_size() {
        let metrics = Metrics::with_cell_size(100, 30, 10, 20);
        assert_eq!(metrics.px_width, 1000);
        assert_eq!(metrics.px_height, 600);
    }
}
