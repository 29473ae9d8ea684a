pub mod axis;
pub mod cell;
pub mod size;

pub use axis::{Axis, AxisEntry};
pub use cell::{Align, Column, Row};
pub use size::Size;
