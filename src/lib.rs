//! pixgrid - images and text in terminal grids over the kitty graphics protocol
//!
//! This library exports the core modules for testing and reuse.

pub mod app;
pub mod error;
pub mod grid;
pub mod image;
pub mod logging;
pub mod models;
pub mod protocol;
pub mod storage;
pub mod terminal;

pub use error::{Error, ErrorPolicy, ProtocolError, ResizeError, Result};
pub use grid::{Content, Grid, GridReport};
pub use crate::image::{Image, ImageLoader, Placement, ResizeRequest};
pub use models::{Align, Axis, Column, Row, Size};
pub use protocol::Session;
