use image::ImageFormat;
use std::env;
use std::fs;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use super::Image;
use crate::error::{Error, Result};
use crate::models::{Align, Size};
use crate::protocol::{Action, Command, Control, Format, Medium, Session};
use crate::terminal::Terminal;

/// Name prefix the terminal requires before deleting a temporary file
const TEMPFILE_PREFIX: &str = "tty-graphics-protocol-";

/// Where and how to draw an image relative to the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Column from the terminal's left edge
    pub x: Option<Size>,
    /// Row from the terminal's top
    pub y: Option<Size>,
    /// Negative values draw behind text
    pub z: i32,
    pub relative_x: Size,
    pub relative_y: Size,
    /// Horizontal alignment across the terminal, when `x` is unset
    pub align: Align,
    pub crop_w: Size,
    pub crop_h: Size,
}

impl Default for Placement {
    fn default() -> Self {
        Placement {
            x: None,
            y: None,
            z: -1,
            relative_x: Size::ZERO,
            relative_y: Size::ZERO,
            align: Align::Center,
            crop_w: Size::ZERO,
            crop_h: Size::ZERO,
        }
    }
}

impl Placement {
    /// At the cursor, shifted right by `columns` cells
    pub fn at_cursor(columns: u32) -> Self {
        Placement {
            align: Align::Left,
            relative_x: Size::Cells(columns.min(i32::MAX as u32) as i32),
            ..Placement::default()
        }
    }
}

fn px_u32(px: i64) -> u32 {
    px.clamp(0, u32::MAX as i64) as u32
}

impl Image {
    /// Transmit and display the image
    ///
    /// The cursor ends at the start of the line below the image.
    pub fn show<T: Terminal>(&self, session: &mut Session<T>, placement: &Placement) -> Result<()> {
        let metrics = session.metrics()?;
        let (horizontal, vertical) = (metrics.horizontal(), metrics.vertical());
        let (cell_w, cell_h) = (horizontal.cell_px as i64, vertical.cell_px as i64);

        let mut offset_y = 0i64;
        let mut relative_x = placement.relative_x.px(horizontal);

        let offset_x = if let Some(x) = placement.x {
            let px = x.px(horizontal).max(0);
            session.move_to_column(clamp_u16(px.div_euclid(cell_w)))?;
            px.rem_euclid(cell_w)
        } else {
            let free = metrics.px_width as i64 - self.width() as i64;
            let shift = match placement.align {
                Align::Left => 0,
                Align::Center => free.div_euclid(2),
                Align::Right => free,
            };
            relative_x += shift.div_euclid(cell_w) * cell_w;
            shift.rem_euclid(cell_w)
        };

        if let Some(y) = placement.y {
            let px = y.px(vertical).max(0);
            session.move_to_row(clamp_u16(px.div_euclid(cell_h)))?;
            offset_y = px.rem_euclid(cell_h);
        }

        session.move_relative_x(relative_x.div_euclid(cell_w))?;
        session.move_relative_y(placement.relative_y.px(vertical).div_euclid(cell_h))?;

        let (medium, payload) = self.payload(session.medium)?;
        let command = Command::new()
            .with(Control::OffsetX(px_u32(offset_x)))
            .with(Control::OffsetY(px_u32(offset_y)))
            .with(Control::CropW(px_u32(placement.crop_w.px(horizontal))))
            .with(Control::CropH(px_u32(placement.crop_h.px(vertical))))
            .with(Control::ZIndex(placement.z))
            .with(Control::Action(Action::TransmitDisplay))
            .with(Control::Medium(medium))
            .with(Control::Format(Format::Png))
            .with(Control::Id(self.id()))
            .with_payload(payload);

        log::debug!("Showing image {} via {:?}", self.id(), medium);
        session.run(&command)?;
        session.newlines(1)?;
        Ok(())
    }

    /// PNG data for `medium`, or the path of a file holding it
    fn payload(&self, medium: Medium) -> Result<(Medium, Vec<u8>)> {
        match medium {
            Medium::Direct => Ok((Medium::Direct, self.png_bytes()?)),
            Medium::File => match self.png_path() {
                Some(path) => Ok((Medium::File, path.as_os_str().as_encoded_bytes().to_vec())),
                None => self.payload(Medium::TempFile),
            },
            Medium::TempFile | Medium::SharedMemory => {
                let path = self.write_tempfile(&env::temp_dir())?;
                Ok((Medium::TempFile, path.as_os_str().as_encoded_bytes().to_vec()))
            }
        }
    }

    /// Write the PNG data to a new file in `dir` that the terminal deletes
    /// once read. Nothing is left behind when writing fails.
    fn write_tempfile(&self, dir: &Path) -> Result<PathBuf> {
        let mut file = tempfile::Builder::new()
            .prefix(TEMPFILE_PREFIX)
            .suffix(".png")
            .tempfile_in(dir)?;

        if let Some(source) = self.png_path() {
            fs::copy(source, file.path())?;
        } else {
            let mut writer = BufWriter::new(file.as_file_mut());
            self.load()?
                .write_to(&mut writer, ImageFormat::Png)
                .map_err(Error::Encode)?;
            writer.flush()?;
        }

        let (_, path) = file.keep().map_err(|err| Error::Io(err.error))?;
        Ok(path)
    }

    fn png_bytes(&self) -> Result<Vec<u8>> {
        if let Some(path) = self.png_path() {
            return Ok(fs::read(path)?);
        }

        let mut out = Cursor::new(Vec::new());
        self.load()?
            .write_to(&mut out, ImageFormat::Png)
            .map_err(Error::Encode)?;
        Ok(out.into_inner())
    }

    /// Remove the image from the terminal, with its resized copies when
    /// `resized_too`
    pub fn hide<T: Terminal>(&self, session: &mut Session<T>, resized_too: bool) -> Result<()> {
        session.delete(self.id())?;
        if resized_too {
            for id in self.resized_ids() {
                session.delete(id)?;
            }
        }
        Ok(())
    }
}

fn clamp_u16(value: i64) -> u16 {
    value.clamp(0, u16::MAX as i64) as u16
}
