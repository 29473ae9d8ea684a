use std::rc::Rc;

use super::text::{display_width, fit_text};
use super::{Content, Grid};
use crate::error::{ResizeError, Result};
use crate::image::{Image, Placement, ResizeRequest};
use crate::models::{Column, Row, Size};
use crate::protocol::Session;
use crate::terminal::{Metrics, Terminal};

/// Cell content ready to draw
#[derive(Debug)]
pub(super) enum Resolved {
    Empty,
    Text(Vec<String>),
    Image(Rc<Image>),
}

impl Resolved {
    fn height(&self) -> Size {
        match self {
            Resolved::Empty => Size::ZERO,
            Resolved::Text(lines) => Size::Cells(lines.len().min(i32::MAX as usize) as i32),
            Resolved::Image(image) => image.height_size(),
        }
    }
}

impl Grid {
    pub(super) fn resolve_content(
        &self,
        content: Content,
        column: Column,
        row: Row,
        metrics: &Metrics,
    ) -> Result<Resolved> {
        match content {
            Content::Empty => Ok(Resolved::Empty),
            Content::Deferred(produce) => self.resolve_content(produce(self), column, row, metrics),
            Content::Text(text) if text.is_empty() => Ok(Resolved::Empty),
            Content::Text(text) => {
                let width = column.size.cells(metrics.horizontal()).max(0) as usize;
                let height = row.size.cells(metrics.vertical()).max(0) as usize;
                let lines = fit_text(&text, width, height, self.text_overflow, &self.cut_placeholder);
                Ok(if lines.is_empty() {
                    Resolved::Empty
                } else {
                    Resolved::Text(lines)
                })
            }
            Content::Image(image) => match self.fit_image(&image, column, row, metrics) {
                Ok(fitted) => Ok(Resolved::Image(fitted)),
                Err(err) => {
                    self.policy().recover(err)?;
                    Ok(Resolved::Empty)
                }
            },
        }
    }

    /// Shrink or grow `image` into the cell, decoding it so a broken file
    /// fails here rather than while drawing
    fn fit_image(&self, image: &Rc<Image>, column: Column, row: Row, metrics: &Metrics) -> Result<Rc<Image>, ResizeError> {
        let request = ResizeRequest::within(
            Size::Px(column.size.px(metrics.horizontal()).clamp(0, i32::MAX as i64) as i32),
            Size::Px(row.size.px(metrics.vertical()).clamp(0, i32::MAX as i64) as i32),
        )
        .resample(self.resample);

        let fitted = image.resize(&request, metrics)?;
        fitted.load()?;
        Ok(fitted)
    }

    /// Draw one cell starting at the cursor; the cursor ends on the line
    /// below the cell's last row
    pub(super) fn render_cell<T: Terminal>(
        &self,
        session: &mut Session<T>,
        content: &Resolved,
        column: Column,
        row: Row,
        metrics: &Metrics,
    ) -> Result<()> {
        let (horizontal, vertical) = (metrics.horizontal(), metrics.vertical());
        let inner_y = row.align.offset(row.size, content.height(), vertical);
        let restore = session.cursor_column()?;

        session.newlines(inner_y)?;
        session.move_to_column(restore)?;

        match content {
            Resolved::Empty => {}
            Resolved::Image(image) => {
                let inner_x = column.align.offset(column.size, image.width_size(), horizontal);
                let placement = Placement {
                    z: session.z_index,
                    ..Placement::at_cursor(inner_x)
                };
                image.show(session, &placement)?;
            }
            Resolved::Text(lines) => {
                for line in lines {
                    let width = Size::Cells(display_width(line).min(i32::MAX as usize) as i32);
                    let inner_x = column.align.offset(column.size, width, horizontal);
                    session.write_text(&format!("{}{}\n", " ".repeat(inner_x as usize), line))?;
                    session.move_to_column(restore)?;
                }
            }
        }

        // Fill the rest of the cell so the cursor sits at its bottom
        let filled = content.height().cells(vertical).max(0) + inner_y as i64;
        let rest = (row.size.cells(vertical) - filled).clamp(0, u32::MAX as i64);
        session.newlines(rest as u32)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TextOverflow;
    use crate::image::tests::{bitmap, ids};
    use crate::models::{Align, Axis};
    use crate::terminal::MockTerminal;

    fn metrics() -> Metrics {
        Metrics::new(80, 24, 800, 480)
    }

    #[test]
    fn test_text_is_fitted_to_cell() {
        let mut grid = Grid::default();
        grid.text_overflow = TextOverflow::Shorten;
        let column = Column::new(Size::Cells(8));
        let row = Row::new(Size::Cells(1));

        let resolved = grid
            .resolve_content("first line here\nsecond".into(), column, row, &metrics())
            .unwrap();
        match resolved {
            Resolved::Text(lines) => assert_eq!(lines, vec!["first …"]),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_image_resolves_to_cell_size() {
        let grid = Grid::default();
        let image = Image::from_bitmap(bitmap(40, 400), ids()).unwrap();
        let column = Column::new(Size::Cells(10));
        let row = Row::new(Size::Cells(5));

        match grid.resolve_content(Content::Image(image), column, row, &metrics()).unwrap() {
            Resolved::Image(fitted) => {
                assert_eq!((fitted.width(), fitted.height()), (10, 100));
            }
            other => panic!("expected an image, got {:?}", other),
        }
    }

    #[test]
    fn test_right_aligned_text() {
        let grid = Grid::new(
            Axis::new([Column::aligned(Size::Cells(6), Align::Right)]),
            Axis::new([Row::aligned(Size::Cells(2), Align::Left)]),
        );
        let mut session = Session::new(MockTerminal::new(), Default::default());
        let content = Resolved::Text(vec!["ab".to_string()]);

        grid.render_cell(&mut session, &content, grid.cols.at(0), grid.rows.at(0), &metrics())
            .unwrap();
        assert_eq!(session.terminal().output_str(), "\x1b[1G    ab\n\x1b[1G\n");
    }
}
