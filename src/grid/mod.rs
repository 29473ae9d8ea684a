//! Grid layout: streams images and text into terminal cells, row by row.

mod render;
pub mod text;

use std::fmt;
use std::rc::Rc;

pub use text::TextOverflow;

use crate::error::{ErrorPolicy, Result};
use crate::image::{Image, Resample};
use crate::models::{Axis, Column, Row};
use crate::protocol::Session;
use crate::terminal::{Metrics, Terminal};

/// One item to place in a grid cell
pub enum Content {
    Empty,
    Text(String),
    Image(Rc<Image>),
    /// Produced from the grid when its cell comes up
    Deferred(Box<dyn FnOnce(&Grid) -> Content>),
}

impl Content {
    pub fn deferred<F>(produce: F) -> Self
    where
        F: FnOnce(&Grid) -> Content + 'static,
    {
        Content::Deferred(Box::new(produce))
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Empty => f.write_str("Empty"),
            Content::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Content::Image(image) => f.debug_tuple("Image").field(&image.id()).finish(),
            Content::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Rc<Image>> for Content {
    fn from(image: Rc<Image>) -> Self {
        Content::Image(image)
    }
}

impl<T: Into<Content>> From<Option<T>> for Content {
    fn from(content: Option<T>) -> Self {
        content.map_or(Content::Empty, Into::into)
    }
}

/// What a `Grid::show` call got through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridReport {
    /// Items drawn, empty ones included
    pub rendered: usize,
    /// Rows completed
    pub rows: usize,
    /// Items were left over when the row limit was reached
    pub truncated: bool,
}

/// Layout of cells across the terminal
///
/// Column widths come from `cols` and row heights from `rows`; as many
/// columns as fit in the terminal make up a row unless `max_cols` says
/// otherwise.
#[derive(Debug, Clone)]
pub struct Grid {
    pub cols: Axis<Column>,
    pub rows: Axis<Row>,
    pub max_cols: Option<usize>,
    pub max_rows: Option<usize>,
    /// Round the row capacity down to an even count (at least 2). Checked
    /// before `force_odd`.
    pub force_even: bool,
    pub force_odd: bool,
    pub text_overflow: TextOverflow,
    pub cut_placeholder: String,
    pub resample: Resample,
    pub raise_errors: bool,
    pub print_errors: bool,
}

impl Default for Grid {
    fn default() -> Self {
        Grid {
            cols: Axis::new([Column::default()]),
            rows: Axis::new([Row::default()]),
            max_cols: None,
            max_rows: None,
            force_even: false,
            force_odd: false,
            text_overflow: TextOverflow::default(),
            cut_placeholder: " …".to_string(),
            resample: Resample::default(),
            raise_errors: false,
            print_errors: true,
        }
    }
}

impl Grid {
    pub fn new(cols: Axis<Column>, rows: Axis<Row>) -> Self {
        Grid {
            cols,
            rows,
            ..Grid::default()
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        ErrorPolicy {
            raise: self.raise_errors,
            print: self.print_errors,
        }
    }

    /// Number of cells per row
    pub fn row_capacity(&self, metrics: &Metrics) -> usize {
        let fitted = match self.max_cols.filter(|&max| max > 0) {
            Some(max) => max,
            None => {
                let axis = metrics.horizontal();
                let limit = axis.cells as i64;
                let (mut at, mut count) = (0i64, 0usize);

                // One cell is kept free at the right edge
                loop {
                    let width = self.cols.at(count).size.cells(axis).max(1);
                    if at + width + 1 > limit {
                        break;
                    }
                    at += width;
                    count += 1;
                }
                count
            }
        };

        if self.force_even {
            (fitted / 2 * 2).max(2)
        } else if self.force_odd {
            let odd = if fitted % 2 == 0 { fitted.saturating_sub(1) } else { fitted };
            odd.max(1)
        } else {
            fitted.max(1)
        }
    }

    /// Draw `contents` left to right, top to bottom
    ///
    /// Content that cannot be loaded is handled by the grid's error policy.
    /// Protocol errors always abort. Once more than `max_rows` rows are
    /// complete the remaining items are dropped.
    pub fn show<T, I>(&self, session: &mut Session<T>, contents: I) -> Result<GridReport>
    where
        T: Terminal,
        I: IntoIterator,
        I::Item: Into<Content>,
    {
        let metrics = session.metrics()?;
        let capacity = self.row_capacity(&metrics);
        let (horizontal, vertical) = (metrics.horizontal(), metrics.vertical());
        log::debug!("Grid of {} cells per row on {:?}", capacity, metrics);

        let mut report = GridReport::default();
        let (mut col, mut row) = (0usize, 0usize);
        let mut items = contents.into_iter().peekable();

        while let Some(content) = items.next() {
            let column = self.cols.at(col);
            let line = self.rows.at(row);
            let restore = session.cursor_column()?;

            let resolved = self.resolve_content(content.into(), column, line, &metrics)?;
            self.render_cell(session, &resolved, column, line, &metrics)?;

            // Back to the top of the row, then on to the next cell
            session.move_up(cells_u32(line.size.cells(vertical)))?;
            session.move_to_column(restore)?;
            session.move_right(cells_u32(column.size.cells(horizontal)))?;

            report.rendered += 1;
            col += 1;

            if col >= capacity {
                session.newlines(cells_u32(line.size.cells(vertical)))?;
                col = 0;
                row += 1;
                report.rows += 1;

                if self.max_rows.is_some_and(|max| max > 0 && row > max) {
                    report.truncated = items.peek().is_some();
                    if report.truncated {
                        log::info!("Row limit reached after {} items", report.rendered);
                    }
                    break;
                }
            }
        }

        session.newlines(cells_u32(self.rows.at(row).size.cells(vertical)))?;
        Ok(report)
    }
}

fn cells_u32(cells: i64) -> u32 {
    cells.clamp(0, u32::MAX as i64) as u32
}
