use anyhow::{Context, Result};
use std::io::{self, BufRead, BufReader};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{ErrorPolicy, ResizeError};
use crate::grid::text::align_text;
use crate::grid::{Content, Grid, GridReport};
use crate::image::{IdAllocator, Image, ImageLoader, Placement, Resample, ResizeRequest};
use crate::models::{Axis, Column, Row, Size};
use crate::protocol::Session;
use crate::storage::Config;
use crate::terminal::{Metrics, Terminal};

/// Scaling applied to each image before it is shown
#[derive(Debug, Clone, Default)]
pub enum Transform {
    /// Show at the original size
    #[default]
    None,
    Resize(ResizeRequest),
    Thumbnail {
        size: Size,
        stretch: bool,
        resample: Resample,
    },
    FitScreen {
        horizontal_margin: Size,
        vertical_margin: Size,
        enlarge: bool,
        request: ResizeRequest,
    },
}

impl Transform {
    pub fn apply(&self, image: &Rc<Image>, metrics: &Metrics) -> Result<Rc<Image>, ResizeError> {
        match self {
            Transform::None => Ok(Rc::clone(image)),
            Transform::Resize(request) => image.resize(request, metrics),
            Transform::Thumbnail {
                size,
                stretch,
                resample,
            } => image.thumbnail(*size, *stretch, *resample, metrics),
            Transform::FitScreen {
                horizontal_margin,
                vertical_margin,
                enlarge,
                request,
            } => image.fit_screen(
                *horizontal_margin,
                *vertical_margin,
                *enlarge,
                *request,
                metrics,
            ),
        }
    }
}

/// How each image of a `display` run is presented
#[derive(Debug, Clone, Default)]
pub struct DisplayOptions {
    pub placement: Placement,
    pub print_origin: bool,
    pub print_name: bool,
    pub print_id: bool,
    /// Wait for enter after every image
    pub hang: bool,
    /// Wait for enter once everything is drawn
    pub hang_final: bool,
}

/// Runs the command line operations against one terminal session
pub struct App<T: Terminal> {
    session: Session<T>,
    loader: ImageLoader,
    config: Config,
    policy: ErrorPolicy,
    input: Box<dyn BufRead>,
}

impl<T: Terminal> App<T> {
    pub fn new(term: T, config: Config) -> Self {
        let ids = IdAllocator::new(config.protocol.min_id..=config.protocol.max_id);
        let policy = ErrorPolicy {
            raise: config.general.raise_errors,
            print: config.general.print_errors,
        };

        App {
            session: Session::from_config(term, &config.protocol),
            loader: ImageLoader::new(Arc::new(ids)),
            config,
            policy,
            input: Box::new(BufReader::new(io::stdin())),
        }
    }

    /// Read keypresses for `hang` from `input` instead of stdin
    pub fn with_input(mut self, input: impl BufRead + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ErrorPolicy) {
        self.policy = policy;
    }

    /// Whether the terminal answers graphics queries
    pub fn detect(&mut self) -> Result<bool> {
        let supported = self
            .session
            .detect_support()
            .context("Failed to query the terminal")?;
        log::info!("Graphics protocol supported: {}", supported);
        Ok(supported)
    }

    /// Show every image found at `locations`, one after the other
    ///
    /// Returns how many images were drawn.
    pub fn display(
        &mut self,
        locations: &[String],
        transform: &Transform,
        options: &DisplayOptions,
    ) -> Result<usize> {
        let images = self.loader.discover(locations, self.policy)?;
        let metrics = self.session.metrics().context("Failed to read terminal size")?;
        let mut shown = 0;

        for image in images {
            let scaled = match transform.apply(&image, &metrics) {
                Ok(scaled) => scaled,
                Err(err) => {
                    self.policy.recover(err)?;
                    continue;
                }
            };

            self.print_labels(&image, &scaled, options, metrics.columns)?;
            scaled
                .show(&mut self.session, &options.placement)
                .with_context(|| format!("Failed to show {}", image.origin()))?;
            shown += 1;

            if options.hang {
                self.wait(None)?;
            }
        }

        if options.hang_final {
            self.wait(Some("Press enter to exit..."))?;
        }
        Ok(shown)
    }

    /// Names, origins and ids are taken from the source image, the id
    /// from what is actually drawn
    fn print_labels(
        &mut self,
        source: &Image,
        shown: &Image,
        options: &DisplayOptions,
        columns: u16,
    ) -> Result<()> {
        let mut labels = Vec::new();
        if options.print_name {
            labels.push(source.name().unwrap_or_else(|| "-".to_string()));
        }
        if options.print_origin {
            labels.push(source.origin().to_string());
        }
        if options.print_id {
            labels.push(shown.id().to_string());
        }

        for label in labels {
            let line = align_text(&label, columns as usize, options.placement.align);
            self.session.write_text(&format!("{}\n", line))?;
        }
        Ok(())
    }

    /// Lay out `items` with `grid`
    pub fn grid<I>(&mut self, grid: &Grid, items: I, hang_final: bool) -> Result<GridReport>
    where
        I: IntoIterator,
        I::Item: Into<Content>,
    {
        let report = grid.show(&mut self.session, items).context("Failed to draw grid")?;
        log::info!(
            "Grid drew {} items over {} rows{}",
            report.rendered,
            report.rows,
            if report.truncated { ", truncated" } else { "" }
        );

        if hang_final {
            self.wait(Some("Press enter to exit..."))?;
        }
        Ok(report)
    }

    /// Lay out every image found at `locations`
    pub fn grid_images(&mut self, grid: &Grid, locations: &[String], hang_final: bool) -> Result<GridReport> {
        let images = self.loader.discover(locations, self.policy)?;
        self.grid(grid, images, hang_final)
    }

    /// Delete displayed images by id
    pub fn hide(&mut self, ids: &[u32]) -> Result<()> {
        for &id in ids {
            self.session
                .delete(id)
                .with_context(|| format!("Failed to delete image {}", id))?;
        }
        Ok(())
    }

    /// Grid with the configured cell sizes and text handling
    pub fn grid_from_config(&self) -> Grid {
        let settings = &self.config.grid;
        let mut cols = Axis::new([Column::aligned(settings.column_width, settings.align)]);
        let mut rows = Axis::new([Row::new(settings.row_height)]);
        cols.wrap_around = settings.wrap_around;
        rows.wrap_around = settings.wrap_around;

        Grid {
            text_overflow: settings.text_overflow,
            cut_placeholder: settings.cut_placeholder.clone(),
            resample: self.config.resize.resample,
            raise_errors: self.policy.raise,
            print_errors: self.policy.print,
            ..Grid::new(cols, rows)
        }
    }

    /// Block until a line is entered
    fn wait(&mut self, prompt: Option<&str>) -> Result<()> {
        if let Some(prompt) = prompt {
            self.session.write_text(prompt)?;
        }
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::tests::png_bytes;
    use crate::models::Align;
    use crate::protocol::Medium;
    use crate::terminal::MockTerminal;
    use std::fs;
    use std::io::Cursor;

    const OK: &str = "\x1b_Gi=1;OK\x1b\\";

    fn config() -> Config {
        let mut config = Config::default();
        config.protocol.timeout_ms = 20;
        config.protocol.medium = Medium::Direct;
        config.general.print_errors = false;
        config
    }

    fn app() -> App<MockTerminal> {
        App::new(MockTerminal::new(), config()).with_input(Cursor::new("\n\n\n"))
    }

    fn image_dir(names: &[&str]) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), png_bytes(40, 20)).unwrap();
        }
        let location = dir.path().to_string_lossy().into_owned();
        (dir, location)
    }

    #[test]
    fn test_display_prints_labels_before_image() {
        let (_dir, location) = image_dir(&["cat.png"]);
        let mut app = app();
        app.session_mut().terminal_mut().answer(OK);

        let options = DisplayOptions {
            print_name: true,
            print_id: true,
            ..DisplayOptions::default()
        };
        let shown = app.display(&[location], &Transform::None, &options).unwrap();
        assert_eq!(shown, 1);

        let output = app.session().terminal().output_str();
        let name_at = output.find("cat.png").unwrap();
        let image_at = output.find("a=T").unwrap();
        assert!(name_at < image_at);
        // Centered across 80 columns
        assert!(output.starts_with(&format!("{}cat.png\n", " ".repeat(36))));
    }

    #[test]
    fn test_display_applies_transform() {
        let (_dir, location) = image_dir(&["wide.png"]);
        let mut app = app();
        app.session_mut().terminal_mut().answer(OK);

        let transform = Transform::Resize(ResizeRequest::within(Size::Px(20), Size::Px(20)));
        let options = DisplayOptions {
            print_id: true,
            ..DisplayOptions::default()
        };
        app.display(&[location], &transform, &options).unwrap();

        let output = app.session().terminal().output_str();
        let printed_id = output.lines().next().unwrap().trim();
        assert!(output.contains(&format!("i={}", printed_id)));
        assert_eq!(app.loader().ids().in_use(), 2);
    }

    #[test]
    fn test_hang_final_prompts() {
        let (_dir, location) = image_dir(&["a.png"]);
        let mut app = app();
        app.session_mut().terminal_mut().answer(OK);

        let options = DisplayOptions {
            hang: true,
            hang_final: true,
            ..DisplayOptions::default()
        };
        app.display(&[location], &Transform::None, &options).unwrap();
        assert!(app.session().terminal().output_str().ends_with("Press enter to exit..."));
    }

    #[test]
    fn test_display_raises_on_missing_answer() {
        let (_dir, location) = image_dir(&["a.png"]);
        let mut app = app();
        assert!(app.display(&[location], &Transform::None, &DisplayOptions::default()).is_err());
    }

    #[test]
    fn test_hide_sends_deletes() {
        let mut app = app();
        app.hide(&[7, 9]).unwrap();
        assert_eq!(
            app.session().terminal().output_str(),
            "\x1b_Ga=d,d=I,i=7,X=1;\x1b\\\x1b_Ga=d,d=I,i=9,X=1;\x1b\\"
        );
    }

    #[test]
    fn test_detect() {
        let mut app = app();
        app.session_mut().terminal_mut().answer(OK);
        assert!(app.detect().unwrap());
        assert!(!app.detect().unwrap());
    }

    #[test]
    fn test_grid_from_config() {
        let mut config = config();
        config.grid.column_width = Size::Cells(12);
        config.grid.align = Align::Left;
        config.grid.wrap_around = true;
        config.general.raise_errors = true;

        let app = App::new(MockTerminal::new(), config);
        let grid = app.grid_from_config();
        assert_eq!(grid.cols.at(3), Column::aligned(Size::Cells(12), Align::Left));
        assert!(grid.cols.wrap_around);
        assert!(grid.raise_errors);
        assert!(!grid.print_errors);
    }

    #[test]
    fn test_grid_of_text_items() {
        let mut app = app();
        let mut grid = app.grid_from_config();
        grid.max_cols = Some(2);

        let report = app.grid(&grid, ["one", "two", "three"], false).unwrap();
        assert_eq!(report.rendered, 3);
        assert_eq!(report.rows, 1);
    }
}
