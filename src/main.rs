use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use pixgrid::app::{App, DisplayOptions, Transform};
use pixgrid::error::ErrorPolicy;
use pixgrid::grid::{Content, Grid, TextOverflow};
use pixgrid::image::{Placement, Resample, ResizeRequest};
use pixgrid::logging::init_logger;
use pixgrid::models::{Align, Axis, Column, Row, Size};
use pixgrid::storage::{default_config_path, default_log_path, Config, ConfigStorage, TomlConfigStorage};
use pixgrid::terminal::StdioTerminal;

#[derive(Parser)]
#[command(name = "pixgrid", version)]
#[command(about = "Display images and text grids in kitty graphics terminals", long_about = None)]
#[command(after_help = "Sizes are pixels (\"12\") or terminal cells (\"12t\").")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/pixgrid/pixgrid.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep quiet about images that cannot be loaded
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Stop at the first image that cannot be loaded
    #[arg(short = 'R', long, global = true)]
    raise_errors: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exit with 0 if the terminal supports images, else 1
    Detect,

    /// Display images without resizing
    Show {
        #[command(flatten)]
        display: DisplayArgs,

        /// Files, folders (scanned recursively) or URLs
        #[arg(required = true)]
        locations: Vec<String>,
    },

    /// Upscale or downscale images into bounds
    #[command(visible_alias = "r")]
    Resize {
        /// Upscale when narrower
        #[arg(short = 'w', long, allow_hyphen_values = true)]
        min_width: Option<Size>,

        /// Upscale when shorter
        #[arg(long, allow_hyphen_values = true)]
        min_height: Option<Size>,

        /// Downscale when wider
        #[arg(short = 'W', long, allow_hyphen_values = true)]
        max_width: Option<Size>,

        /// Downscale when taller
        #[arg(short = 'H', long, allow_hyphen_values = true)]
        max_height: Option<Size>,

        #[command(flatten)]
        scaling: ScaleArgs,

        #[command(flatten)]
        display: DisplayArgs,

        #[arg(required = true)]
        locations: Vec<String>,
    },

    /// Scale images to fit a square
    #[command(visible_alias = "t")]
    Thumbnail {
        /// Side of the square
        #[arg(short, long, default_value = "256")]
        size: Size,

        #[command(flatten)]
        scaling: ScaleArgs,

        #[command(flatten)]
        display: DisplayArgs,

        #[arg(required = true)]
        locations: Vec<String>,
    },

    /// Scale images down to the terminal size
    #[command(visible_alias = "f")]
    FitScreen {
        /// Also scale up images smaller than the terminal
        #[arg(short, long)]
        enlarge: bool,

        /// Left and right padding
        #[arg(short = 'o', long, default_value = "0")]
        horizontal_margin: Size,

        /// Top and bottom padding
        #[arg(short = 'v', long, default_value = "0")]
        vertical_margin: Size,

        #[command(flatten)]
        scaling: ScaleArgs,

        #[command(flatten)]
        display: DisplayArgs,

        #[arg(required = true)]
        locations: Vec<String>,
    },

    /// Lay out images or text in a grid
    #[command(visible_alias = "g")]
    Grid(GridArgs),

    /// Delete displayed images
    Hide {
        #[arg(required = true)]
        ids: Vec<u32>,
    },
}

#[derive(Args)]
struct ScaleArgs {
    /// Ignore the aspect ratio
    #[arg(short = 'S', long)]
    stretch: bool,

    /// nearest, bilinear, bicubic or lanczos
    #[arg(short, long)]
    resample: Option<Resample>,
}

#[derive(Args)]
struct DisplayArgs {
    /// Left image origin, from the terminal's left
    #[arg(short = 'x', long = "absolute-x")]
    absolute_x: Option<Size>,

    /// Top image origin, from the terminal's top
    #[arg(short = 'y', long = "absolute-y")]
    absolute_y: Option<Size>,

    /// Stacking order, -1 and lower draw behind text
    #[arg(short, long, allow_hyphen_values = true)]
    z_index: Option<i32>,

    /// Shift from the cursor, added to the alignment
    #[arg(short = 'X', long, allow_hyphen_values = true, default_value = "0")]
    relative_x: Size,

    #[arg(short = 'Y', long, allow_hyphen_values = true, default_value = "0")]
    relative_y: Size,

    /// left, center or right
    #[arg(short, long, default_value = "center")]
    align: Align,

    /// Crop width
    #[arg(short = 'c', long, default_value = "0")]
    crop_w: Size,

    /// Crop height
    #[arg(short = 'C', long, default_value = "0")]
    crop_h: Size,

    /// Print the path or URL above each image
    #[arg(short = 'O', long)]
    print_origin: bool,

    /// Print the file name above each image
    #[arg(short = 'n', long)]
    print_name: bool,

    /// Print the image id above each image
    #[arg(short = 'i', long)]
    print_id: bool,

    /// Wait for enter between images
    #[arg(short = 'g', long)]
    hang: bool,

    /// Wait for enter once everything is drawn
    #[arg(short = 'G', long)]
    hang_final: bool,
}

impl DisplayArgs {
    fn options(&self, config: &Config) -> DisplayOptions {
        DisplayOptions {
            placement: Placement {
                x: self.absolute_x,
                y: self.absolute_y,
                z: self.z_index.unwrap_or(config.protocol.z_index),
                relative_x: self.relative_x,
                relative_y: self.relative_y,
                align: self.align,
                crop_w: self.crop_w,
                crop_h: self.crop_h,
            },
            print_origin: self.print_origin,
            print_name: self.print_name,
            print_id: self.print_id,
            hang: self.hang,
            hang_final: self.hang_final,
        }
    }
}

#[derive(Args)]
struct GridArgs {
    /// Column widths, the last one repeats
    #[arg(long, value_delimiter = ',')]
    cols: Vec<Size>,

    /// Row heights, the last one repeats
    #[arg(long, value_delimiter = ',')]
    rows: Vec<Size>,

    /// Horizontal alignment inside cells
    #[arg(long)]
    align: Option<Align>,

    /// Vertical alignment inside cells
    #[arg(long, default_value = "center")]
    valign: Align,

    #[arg(long)]
    max_cols: Option<usize>,

    /// Stop after this many rows
    #[arg(long)]
    max_rows: Option<usize>,

    /// Cycle through --cols and --rows instead of repeating the last
    #[arg(long)]
    wrap_around: bool,

    #[arg(long)]
    force_even: bool,

    #[arg(long)]
    force_odd: bool,

    /// wrap or shorten
    #[arg(long)]
    overflow: Option<TextOverflow>,

    /// Appended to shortened text
    #[arg(long)]
    placeholder: Option<String>,

    /// Treat items as text instead of image locations
    #[arg(long)]
    text: bool,

    #[arg(short = 'G', long)]
    hang_final: bool,

    #[arg(required = true)]
    items: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config)?;

    let terminal = StdioTerminal::new(
        config.protocol.fallback_cell_width,
        config.protocol.fallback_cell_height,
    );
    let mut app = App::new(terminal, config);
    let policy = app.policy();
    app.set_policy(ErrorPolicy {
        raise: policy.raise || cli.raise_errors,
        print: policy.print && !cli.quiet,
    });

    match cli.command {
        Commands::Detect => cmd_detect(&mut app),
        Commands::Show { display, locations } => {
            cmd_display(&mut app, &locations, Transform::None, &display)
        }
        Commands::Resize {
            min_width,
            min_height,
            max_width,
            max_height,
            scaling,
            display,
            locations,
        } => {
            let defaults = ResizeRequest::default();
            let request = ResizeRequest {
                min_w: min_width.unwrap_or(defaults.min_w),
                min_h: min_height.unwrap_or(defaults.min_h),
                max_w: max_width,
                max_h: max_height,
                ..scaled_request(&scaling, app.config())
            };
            cmd_display(&mut app, &locations, Transform::Resize(request), &display)
        }
        Commands::Thumbnail {
            size,
            scaling,
            display,
            locations,
        } => {
            let request = scaled_request(&scaling, app.config());
            let transform = Transform::Thumbnail {
                size,
                stretch: request.stretch,
                resample: request.resample,
            };
            cmd_display(&mut app, &locations, transform, &display)
        }
        Commands::FitScreen {
            enlarge,
            horizontal_margin,
            vertical_margin,
            scaling,
            display,
            locations,
        } => {
            let transform = Transform::FitScreen {
                horizontal_margin,
                vertical_margin,
                enlarge,
                request: scaled_request(&scaling, app.config()),
            };
            cmd_display(&mut app, &locations, transform, &display)
        }
        Commands::Grid(args) => cmd_grid(&mut app, args),
        Commands::Hide { ids } => app.hide(&ids),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    TomlConfigStorage::new(path).load()
}

fn init_logging(config: &Config) -> Result<()> {
    if config.general.log_to_file {
        let path = default_log_path()?;
        init_logger(path, &config.general.log_level, "warn").context("Failed to start file logging")
    } else {
        env_logger::init();
        Ok(())
    }
}

fn scaled_request(scaling: &ScaleArgs, config: &Config) -> ResizeRequest {
    ResizeRequest::default()
        .stretch(scaling.stretch || config.resize.stretch)
        .resample(scaling.resample.unwrap_or(config.resize.resample))
}

/// Exit with the detection result as status
fn cmd_detect(app: &mut App<StdioTerminal>) -> Result<()> {
    let supported = app.detect()?;
    std::process::exit(if supported { 0 } else { 1 });
}

fn cmd_display(
    app: &mut App<StdioTerminal>,
    locations: &[String],
    transform: Transform,
    display: &DisplayArgs,
) -> Result<()> {
    let options = display.options(app.config());
    let shown = app.display(locations, &transform, &options)?;
    log::info!("Displayed {} images", shown);
    Ok(())
}

fn cmd_grid(app: &mut App<StdioTerminal>, args: GridArgs) -> Result<()> {
    let mut grid = app.grid_from_config();
    let align = args.align.unwrap_or(app.config().grid.align);

    if !args.cols.is_empty() {
        grid.cols = Axis::new(args.cols.iter().map(|&size| Column::aligned(size, align)));
    } else if args.align.is_some() {
        let width = app.config().grid.column_width;
        grid.cols = Axis::new([Column::aligned(width, align)]);
    }

    let heights = if args.rows.is_empty() {
        vec![app.config().grid.row_height]
    } else {
        args.rows.clone()
    };
    grid.rows = Axis::new(heights.into_iter().map(|size| Row::aligned(size, args.valign)));

    apply_grid_args(&mut grid, &args);

    if args.text {
        let items = args.items.into_iter().map(Content::Text);
        app.grid(&grid, items, args.hang_final)?;
    } else {
        app.grid_images(&grid, &args.items, args.hang_final)?;
    }
    Ok(())
}

fn apply_grid_args(grid: &mut Grid, args: &GridArgs) {
    let wrap_around = args.wrap_around || grid.cols.wrap_around;
    grid.cols.wrap_around = wrap_around;
    grid.rows.wrap_around = wrap_around;
    grid.max_cols = args.max_cols;
    grid.max_rows = args.max_rows;
    grid.force_even = args.force_even;
    grid.force_odd = args.force_odd;

    if let Some(overflow) = args.overflow {
        grid.text_overflow = overflow;
    }
    if let Some(placeholder) = &args.placeholder {
        grid.cut_placeholder = placeholder.clone();
    }
}
