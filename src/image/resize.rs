use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use super::Image;
use crate::error::ResizeError;
use crate::models::Size;
use crate::terminal::{AxisMetrics, Metrics};

/// Scaling filter, fastest and roughest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resample {
    Nearest,
    Bilinear,
    Bicubic,
    #[default]
    Lanczos,
}

impl Resample {
    pub fn filter(self) -> FilterType {
        match self {
            Resample::Nearest => FilterType::Nearest,
            Resample::Bilinear => FilterType::Triangle,
            Resample::Bicubic => FilterType::CatmullRom,
            Resample::Lanczos => FilterType::Lanczos3,
        }
    }
}

impl FromStr for Resample {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(Resample::Nearest),
            "bilinear" => Ok(Resample::Bilinear),
            "bicubic" => Ok(Resample::Bicubic),
            "lanczos" => Ok(Resample::Lanczos),
            _ => Err(format!(
                "invalid resample filter '{}': use nearest, bilinear, bicubic or lanczos",
                s
            )),
        }
    }
}

/// Pixel bounds for a resize
///
/// Negative pixel counts and cell sizes are both measured in cells. A
/// missing or zero maximum is the image's own size on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeRequest {
    pub min_w: Size,
    pub min_h: Size,
    pub max_w: Option<Size>,
    pub max_h: Option<Size>,
    /// Hit the bounds exactly instead of keeping the aspect ratio
    pub stretch: bool,
    pub resample: Resample,
}

impl Default for ResizeRequest {
    fn default() -> Self {
        ResizeRequest {
            min_w: Size::Px(1),
            min_h: Size::Px(1),
            max_w: None,
            max_h: None,
            stretch: false,
            resample: Resample::default(),
        }
    }
}

impl ResizeRequest {
    /// Shrink to fit inside `max_w` x `max_h`
    pub fn within(max_w: Size, max_h: Size) -> Self {
        ResizeRequest {
            max_w: Some(max_w),
            max_h: Some(max_h),
            ..ResizeRequest::default()
        }
    }

    /// Scale up or down until the image fits in a `size` square
    pub fn thumbnail(size: Size) -> Self {
        ResizeRequest {
            min_w: size,
            min_h: size,
            max_w: Some(size),
            max_h: Some(size),
            ..ResizeRequest::default()
        }
    }

    pub fn stretch(mut self, stretch: bool) -> Self {
        self.stretch = stretch;
        self
    }

    pub fn resample(mut self, resample: Resample) -> Self {
        self.resample = resample;
        self
    }
}

/// Resolved pixel bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_w: u32,
    pub min_h: u32,
    pub max_w: u32,
    pub max_h: u32,
}

fn bound_px(size: Size, axis: AxisMetrics) -> u32 {
    let px = match size {
        Size::Px(px) if px < 0 => Size::Cells(px).px(axis),
        other => other.px(axis),
    };
    px.unsigned_abs().min(u32::MAX as u64) as u32
}

impl Bounds {
    pub fn resolve(
        request: &ResizeRequest,
        (width, height): (u32, u32),
        metrics: &Metrics,
    ) -> Result<Bounds, ResizeError> {
        let (horizontal, vertical) = (metrics.horizontal(), metrics.vertical());
        let max_or = |max: Option<Size>, axis, own: u32| match max.map(|size| bound_px(size, axis)) {
            Some(0) | None => own,
            Some(px) => px,
        };

        let bounds = Bounds {
            min_w: bound_px(request.min_w, horizontal),
            min_h: bound_px(request.min_h, vertical),
            max_w: max_or(request.max_w, horizontal, width),
            max_h: max_or(request.max_h, vertical, height),
        };

        if bounds.min_w > bounds.max_w || bounds.min_h > bounds.max_h {
            return Err(ResizeError::InvalidBounds {
                min_w: bounds.min_w,
                min_h: bounds.min_h,
                max_w: bounds.max_w,
                max_h: bounds.max_h,
            });
        }

        Ok(bounds)
    }
}

fn scaled(length: u32, ratio: f64) -> u32 {
    (length as f64 * ratio).round().clamp(1.0, u32::MAX as f64) as u32
}

fn floored(length: u32, ratio: f64) -> u32 {
    (length as f64 * ratio).floor().clamp(1.0, u32::MAX as f64) as u32
}

/// Target size for a `width` x `height` image, `None` when it already fits
///
/// Below a minimum (and under both maxima), the axis needing the larger
/// scale-up drives and the other follows the aspect ratio. If the follower
/// passes its maximum it is pinned there and the driver is derived back from
/// it, rounding down. Above a maximum, the axis allowing the smaller scale
/// drives. Minima are not applied when scaling down.
pub fn plan(width: u32, height: u32, bounds: Bounds, stretch: bool) -> Option<(u32, u32)> {
    let Bounds {
        min_w,
        min_h,
        max_w,
        max_h,
    } = bounds;
    let (w, h) = (width as f64, height as f64);

    let target = if (width < min_w || height < min_h) && width < max_w && height < max_h {
        if stretch {
            (min_w, min_h)
        } else {
            let (ratio_w, ratio_h) = (min_w as f64 / w, min_h as f64 / h);
            if ratio_w >= ratio_h {
                match scaled(height, ratio_w) {
                    follower if follower > max_h => (floored(width, max_h as f64 / h), max_h),
                    follower => (min_w, follower),
                }
            } else {
                match scaled(width, ratio_h) {
                    follower if follower > max_w => (max_w, floored(height, max_w as f64 / w)),
                    follower => (follower, min_h),
                }
            }
        }
    } else if width > max_w || height > max_h {
        if stretch {
            (max_w, max_h)
        } else {
            let (ratio_w, ratio_h) = (max_w as f64 / w, max_h as f64 / h);
            if ratio_w <= ratio_h {
                (max_w, scaled(height, ratio_w).min(max_h))
            } else {
                (scaled(width, ratio_h).min(max_w), max_h)
            }
        }
    } else {
        return None;
    };

    let target = (target.0.max(1), target.1.max(1));
    (target != (width, height)).then_some(target)
}

impl Image {
    /// Scale to fit `request`, reusing an earlier result for the same size
    ///
    /// Returns this very image when no scaling is needed.
    pub fn resize(self: &Rc<Self>, request: &ResizeRequest, metrics: &Metrics) -> Result<Rc<Image>, ResizeError> {
        let bounds = Bounds::resolve(request, (self.width(), self.height()), metrics)?;

        let Some((width, height)) = plan(self.width(), self.height(), bounds, request.stretch) else {
            return Ok(Rc::clone(self));
        };

        if let Some(cached) = self.resized.borrow().get(&(width, height)) {
            log::debug!("Image {} already resized to {}x{}", self.id(), width, height);
            return Ok(Rc::clone(cached));
        }

        log::debug!(
            "Resizing image {} from {}x{} to {}x{} ({:?})",
            self.id(),
            self.width(),
            self.height(),
            width,
            height,
            request.resample
        );
        let bitmap = self.load()?.resize_exact(width, height, request.resample.filter());
        let image = Image::from_bitmap(bitmap, Arc::clone(self.allocator()))?;

        self.resized
            .borrow_mut()
            .insert((width, height), Rc::clone(&image));
        Ok(image)
    }

    /// Fit inside a `size` x `size` square, enlarging small images
    pub fn thumbnail(
        self: &Rc<Self>,
        size: Size,
        stretch: bool,
        resample: Resample,
        metrics: &Metrics,
    ) -> Result<Rc<Image>, ResizeError> {
        let request = ResizeRequest::thumbnail(size)
            .stretch(stretch)
            .resample(resample);
        self.resize(&request, metrics)
    }

    /// Fit inside the terminal minus a margin on each side
    ///
    /// Each margin is applied on both sides, so the bound is the terminal
    /// size minus twice the margin. With `enlarge`, smaller images are
    /// scaled up to the same bounds.
    pub fn fit_screen(
        self: &Rc<Self>,
        h_margin: Size,
        v_margin: Size,
        enlarge: bool,
        request: ResizeRequest,
        metrics: &Metrics,
    ) -> Result<Rc<Image>, ResizeError> {
        let margin = |size, axis| bound_px(size, axis).saturating_mul(2);
        let max_w = metrics
            .px_width
            .saturating_sub(margin(h_margin, metrics.horizontal()))
            .max(1);
        let max_h = metrics
            .px_height
            .saturating_sub(margin(v_margin, metrics.vertical()))
            .max(1);

        let (max_w, max_h) = (px_size(max_w), px_size(max_h));
        let (min_w, min_h) = if enlarge {
            (max_w, max_h)
        } else {
            (Size::Px(1), Size::Px(1))
        };

        let request = ResizeRequest {
            min_w,
            min_h,
            max_w: Some(max_w),
            max_h: Some(max_h),
            ..request
        };
        self.resize(&request, metrics)
    }
}

fn px_size(px: u32) -> Size {
    Size::Px(px.min(i32::MAX as u32) as i32)
}
