//! Images: decoding, ids, resizing and display over the graphics protocol.

pub mod display;
pub mod id;
pub mod resize;
pub mod source;

use image::{DynamicImage, ImageFormat, ImageReader};
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

pub use display::Placement;
pub use id::IdAllocator;
pub use resize::{Resample, ResizeRequest};
pub use source::ImageLoader;

use crate::error::ResizeError;
use crate::models::Size;

/// Where an image's pixels came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Path(PathBuf),
    Url(String),
    Bytes,
    /// A bitmap handed over already decoded, or produced by resizing
    Memory,
}

impl Origin {
    /// Final path or URL segment, if there is one
    pub fn name(&self) -> Option<String> {
        match self {
            Origin::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            Origin::Url(url) => url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
            Origin::Bytes | Origin::Memory => None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Path(path) => write!(f, "{}", path.display()),
            Origin::Url(url) => f.write_str(url),
            Origin::Bytes | Origin::Memory => f.write_str("-"),
        }
    }
}

/// One bitmap known to the terminal by its id
///
/// The header is read when the image is created; pixels are decoded on
/// first use. Resized copies are cached on the source image, keyed by their
/// dimensions, and live as long as it does.
pub struct Image {
    id: u32,
    origin: Origin,
    format: Option<ImageFormat>,
    width: u32,
    height: u32,
    encoded: Option<Rc<[u8]>>,
    bitmap: OnceCell<DynamicImage>,
    ids: Arc<IdAllocator>,
    resized: RefCell<HashMap<(u32, u32), Rc<Image>>>,
}

impl Image {
    /// Read the header of an image file
    pub fn open(path: impl AsRef<Path>, ids: Arc<IdAllocator>) -> Result<Rc<Image>, ResizeError> {
        let path = path.as_ref();
        let read_error = |source| ResizeError::Read {
            path: path.to_path_buf(),
            source,
        };

        let reader = ImageReader::open(path)
            .map_err(read_error)?
            .with_guessed_format()
            .map_err(read_error)?;
        let format = reader.format();
        let (width, height) = reader.into_dimensions()?;

        Image::build(Origin::Path(path.to_path_buf()), format, (width, height), None, None, ids)
    }

    /// Read the header of encoded image bytes
    pub fn from_bytes(
        bytes: impl Into<Rc<[u8]>>,
        origin: Origin,
        ids: Arc<IdAllocator>,
    ) -> Result<Rc<Image>, ResizeError> {
        let bytes = bytes.into();
        let reader = ImageReader::new(Cursor::new(&bytes[..]))
            .with_guessed_format()
            .map_err(image::ImageError::from)?;
        let format = reader.format();
        let (width, height) = reader.into_dimensions()?;

        Image::build(origin, format, (width, height), Some(bytes), None, ids)
    }

    pub fn from_bitmap(bitmap: DynamicImage, ids: Arc<IdAllocator>) -> Result<Rc<Image>, ResizeError> {
        let dimensions = (bitmap.width(), bitmap.height());
        Image::build(Origin::Memory, None, dimensions, None, Some(bitmap), ids)
    }

    fn build(
        origin: Origin,
        format: Option<ImageFormat>,
        (width, height): (u32, u32),
        encoded: Option<Rc<[u8]>>,
        bitmap: Option<DynamicImage>,
        ids: Arc<IdAllocator>,
    ) -> Result<Rc<Image>, ResizeError> {
        if width == 0 || height == 0 {
            return Err(ResizeError::Empty);
        }

        let cell = OnceCell::new();
        if let Some(bitmap) = bitmap {
            let _ = cell.set(bitmap);
        }

        let image = Image {
            id: ids.allocate(),
            origin,
            format,
            width,
            height,
            encoded,
            bitmap: cell,
            ids,
            resized: RefCell::new(HashMap::new()),
        };
        log::debug!(
            "Image {} from {} is {}x{}",
            image.id,
            image.origin,
            image.width,
            image.height
        );

        Ok(Rc::new(image))
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width_size(&self) -> Size {
        Size::Px(self.width.min(i32::MAX as u32) as i32)
    }

    pub fn height_size(&self) -> Size {
        Size::Px(self.height.min(i32::MAX as u32) as i32)
    }

    pub fn name(&self) -> Option<String> {
        self.origin.name()
    }

    /// Path of the source file when the terminal can read it as is
    pub fn png_path(&self) -> Option<&Path> {
        match (&self.origin, self.format) {
            (Origin::Path(path), Some(ImageFormat::Png)) => Some(path),
            _ => None,
        }
    }

    /// Decoded pixels, decoding on first use
    pub fn load(&self) -> Result<&DynamicImage, ResizeError> {
        if let Some(bitmap) = self.bitmap.get() {
            return Ok(bitmap);
        }

        let decoded = match (&self.origin, &self.encoded) {
            (_, Some(bytes)) => ImageReader::new(Cursor::new(&bytes[..]))
                .with_guessed_format()
                .map_err(image::ImageError::from)?
                .decode()?,
            (Origin::Path(path), None) => ImageReader::open(path)
                .map_err(|source| ResizeError::Read {
                    path: path.clone(),
                    source,
                })?
                .with_guessed_format()
                .map_err(|source| ResizeError::Read {
                    path: path.clone(),
                    source,
                })?
                .decode()?,
            // Bitmaps without an encoded form are stored at construction
            _ => return Err(ResizeError::Empty),
        };

        log::debug!("Decoded image {} ({})", self.id, self.origin);
        Ok(self.bitmap.get_or_init(|| decoded))
    }

    /// The same source under a fresh id
    pub fn duplicate(&self) -> Rc<Image> {
        Rc::new(Image {
            id: self.ids.allocate(),
            origin: self.origin.clone(),
            format: self.format,
            width: self.width,
            height: self.height,
            encoded: self.encoded.clone(),
            bitmap: self.bitmap.clone(),
            ids: Arc::clone(&self.ids),
            resized: RefCell::new(HashMap::new()),
        })
    }

    /// Ids of every cached resized copy
    pub fn resized_ids(&self) -> Vec<u32> {
        self.resized.borrow().values().map(|image| image.id).collect()
    }

    pub fn resized_count(&self) -> usize {
        self.resized.borrow().len()
    }

    pub(crate) fn allocator(&self) -> &Arc<IdAllocator> {
        &self.ids
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("decoded", &self.bitmap.get().is_some())
            .field("resized", &self.resized_count())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    pub(crate) fn ids() -> Arc<IdAllocator> {
        Arc::new(IdAllocator::with_seed(1..=1_000_000, 3))
    }

    pub(crate) fn bitmap(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_pixel(width, height, Rgba([200, 10, 10, 255])))
    }

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        bitmap(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_bytes_header_read_without_decoding() {
        let image = Image::from_bytes(png_bytes(30, 20), Origin::Bytes, ids()).unwrap();
        assert_eq!((image.width(), image.height()), (30, 20));
        assert!(image.bitmap.get().is_none());

        let bitmap = image.load().unwrap();
        assert_eq!(bitmap.width(), 30);
    }

    #[test]
    fn test_open_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        std::fs::write(&path, png_bytes(8, 4)).unwrap();

        let image = Image::open(&path, ids()).unwrap();
        assert_eq!(image.name().as_deref(), Some("red.png"));
        assert_eq!(image.png_path(), Some(path.as_path()));
        assert_eq!(image.load().unwrap().height(), 4);
    }

    #[test]
    fn test_open_missing_file() {
        let err = Image::open("/nonexistent/pixgrid.png", ids()).unwrap_err();
        assert!(matches!(err, ResizeError::Read { .. }));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let err = Image::from_bytes(b"definitely not an image".to_vec(), Origin::Bytes, ids()).unwrap_err();
        assert!(matches!(err, ResizeError::Decode(_)));
    }

    #[test]
    fn test_duplicate_gets_new_id() {
        let image = Image::from_bitmap(bitmap(4, 4), ids()).unwrap();
        let copy = image.duplicate();
        assert_ne!(image.id(), copy.id());
        assert_eq!(copy.origin(), &Origin::Memory);
        assert_eq!(copy.load().unwrap().width(), 4);
    }

    #[test]
    fn test_origin_names() {
        assert_eq!(
            Origin::Url("https://example.com/a/cat.jpg".into()).name().as_deref(),
            Some("cat.jpg")
        );
        assert_eq!(Origin::Bytes.name(), None);
        assert_eq!(Origin::Memory.to_string(), "-");
    }
}
