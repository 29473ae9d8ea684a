use image::DynamicImage;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use walkdir::WalkDir;

use super::{IdAllocator, Image, Origin};
use crate::error::{ErrorPolicy, ResizeError};

/// Creates images from files, directories, URLs and memory, all drawing
/// ids from one allocator
#[derive(Debug, Clone)]
pub struct ImageLoader {
    ids: Arc<IdAllocator>,
}

impl Default for ImageLoader {
    fn default() -> Self {
        ImageLoader::new(IdAllocator::global())
    }
}

impl ImageLoader {
    pub fn new(ids: Arc<IdAllocator>) -> Self {
        ImageLoader { ids }
    }

    pub fn ids(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    pub fn open(&self, path: impl AsRef<Path>) -> Result<Rc<Image>, ResizeError> {
        let path = expand_home(path.as_ref());
        let path = fs::canonicalize(&path).unwrap_or(path);
        Image::open(path, Arc::clone(&self.ids))
    }

    pub fn from_bytes(&self, bytes: impl Into<Rc<[u8]>>) -> Result<Rc<Image>, ResizeError> {
        Image::from_bytes(bytes, Origin::Bytes, Arc::clone(&self.ids))
    }

    pub fn from_bitmap(&self, bitmap: DynamicImage) -> Result<Rc<Image>, ResizeError> {
        Image::from_bitmap(bitmap, Arc::clone(&self.ids))
    }

    /// Download an image over http(s)
    #[cfg(feature = "remote")]
    pub fn fetch(&self, url: &str) -> Result<Rc<Image>, ResizeError> {
        let fetch_error = |err: reqwest::Error| ResizeError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        };

        log::debug!("Fetching {}", url);
        let bytes = reqwest::blocking::get(url)
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(fetch_error)?;

        Image::from_bytes(bytes.to_vec(), Origin::Url(url.to_string()), Arc::clone(&self.ids))
    }

    #[cfg(not(feature = "remote"))]
    pub fn fetch(&self, url: &str) -> Result<Rc<Image>, ResizeError> {
        Err(ResizeError::Fetch {
            url: url.to_string(),
            reason: "built without the `remote` feature".to_string(),
        })
    }

    /// A single file or URL
    pub fn load(&self, location: &str) -> Result<Rc<Image>, ResizeError> {
        if is_url(location) {
            self.fetch(location)
        } else {
            self.open(location)
        }
    }

    /// Every image found at `locations`, scanning directories recursively
    ///
    /// Locations that fail to load are handled by `policy`: with `raise`
    /// the first failure is returned, otherwise it is skipped.
    pub fn discover<S: AsRef<str>>(
        &self,
        locations: &[S],
        policy: ErrorPolicy,
    ) -> Result<Vec<Rc<Image>>, ResizeError> {
        let mut images = Vec::new();
        for location in locations {
            let location = location.as_ref();
            if is_url(location) {
                self.collect(self.fetch(location), &mut images, policy)?;
            } else {
                self.walk(&expand_home(Path::new(location)), &mut images, policy)?;
            }
        }

        log::info!("Found {} images in {} locations", images.len(), locations.len());
        Ok(images)
    }

    /// Every file below `path`, or `path` itself when it is not a directory
    ///
    /// Symlinks are followed; a link back to one of its own ancestors is
    /// reported as a read error instead of being walked again.
    fn walk(&self, path: &Path, images: &mut Vec<Rc<Image>>, policy: ErrorPolicy) -> Result<(), ResizeError> {
        let entries = WalkDir::new(path).follow_links(true).sort_by_file_name();

        for entry in entries {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {}
                Ok(entry) => self.collect(self.open(entry.path()), images, policy)?,
                Err(err) => {
                    let failed = err.path().map_or_else(|| path.to_path_buf(), Path::to_path_buf);
                    policy.recover(ResizeError::Read {
                        path: failed,
                        source: err.into(),
                    })?;
                }
            }
        }
        Ok(())
    }

    fn collect(
        &self,
        result: Result<Rc<Image>, ResizeError>,
        images: &mut Vec<Rc<Image>>,
        policy: ErrorPolicy,
    ) -> Result<(), ResizeError> {
        match result {
            Ok(image) => {
                images.push(image);
                Ok(())
            }
            Err(err) => policy.recover(err),
        }
    }
}

fn is_url(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
