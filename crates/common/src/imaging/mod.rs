//! Image processing for avatars, author headshots and book covers
//!
//! Every stored image is a PNG thumbnail living at a canonical path derived
//! from its owner (and, for covers, the ISBN):
//!
//! | Kind | Canonical path |
//! |---|---|
//! | Avatar | `avatars/profile_{user_id}.png` |
//! | Headshot | `authors/{user_id}_{author_id}.png` |
//! | Cover | `books/{user_id}_{isbn}.png` |
//!
//! Decode failures never abort a save: the configured default image is
//! substituted, and if even that cannot be read a blank placeholder is
//! written so the canonical file always exists afterwards.

mod calculations;

pub use calculations::fit_within;

use crate::config::{ImageBounds, MediaConfig};
use crate::errors::AppError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("image worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Avatar,
    Headshot,
    Cover,
}

impl ImageKind {
    /// Media sub-directory holding this kind of image
    pub fn dir(&self) -> &'static str {
        match self {
            ImageKind::Avatar => "avatars",
            ImageKind::Headshot => "authors",
            ImageKind::Cover => "books",
        }
    }
}

/// Where the pixels for a save come from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Freshly uploaded bytes (already validated)
    Upload(Vec<u8>),
    /// Whatever is stored now (relative path), or the default when unset
    Stored(Option<String>),
}

/// Result of running the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Relative path to persist on the entity
    pub path: String,
    /// The canonical file was already current; nothing was written
    pub unchanged: bool,
    /// The default (or a placeholder) was used instead of the source
    pub fell_back: bool,
    /// Canonical file the new one replaces; remove it once the row is saved
    pub superseded: Option<String>,
}

/// Thumbnailing pipeline over a local media root
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    root: PathBuf,
    avatar_bounds: ImageBounds,
    headshot_bounds: ImageBounds,
    cover_bounds: ImageBounds,
    default_avatar: String,
    default_headshot: String,
    default_cover: String,
}

impl ImageProcessor {
    pub fn new(media: &MediaConfig) -> Self {
        Self {
            root: media.root.clone(),
            avatar_bounds: media.avatar_bounds,
            headshot_bounds: media.headshot_bounds,
            cover_bounds: media.cover_bounds,
            default_avatar: media.default_avatar.clone(),
            default_headshot: media.default_headshot.clone(),
            default_cover: media.default_cover.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bounds(&self, kind: ImageKind) -> ImageBounds {
        match kind {
            ImageKind::Avatar => self.avatar_bounds,
            ImageKind::Headshot => self.headshot_bounds,
            ImageKind::Cover => self.cover_bounds,
        }
    }

    /// Relative path of the configured default image for `kind`
    pub fn default_path(&self, kind: ImageKind) -> &str {
        match kind {
            ImageKind::Avatar => &self.default_avatar,
            ImageKind::Headshot => &self.default_headshot,
            ImageKind::Cover => &self.default_cover,
        }
    }

    pub fn avatar_path(user_id: Uuid) -> String {
        format!("{}/profile_{}.png", ImageKind::Avatar.dir(), user_id)
    }

    pub fn headshot_path(user_id: Uuid, author_id: Uuid) -> String {
        format!("{}/{}_{}.png", ImageKind::Headshot.dir(), user_id, author_id)
    }

    pub fn cover_path(user_id: Uuid, isbn: &str) -> String {
        format!("{}/{}_{}.png", ImageKind::Cover.dir(), user_id, isbn)
    }

    /// Absolute location of a stored relative path
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Produce the canonical thumbnail for `kind` at `canonical`.
    ///
    /// `source` is either a new upload or the currently stored path. When the
    /// stored path already is the canonical one and nothing was uploaded,
    /// the file is left alone. A superseded file is reported, not removed.
    pub fn store(
        &self,
        kind: ImageKind,
        canonical: &str,
        source: ImageSource,
    ) -> Result<StoredImage, ImageError> {
        let previous = match &source {
            ImageSource::Stored(current) => current.clone(),
            ImageSource::Upload(_) => None,
        };

        if previous.as_deref() == Some(canonical) {
            debug!(path = canonical, "Canonical image already current");
            return Ok(StoredImage {
                path: canonical.to_string(),
                unchanged: true,
                fell_back: false,
                superseded: None,
            });
        }

        let (decoded, fell_back) = self.decode_source(kind, &source);
        let bounds = self.bounds(kind);
        let thumbnail = shrink_to_fit(decoded, bounds);

        let target = self.absolute(canonical);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        remove_if_exists(&target)?;
        thumbnail.save_with_format(&target, ImageFormat::Png)?;

        // Shared default images are never superseded
        let superseded = previous.filter(|old| self.is_canonical_location(kind, old));

        info!(
            path = canonical,
            width = thumbnail.width(),
            height = thumbnail.height(),
            fell_back,
            "Stored image thumbnail"
        );

        Ok(StoredImage {
            path: canonical.to_string(),
            unchanged: false,
            fell_back,
            superseded,
        })
    }

    /// Run [`ImageProcessor::store`] on the blocking pool and wait for it
    pub async fn store_blocking(
        &self,
        kind: ImageKind,
        canonical: String,
        source: ImageSource,
    ) -> Result<StoredImage, ImageError> {
        let processor = self.clone();
        tokio::task::spawn_blocking(move || processor.store(kind, &canonical, source)).await?
    }

    /// Delete a stored canonical image, leaving defaults in place.
    ///
    /// Runs after the owning row is committed, so a failure is only logged.
    pub fn discard(&self, kind: ImageKind, relative: &str) {
        if !self.is_canonical_location(kind, relative) {
            return;
        }
        if let Err(e) = remove_if_exists(&self.absolute(relative)) {
            warn!(kind = ?kind, path = relative, error = %e, "Cannot remove image file");
        }
    }

    fn is_canonical_location(&self, kind: ImageKind, relative: &str) -> bool {
        relative.starts_with(&format!("{}/", kind.dir())) && relative != self.default_path(kind)
    }

    fn decode_source(&self, kind: ImageKind, source: &ImageSource) -> (DynamicImage, bool) {
        let attempt = match source {
            ImageSource::Upload(bytes) => {
                image::load_from_memory(bytes).map_err(|e| e.to_string())
            }
            ImageSource::Stored(Some(path)) => {
                image::open(self.absolute(path)).map_err(|e| e.to_string())
            }
            ImageSource::Stored(None) => Err("no image stored".to_string()),
        };

        match attempt {
            Ok(img) => (img, false),
            Err(reason) => {
                if !matches!(source, ImageSource::Stored(None)) {
                    warn!(kind = ?kind, error = %reason, "Cannot create thumbnail, using default image");
                }
                (self.decode_default(kind), true)
            }
        }
    }

    fn decode_default(&self, kind: ImageKind) -> DynamicImage {
        let default = self.absolute(self.default_path(kind));
        match image::open(&default) {
            Ok(img) => img,
            Err(e) => {
                warn!(
                    path = %default.display(),
                    error = %e,
                    "Default image unavailable, writing placeholder"
                );
                placeholder(self.bounds(kind))
            }
        }
    }
}

/// Downscale to fit `bounds`, keeping the aspect ratio; never upscales
pub fn shrink_to_fit(img: DynamicImage, bounds: ImageBounds) -> DynamicImage {
    let (width, height) = fit_within((img.width(), img.height()), bounds);
    if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    }
}

fn placeholder(bounds: ImageBounds) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        bounds.width.max(1),
        bounds.height.max(1),
        Rgba([224, 224, 224, 255]),
    ))
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
