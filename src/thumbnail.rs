//! Bounded-size PNG previews of candidate images.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use tracing::warn;

/// Default preview bounds, matching a side-by-side 720×480 layout.
pub const DEFAULT_MAX_WIDTH: u32 = 720;
pub const DEFAULT_MAX_HEIGHT: u32 = 480;

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode preview: {0}")]
    Encode(#[source] image::ImageError),
}

/// Bounding box a preview must fit within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSpec {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

impl ThumbnailSpec {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
        }
    }
}

/// A PNG-encoded preview.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl Thumbnail {
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.png)
    }
}

/// Dimensions of `width`×`height` scaled down to fit the bounds, aspect ratio
/// preserved. Images already inside the bounds keep their size.
pub fn fit_within(width: u32, height: u32, spec: ThumbnailSpec) -> (u32, u32) {
    if width <= spec.max_width && height <= spec.max_height {
        return (width, height);
    }
    let scale = f64::min(
        spec.max_width as f64 / width as f64,
        spec.max_height as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).clamp(1, spec.max_width);
    let h = ((height as f64 * scale).round() as u32).clamp(1, spec.max_height);
    (w, h)
}

/// Decode the image at `path` and re-encode a bounded PNG preview.
pub fn render_thumbnail(path: &Path, spec: ThumbnailSpec) -> Result<Thumbnail, ThumbnailError> {
    let bytes = std::fs::read(path).map_err(|source| ThumbnailError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let img = image::load_from_memory(&bytes).map_err(|source| {
        warn!(path = %path.display(), error = %source, "image decode failed");
        ThumbnailError::Decode {
            path: path.to_path_buf(),
            source,
        }
    })?;
    encode_preview(&img, spec)
}

/// Resolve a candidate identifier inside the session folder and render it.
pub fn render_candidate(
    folder: &Path,
    id: &str,
    spec: ThumbnailSpec,
) -> Result<Thumbnail, ThumbnailError> {
    render_thumbnail(&folder.join(id), spec)
}

fn encode_preview(img: &DynamicImage, spec: ThumbnailSpec) -> Result<Thumbnail, ThumbnailError> {
    let (w, h) = fit_within(img.width(), img.height(), spec);
    let preview = if (w, h) == (img.width(), img.height()) {
        img.clone()
    } else {
        img.resize_exact(w, h, FilterType::Lanczos3)
    };

    let mut png = Vec::new();
    preview
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(ThumbnailError::Encode)?;

    Ok(Thumbnail {
        width: preview.width(),
        height: preview.height(),
        png,
    })
}
