//! Image discovery: list the rankable images directly inside a folder.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::ranker::RankerError;

/// Extensions accepted as images, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "tif", "bmp"];

/// Smallest folder that can form a pair.
pub const MIN_IMAGES: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("folder is not a readable directory: {path}")]
    FolderInvalid { path: PathBuf },
    #[error("folder {path} holds {found} supported image(s), need at least {MIN_IMAGES}")]
    FolderEmpty { path: PathBuf, found: usize },
}

impl DiscoveryError {
    pub fn found(&self) -> usize {
        match self {
            DiscoveryError::FolderInvalid { .. } => 0,
            DiscoveryError::FolderEmpty { found, .. } => *found,
        }
    }
}

impl From<DiscoveryError> for RankerError {
    fn from(err: DiscoveryError) -> Self {
        RankerError::InsufficientCandidates { found: err.found() }
    }
}

/// Whether `path` carries a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// List supported image filenames in `folder` (no recursion), sorted and unique.
///
/// Fails unless at least two images are found.
pub fn discover_images(folder: &Path) -> Result<Vec<String>, DiscoveryError> {
    if !folder.is_dir() {
        return Err(DiscoveryError::FolderInvalid {
            path: folder.to_path_buf(),
        });
    }

    let mut names = BTreeSet::new();
    let walker = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                // Unreadable root means the folder itself is unusable.
                if err.depth() == 0 {
                    return Err(DiscoveryError::FolderInvalid {
                        path: folder.to_path_buf(),
                    });
                }
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !is_supported_image(path) {
            continue;
        }
        names.insert(entry.file_name().to_string_lossy().to_string());
    }

    debug!(folder = %folder.display(), found = names.len(), "discovery complete");

    if names.len() < MIN_IMAGES {
        return Err(DiscoveryError::FolderEmpty {
            path: folder.to_path_buf(),
            found: names.len(),
        });
    }
    Ok(names.into_iter().collect())
}
