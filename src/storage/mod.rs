//! Enrollment database: concatenated template blob, its manifest, and the
//! seal that freezes both

pub mod enrollment;
pub mod manifest;
pub mod seal;

use std::path::PathBuf;

pub use enrollment::{merge_parts, EnrollmentPart, EnrollmentPartWriter};
pub use manifest::{Manifest, ManifestEntry};
pub use seal::GallerySeal;

/// Locations of one gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryPaths {
    /// Directory where the implementation keeps its private enrollment data.
    pub enrollment_dir: PathBuf,
    pub blob: PathBuf,
    pub manifest: PathBuf,
}

impl GalleryPaths {
    pub fn new(enrollment_dir: PathBuf, blob: PathBuf, manifest: PathBuf) -> Self {
        Self {
            enrollment_dir,
            blob,
            manifest,
        }
    }

    pub fn seal(&self) -> PathBuf {
        let mut name = self.blob.as_os_str().to_owned();
        name.push(".seal");
        PathBuf::from(name)
    }
}
