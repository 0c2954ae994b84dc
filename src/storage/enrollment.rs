// src/storage/enrollment.rs
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::Template;
use crate::storage::manifest::Manifest;
use crate::storage::seal::GallerySeal;
use crate::storage::GalleryPaths;
use crate::utils::error::{HarnessError, Result};

/// Blob and manifest fragment written by one enroll worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentPart {
    pub blob: PathBuf,
    pub manifest: PathBuf,
}

impl EnrollmentPart {
    pub fn for_shard(output_dir: &Path, stem: &str, shard: usize) -> Self {
        Self {
            blob: output_dir.join(format!("{}.edb.{}", stem, shard)),
            manifest: output_dir.join(format!("{}.manifest.{}", stem, shard)),
        }
    }

    pub fn remove(&self) {
        for path in [&self.blob, &self.manifest] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), "Could not remove enrollment part: {}", e);
                }
            }
        }
    }
}

/// Appends templates to a shard-local blob while building its manifest.
pub struct EnrollmentPartWriter {
    part: EnrollmentPart,
    blob: BufWriter<File>,
    manifest: Manifest,
}

impl EnrollmentPartWriter {
    pub fn create(part: EnrollmentPart) -> Result<Self> {
        let blob = BufWriter::new(File::create(&part.blob)?);
        Ok(Self {
            part,
            blob,
            manifest: Manifest::new(),
        })
    }

    /// Zero-length templates are recorded like any other.
    pub fn append(&mut self, template_id: &str, template: &Template) -> Result<()> {
        self.manifest.push(template_id, template.len() as u64)?;
        self.blob.write_all(template.as_bytes())?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<EnrollmentPart> {
        self.blob.flush()?;
        self.manifest.save(&self.part.manifest)?;
        Ok(self.part)
    }
}

/// Concatenates shard parts, in the order given, into the gallery blob and
/// manifest. Offsets are rebased onto the merged blob. Parts are removed
/// once the merge has been written.
pub fn merge_parts(parts: &[EnrollmentPart], paths: &GalleryPaths) -> Result<Manifest> {
    if GallerySeal::load(paths)?.is_some() {
        return Err(HarnessError::AlreadyFinalized(paths.blob.clone()));
    }
    if let Some(parent) = paths.blob.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Some(parent) = paths.manifest.parent() {
        fs::create_dir_all(parent)?;
    }

    let merged = match write_merged(parts, paths) {
        Ok(merged) => merged,
        Err(e) => {
            let _ = fs::remove_file(&paths.blob);
            let _ = fs::remove_file(&paths.manifest);
            return Err(e);
        }
    };

    for part in parts {
        part.remove();
    }
    info!(
        templates = merged.len(),
        bytes = merged.total_len(),
        blob = %paths.blob.display(),
        "Enrollment database written"
    );
    Ok(merged)
}

fn write_merged(parts: &[EnrollmentPart], paths: &GalleryPaths) -> Result<Manifest> {
    let mut merged = Manifest::new();
    let mut blob = BufWriter::new(File::create(&paths.blob)?);

    for part in parts {
        let manifest = Manifest::load(&part.manifest)?;
        let mut source = File::open(&part.blob)?;
        manifest.check_blob_len(source.metadata()?.len())?;

        let copied = io::copy(&mut source, &mut blob)?;
        for entry in manifest.entries() {
            merged.push(&entry.template_id, entry.length)?;
        }
        debug!(part = %part.blob.display(), bytes = copied, templates = manifest.len(), "Merged enrollment part");
    }
    blob.flush()?;
    merged.save(&paths.manifest)?;
    Ok(merged)
}
