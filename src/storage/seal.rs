// src/storage/seal.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use uuid::Uuid;

use crate::core::GalleryType;
use crate::storage::GalleryPaths;
use crate::utils::error::{HarnessError, Result};

/// Record written once a gallery is finalized. Its presence makes the gallery
/// read-only for every later invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GallerySeal {
    pub run_id: Uuid,
    pub finalized_at: DateTime<Utc>,
    pub gallery_type: GalleryType,
    pub template_count: usize,
    pub blob_sha3: String,
    pub manifest_sha3: String,
}

impl GallerySeal {
    pub fn compute(paths: &GalleryPaths, gallery_type: GalleryType, template_count: usize) -> Result<Self> {
        Ok(Self {
            run_id: Uuid::new_v4(),
            finalized_at: Utc::now(),
            gallery_type,
            template_count,
            blob_sha3: digest_file(&paths.blob)?,
            manifest_sha3: digest_file(&paths.manifest)?,
        })
    }

    pub fn load(paths: &GalleryPaths) -> Result<Option<Self>> {
        let path = paths.seal();
        match File::open(&path) {
            Ok(file) => Ok(Some(serde_json::from_reader(file)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the seal. Fails if one already exists.
    pub fn save(&self, paths: &GalleryPaths) -> Result<()> {
        let path = paths.seal();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(HarnessError::AlreadyFinalized(paths.blob.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }

    /// Recomputes both digests and compares them with the sealed values.
    pub fn verify(&self, paths: &GalleryPaths) -> Result<()> {
        let blob = digest_file(&paths.blob)?;
        if blob != self.blob_sha3 {
            return Err(HarnessError::GalleryTampered(format!(
                "{} changed after finalization",
                paths.blob.display()
            )));
        }
        let manifest = digest_file(&paths.manifest)?;
        if manifest != self.manifest_sha3 {
            return Err(HarnessError::GalleryTampered(format!(
                "{} changed after finalization",
                paths.manifest.display()
            )));
        }
        Ok(())
    }
}

/// SHA3-256 of a file, hex encoded. Streams, so blob size is not bounded by
/// memory.
pub fn digest_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha3_256::new();
    let mut buffer = vec![0u8; 1 << 16];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Removes write permission from a finalized gallery file.
pub fn make_read_only(path: &Path) -> Result<()> {
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_readonly(true);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}
