// src/core/identity/gallery.rs
//! Enrollment finalization and identification search.
//!
//! A gallery moves `Uninitialized -> Finalized` through exactly one finalize
//! call, and `Finalized -> SearchReady` through identification init. The
//! finalized state is persisted as a seal next to the blob, so it survives
//! across invocations and hosts sharing the output directory.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::core::identity::types::{Candidate, GalleryType, ScorePolarity, Template};
use crate::core::status::ReturnStatus;
use crate::plugins::traits::Interface;
use crate::plugins::types::SearchResult;
use crate::storage::seal::{self, GallerySeal};
use crate::storage::{GalleryPaths, Manifest};
use crate::utils::error::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryState {
    Uninitialized,
    Finalized,
    SearchReady,
}

pub struct GalleryLifecycle {
    paths: GalleryPaths,
    state: GalleryState,
    seal: Option<GallerySeal>,
    manifest: Option<Manifest>,
}

impl GalleryLifecycle {
    pub fn open(paths: GalleryPaths) -> Result<Self> {
        let seal = GallerySeal::load(&paths)?;
        let state = if seal.is_some() {
            GalleryState::Finalized
        } else {
            GalleryState::Uninitialized
        };
        Ok(Self {
            paths,
            state,
            seal,
            manifest: None,
        })
    }

    pub fn state(&self) -> GalleryState {
        self.state
    }

    pub fn paths(&self) -> &GalleryPaths {
        &self.paths
    }

    pub fn seal(&self) -> Option<&GallerySeal> {
        self.seal.as_ref()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Hands blob and manifest to the implementation for finalization, then
    /// seals them. A non-success status leaves the gallery unsealed.
    pub fn finalize(
        &mut self,
        plugin: &mut dyn Interface,
        config_dir: &Path,
        gallery_type: GalleryType,
    ) -> Result<ReturnStatus> {
        if self.state != GalleryState::Uninitialized {
            return Err(HarnessError::AlreadyFinalized(self.paths.blob.clone()));
        }

        let manifest = Manifest::load(&self.paths.manifest)?;
        let blob_len = fs::metadata(&self.paths.blob)
            .map_err(|e| {
                HarnessError::Gallery(format!(
                    "Cannot open blob {}: {}",
                    self.paths.blob.display(),
                    e
                ))
            })?
            .len();
        manifest.check_blob_len(blob_len)?;
        fs::create_dir_all(&self.paths.enrollment_dir)?;

        let status = plugin.finalize_enrollment(
            config_dir,
            &self.paths.enrollment_dir,
            &self.paths.blob,
            &self.paths.manifest,
            gallery_type,
        );
        info!(templates = manifest.len(), bytes = blob_len, status = %status, "finalizeEnrollment() returned");
        if !status.is_success() {
            return Ok(status);
        }

        let sealed = GallerySeal::compute(&self.paths, gallery_type, manifest.len())?;
        sealed.save(&self.paths)?;
        seal::make_read_only(&self.paths.blob)?;
        seal::make_read_only(&self.paths.manifest)?;

        self.seal = Some(sealed);
        self.state = GalleryState::Finalized;
        Ok(status)
    }

    /// Verifies the seal and lets the implementation load the finalized
    /// gallery. Must happen before workers are forked.
    pub fn initialize_identification(
        &mut self,
        plugin: &mut dyn Interface,
        config_dir: &Path,
    ) -> Result<ReturnStatus> {
        let sealed = match (self.state, &self.seal) {
            (GalleryState::Finalized, Some(sealed)) => sealed,
            (GalleryState::SearchReady, _) => {
                return Err(HarnessError::Gallery(
                    "Identification already initialized".into(),
                ))
            }
            _ => {
                return Err(HarnessError::Gallery(format!(
                    "Gallery at {} has not been finalized",
                    self.paths.blob.display()
                )))
            }
        };

        sealed.verify(&self.paths)?;
        let manifest = Manifest::load(&self.paths.manifest)?;
        if manifest.len() != sealed.template_count {
            return Err(HarnessError::GalleryTampered(format!(
                "Manifest lists {} templates, seal recorded {}",
                manifest.len(),
                sealed.template_count
            )));
        }

        let status = plugin.initialize_identification(config_dir, &self.paths.enrollment_dir);
        info!(templates = manifest.len(), status = %status, "initializeIdentification() returned");
        if status.is_success() {
            self.manifest = Some(manifest);
            self.state = GalleryState::SearchReady;
        }
        Ok(status)
    }

    /// Runs one search and normalizes the result to exactly `top_k`
    /// candidates, most relevant first.
    pub fn search(
        &self,
        plugin: &dyn Interface,
        template: &Template,
        top_k: u32,
        polarity: ScorePolarity,
    ) -> Result<SearchResult> {
        let manifest = match (self.state, &self.manifest) {
            (GalleryState::SearchReady, Some(manifest)) => manifest,
            _ => {
                return Err(HarnessError::Gallery(
                    "Search issued before identification was initialized".into(),
                ))
            }
        };

        let raw = plugin.search(template, top_k);
        if raw.status.is_not_implemented() {
            return Ok(raw);
        }
        if raw.candidates.len() > top_k as usize {
            warn!(
                returned = raw.candidates.len(),
                top_k, "Implementation returned more candidates than requested"
            );
        }

        Ok(SearchResult {
            status: raw.status,
            candidates: rank_candidates(raw.candidates, manifest, top_k, polarity),
        })
    }
}

/// Orders candidates most relevant first under `polarity`, breaking ties by
/// enrollment order, and returns exactly `top_k` entries.
///
/// Unassigned candidates, non-finite scores, identifiers missing from the
/// manifest, and repeated identifiers past their best entry are dropped
/// before padding with unassigned candidates.
pub fn rank_candidates(
    raw: Vec<Candidate>,
    manifest: &Manifest,
    top_k: u32,
    polarity: ScorePolarity,
) -> Vec<Candidate> {
    let mut ranked: Vec<(usize, Candidate)> = raw
        .into_iter()
        .filter(Candidate::is_usable)
        .filter_map(|candidate| {
            manifest
                .position(&candidate.template_id)
                .map(|position| (position, candidate))
        })
        .collect();

    ranked.sort_by(|(pos_a, a), (pos_b, b)| {
        polarity.rank(a.score, b.score).then(pos_a.cmp(pos_b))
    });

    let mut seen = HashSet::new();
    ranked.retain(|(position, _)| seen.insert(*position));

    let top_k = top_k as usize;
    let mut candidates: Vec<Candidate> = ranked
        .into_iter()
        .take(top_k)
        .map(|(_, candidate)| candidate)
        .collect();
    candidates.resize_with(top_k, Candidate::unassigned);
    candidates
}
