// src/plugins/traits/mod.rs
use std::path::Path;

use crate::core::{
    GalleryType, Image, ImageLabel, Media, Modality, ReturnStatus, Role, SubjectMetadata,
    Template, TemplateRole,
};
use crate::plugins::types::{
    ComparisonResult, MorphResult, PluginMetadata, QualityResult, SearchResult, TemplateResult,
};

/// The contract an algorithm implementation satisfies.
///
/// Every capability defaults to `NotImplemented`, so an implementation only
/// overrides what it supports. Initialization calls happen once, in the
/// supervising process, before workers are forked; per-item calls happen in
/// workers and only borrow their inputs.
#[cfg_attr(test, mockall::automock)]
pub trait Interface {
    fn metadata(&self) -> PluginMetadata;

    fn initialize(&mut self, _config_dir: &Path, _role: Role) -> ReturnStatus {
        ReturnStatus::not_implemented()
    }

    fn vector_quality(&self, _face: &Image) -> QualityResult {
        QualityResult::unsupported()
    }

    fn detect_morph(&self, _suspected_morph: &Image, _label: ImageLabel) -> MorphResult {
        MorphResult::unsupported()
    }

    fn detect_morph_differentially(
        &self,
        _suspected_morph: &Image,
        _label: ImageLabel,
        _probe_face: &Image,
        _subject: Option<SubjectMetadata>,
    ) -> MorphResult {
        MorphResult::unsupported()
    }

    fn compare_images(&self, _enroll_image: &Image, _verif_image: &Image) -> ComparisonResult {
        ComparisonResult::unsupported()
    }

    fn create_template(
        &self,
        _media: &Media,
        _role: TemplateRole,
        _modality: Modality,
    ) -> TemplateResult {
        TemplateResult::unsupported()
    }

    /// Freezes the enrollment data. The implementation must copy out whatever
    /// it needs; blob and manifest become read-only afterwards.
    fn finalize_enrollment(
        &mut self,
        _config_dir: &Path,
        _enrollment_dir: &Path,
        _blob_path: &Path,
        _manifest_path: &Path,
        _gallery_type: GalleryType,
    ) -> ReturnStatus {
        ReturnStatus::not_implemented()
    }

    fn initialize_identification(
        &mut self,
        _config_dir: &Path,
        _enrollment_dir: &Path,
    ) -> ReturnStatus {
        ReturnStatus::not_implemented()
    }

    fn search(&self, _template: &Template, _top_k: u32) -> SearchResult {
        SearchResult::unsupported()
    }
}

/// Signature of the factory symbol exported by dynamically loaded
/// implementations under the name `_create_plugin`.
pub type CreatePluginFn = fn() -> Box<dyn Interface>;
