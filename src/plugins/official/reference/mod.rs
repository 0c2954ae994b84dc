// src/plugins/official/reference/mod.rs
//! Deterministic implementation built on coarse luminance statistics.
//!
//! It exists so the harness can be exercised end to end without a vendor
//! library. Single-image morph detection is left unimplemented on purpose so
//! the abstention path has a built-in caller.

pub mod features;

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::{
    BoundingBox, Candidate, GalleryType, Image, ImageLabel, ImageQualityAssessment, Media,
    Modality, QualityMeasure, ReturnCode, ReturnStatus, Role, SubjectMetadata, Template,
    TemplateRole,
};
use crate::plugins::traits::Interface;
use crate::plugins::types::{
    ComparisonResult, MorphResult, PluginMetadata, QualityResult, SearchResult, TemplateResult,
};
use crate::plugins::versioning::{API_VERSION, STRUCTS_VERSION};
use crate::storage::Manifest;

const GALLERY_FILE: &str = "reference-gallery.json";

#[derive(Debug, Serialize, Deserialize)]
struct EnrolledTemplate {
    id: String,
    /// `None` for templates without usable features.
    features: Option<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredGallery {
    gallery_type: GalleryType,
    templates: Vec<EnrolledTemplate>,
}

#[derive(Debug, Default)]
pub struct ReferenceImplementation {
    config_dir: Option<PathBuf>,
    role: Option<Role>,
    gallery: Option<StoredGallery>,
}

impl ReferenceImplementation {
    pub const NAME: &'static str = "reference";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed() -> Box<dyn Interface> {
        Box::new(Self::new())
    }

    fn features_of(images: &[Image]) -> Option<Vec<f32>> {
        let vectors: Option<Vec<Vec<f32>>> = images.iter().map(features::extract).collect();
        features::average(&vectors?)
    }

    fn write_gallery(
        &self,
        enrollment_dir: &Path,
        blob_path: &Path,
        manifest_path: &Path,
        gallery_type: GalleryType,
    ) -> std::io::Result<usize> {
        let manifest = Manifest::load(manifest_path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let mut blob = BufReader::new(File::open(blob_path)?);

        let mut templates = Vec::with_capacity(manifest.len());
        for entry in manifest.entries() {
            let template = Manifest::read_template(&mut blob, entry)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
            templates.push(EnrolledTemplate {
                id: entry.template_id.clone(),
                features: features::decode_template(template.as_bytes()).map(|(_, f)| f),
            });
        }

        std::fs::create_dir_all(enrollment_dir)?;
        let stored = StoredGallery {
            gallery_type,
            templates,
        };
        let file = BufWriter::new(File::create(enrollment_dir.join(GALLERY_FILE))?);
        serde_json::to_writer(file, &stored)?;
        Ok(stored.templates.len())
    }
}

impl Interface for ReferenceImplementation {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: Self::NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            api_version: API_VERSION.to_string(),
            structs_version: STRUCTS_VERSION.to_string(),
        }
    }

    fn initialize(&mut self, config_dir: &Path, role: Role) -> ReturnStatus {
        self.config_dir = Some(config_dir.to_path_buf());
        self.role = Some(role);
        ReturnStatus::success()
    }

    fn vector_quality(&self, face: &Image) -> QualityResult {
        let luminance = face.luminance();
        if luminance.is_empty() {
            return QualityResult {
                status: ReturnStatus::new(ReturnCode::DetectionError, "empty image"),
                assessment: ImageQualityAssessment::default(),
            };
        }

        let n = luminance.len() as f64;
        let mean = luminance.iter().map(|&v| v as f64).sum::<f64>() / n;
        let variance = luminance
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        let (min, max) = luminance
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let dark = luminance.iter().filter(|&&v| v < 0.1).count() as f64 / n;
        let bright = luminance.iter().filter(|&&v| v > 0.9).count() as f64 / n;

        let mut assessment = ImageQualityAssessment {
            bounding_box: BoundingBox {
                xleft: 0,
                ytop: 0,
                width: face.width.min(i16::MAX as u32) as i16,
                height: face.height.min(i16::MAX as u32) as i16,
            },
            ..Default::default()
        };
        let measures = &mut assessment.measures;
        measures.insert(QualityMeasure::LuminanceMean, (mean * 100.0).round());
        measures.insert(QualityMeasure::LuminanceVariance, (variance * 100.0).round());
        measures.insert(QualityMeasure::DynamicRange, ((max - min) as f64 * 100.0).round());
        measures.insert(QualityMeasure::UnderExposurePrevention, ((1.0 - dark) * 100.0).round());
        measures.insert(QualityMeasure::OverExposurePrevention, ((1.0 - bright) * 100.0).round());
        let unified = measures.values().sum::<f64>() / measures.len() as f64;
        measures.insert(QualityMeasure::UnifiedQualityScore, unified.round());

        QualityResult {
            status: ReturnStatus::success(),
            assessment,
        }
    }

    fn detect_morph_differentially(
        &self,
        suspected_morph: &Image,
        _label: ImageLabel,
        probe_face: &Image,
        _subject: Option<SubjectMetadata>,
    ) -> MorphResult {
        match (features::extract(suspected_morph), features::extract(probe_face)) {
            (Some(suspect), Some(probe)) => {
                let score = (features::distance(&suspect, &probe) * 4.0).clamp(0.0, 1.0);
                MorphResult {
                    status: ReturnStatus::success(),
                    is_morph: score > 0.5,
                    score: Some(score),
                }
            }
            _ => MorphResult {
                status: ReturnStatus::new(ReturnCode::ExtractError, "empty image"),
                is_morph: false,
                score: None,
            },
        }
    }

    fn compare_images(&self, enroll_image: &Image, verif_image: &Image) -> ComparisonResult {
        match (features::extract(enroll_image), features::extract(verif_image)) {
            (Some(a), Some(b)) => ComparisonResult {
                status: ReturnStatus::success(),
                similarity: Some(1.0 - features::distance(&a, &b)),
            },
            _ => ComparisonResult {
                status: ReturnStatus::new(ReturnCode::ExtractError, "empty image"),
                similarity: None,
            },
        }
    }

    fn create_template(&self, media: &Media, role: TemplateRole, modality: Modality) -> TemplateResult {
        let mut result = TemplateResult::unsupported();
        if media.is_empty() {
            result.status = ReturnStatus::new(ReturnCode::NumDataError, "no images supplied");
            return result;
        }

        match Self::features_of(&media.frames) {
            Some(features) => {
                result.status = ReturnStatus::success();
                result.template = Template(features::encode_template(modality, &features));
            }
            None => {
                result.status = ReturnStatus::new(ReturnCode::ExtractError, "empty image");
            }
        }
        debug!(role = ?role, bytes = result.template.len(), "Reference template created");
        result
    }

    fn finalize_enrollment(
        &mut self,
        _config_dir: &Path,
        enrollment_dir: &Path,
        blob_path: &Path,
        manifest_path: &Path,
        gallery_type: GalleryType,
    ) -> ReturnStatus {
        match self.write_gallery(enrollment_dir, blob_path, manifest_path, gallery_type) {
            Ok(count) => {
                debug!(templates = count, "Reference gallery copied out");
                ReturnStatus::success()
            }
            Err(e) => ReturnStatus::new(ReturnCode::EnrollDirError, e.to_string()),
        }
    }

    fn initialize_identification(&mut self, _config_dir: &Path, enrollment_dir: &Path) -> ReturnStatus {
        let path = enrollment_dir.join(GALLERY_FILE);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => return ReturnStatus::new(ReturnCode::EnrollDirError, e.to_string()),
        };
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(gallery) => {
                self.gallery = Some(gallery);
                ReturnStatus::success()
            }
            Err(e) => ReturnStatus::new(ReturnCode::EnrollDirError, e.to_string()),
        }
    }

    fn search(&self, template: &Template, top_k: u32) -> SearchResult {
        let Some(gallery) = &self.gallery else {
            return SearchResult {
                status: ReturnStatus::new(ReturnCode::ConfigError, "identification not initialized"),
                candidates: Vec::new(),
            };
        };
        let Some((modality, probe)) = features::decode_template(template.as_bytes()) else {
            return SearchResult {
                status: ReturnStatus::new(ReturnCode::TemplateFormatError, "unrecognized template"),
                candidates: Vec::new(),
            };
        };

        let polarity = modality.polarity();
        let mut candidates: Vec<Candidate> = gallery
            .templates
            .iter()
            .filter_map(|enrolled| {
                let features = enrolled.features.as_ref()?;
                let distance = features::distance(&probe, features);
                let score = match modality {
                    Modality::Iris => distance,
                    Modality::Face | Modality::Multimodal => 1.0 - distance,
                };
                Some(Candidate::assigned(enrolled.id.clone(), score))
            })
            .collect();
        candidates.sort_by(|a, b| polarity.rank(a.score, b.score));
        candidates.truncate(top_k as usize);

        SearchResult {
            status: ReturnStatus::success(),
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::versioning::VersionManager;

    fn gray(value: u8) -> Image {
        Image::new(8, 8, 8, vec![value; 64]).unwrap()
    }

    #[test]
    fn test_reports_current_interface_versions() {
        let plugin = ReferenceImplementation::new();
        let versions = VersionManager::new().unwrap();
        assert!(versions.check_compatibility(&plugin.metadata()).is_ok());
    }

    #[test]
    fn test_single_image_morph_detection_is_not_implemented() {
        let plugin = ReferenceImplementation::new();
        let result = plugin.detect_morph(&gray(10), ImageLabel::Unknown);
        assert!(result.status.is_not_implemented());
    }

    #[test]
    fn test_quality_leaves_unsupported_measures_absent() {
        let plugin = ReferenceImplementation::new();
        let result = plugin.vector_quality(&gray(128));
        assert!(result.status.is_success());
        assert_eq!(result.assessment.bounding_box.width, 8);
        assert!(result.assessment.get(QualityMeasure::LuminanceMean).is_some());
        assert!(result.assessment.get(QualityMeasure::EyesOpen).is_none());
    }

    #[test]
    fn test_empty_media_yields_empty_template() {
        let plugin = ReferenceImplementation::new();
        let result = plugin.create_template(
            &Media::still(Vec::new()),
            TemplateRole::Enrollment1N,
            Modality::Face,
        );
        assert_eq!(result.status.code, ReturnCode::NumDataError);
        assert!(result.template.is_empty());
    }

    #[test]
    fn test_identical_images_compare_as_identical() {
        let plugin = ReferenceImplementation::new();
        let result = plugin.compare_images(&gray(50), &gray(50));
        assert_eq!(result.similarity, Some(1.0));
    }

    #[test]
    fn test_search_before_identification_init_fails() {
        let plugin = ReferenceImplementation::new();
        let result = plugin.search(&Template::empty(), 3);
        assert_eq!(result.status.code, ReturnCode::ConfigError);
    }
}
