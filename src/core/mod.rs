//! Data model shared by the harness and plugin implementations

pub mod identity;
pub mod media;
pub mod morph;
pub mod quality;
pub mod status;

// Re-export commonly used types
pub use identity::types::{
    Candidate, EyePair, GalleryType, IrisAnnulus, Modality, Role, ScorePolarity, Template,
    TemplateRole,
};
pub use media::{Illuminant, Image, ImageDescription, Media, MediaType};
pub use morph::{ImageLabel, Sex, SubjectMetadata};
pub use quality::{BoundingBox, ImageQualityAssessment, QualityMeasure};
pub use status::{ReturnCode, ReturnStatus};
