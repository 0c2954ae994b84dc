// src/core/quality.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Quality components a plugin may report for a face image. Declaration order
/// is the column order of the quality log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityMeasure {
    UnifiedQualityScore,
    BackgroundUniformity,
    IlluminationUniformity,
    LuminanceMean,
    LuminanceVariance,
    UnderExposurePrevention,
    OverExposurePrevention,
    DynamicRange,
    Sharpness,
    CompressionArtifacts,
    NaturalColour,
    SingleFacePresent,
    EyesOpen,
    MouthClosed,
    EyesVisible,
    MouthOcclusionPrevention,
    FaceOcclusionPrevention,
    InterEyeDistance,
    HeadSize,
    HeadPoseYaw,
    HeadPosePitch,
    HeadPoseRoll,
    ExpressionNeutrality,
    NoHeadCoverings,
}

impl QualityMeasure {
    pub const ALL: [QualityMeasure; 24] = [
        QualityMeasure::UnifiedQualityScore,
        QualityMeasure::BackgroundUniformity,
        QualityMeasure::IlluminationUniformity,
        QualityMeasure::LuminanceMean,
        QualityMeasure::LuminanceVariance,
        QualityMeasure::UnderExposurePrevention,
        QualityMeasure::OverExposurePrevention,
        QualityMeasure::DynamicRange,
        QualityMeasure::Sharpness,
        QualityMeasure::CompressionArtifacts,
        QualityMeasure::NaturalColour,
        QualityMeasure::SingleFacePresent,
        QualityMeasure::EyesOpen,
        QualityMeasure::MouthClosed,
        QualityMeasure::EyesVisible,
        QualityMeasure::MouthOcclusionPrevention,
        QualityMeasure::FaceOcclusionPrevention,
        QualityMeasure::InterEyeDistance,
        QualityMeasure::HeadSize,
        QualityMeasure::HeadPoseYaw,
        QualityMeasure::HeadPosePitch,
        QualityMeasure::HeadPoseRoll,
        QualityMeasure::ExpressionNeutrality,
        QualityMeasure::NoHeadCoverings,
    ];
}

impl fmt::Display for QualityMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Face location in image coordinates. `-1` marks an unset field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xleft: i16,
    pub ytop: i16,
    pub width: i16,
    pub height: i16,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            xleft: -1,
            ytop: -1,
            width: -1,
            height: -1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageQualityAssessment {
    pub bounding_box: BoundingBox,
    pub measures: BTreeMap<QualityMeasure, f64>,
}

impl ImageQualityAssessment {
    pub fn get(&self, measure: QualityMeasure) -> Option<f64> {
        self.measures.get(&measure).copied()
    }
}
