// src/plugins/types.rs
use serde::{Deserialize, Serialize};

use crate::core::{
    Candidate, EyePair, ImageQualityAssessment, IrisAnnulus, ReturnStatus, Template,
};

/// Self-description of an implementation. The two version strings are the
/// interface versions the implementation was compiled against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub api_version: String,
    pub structs_version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityResult {
    pub status: ReturnStatus,
    pub assessment: ImageQualityAssessment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphResult {
    pub status: ReturnStatus,
    pub is_morph: bool,
    /// Morph confidence on `[0, 1]`; `None` when not computed.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub status: ReturnStatus,
    /// `None` when the comparison could not be performed.
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateResult {
    pub status: ReturnStatus,
    pub template: Template,
    pub eye_coordinates: Vec<EyePair>,
    pub iris_locations: Vec<IrisAnnulus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub status: ReturnStatus,
    pub candidates: Vec<Candidate>,
}

macro_rules! unsupported {
    ($ty:ident { $($field:ident: $value:expr),* $(,)? }) => {
        impl $ty {
            pub fn unsupported() -> Self {
                Self {
                    status: ReturnStatus::not_implemented(),
                    $($field: $value),*
                }
            }
        }
    };
}

unsupported!(QualityResult { assessment: ImageQualityAssessment::default() });
unsupported!(MorphResult { is_morph: false, score: None });
unsupported!(ComparisonResult { similarity: None });
unsupported!(TemplateResult {
    template: Template::empty(),
    eye_coordinates: Vec::new(),
    iris_locations: Vec::new(),
});
unsupported!(SearchResult { candidates: Vec::new() });
