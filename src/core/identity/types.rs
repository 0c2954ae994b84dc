// src/core/identity/types.rs
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::utils::error::{HarnessError, Result};

/// Opaque template bytes produced by a plugin. Zero length is legal and means
/// no features were extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template(pub Vec<u8>);

impl Template {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Template {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Biometric modality of a 1:N evaluation. Determines score polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    #[default]
    Face,
    Iris,
    Multimodal,
}

impl Modality {
    pub fn polarity(self) -> ScorePolarity {
        match self {
            Modality::Face | Modality::Multimodal => ScorePolarity::Similarity,
            Modality::Iris => ScorePolarity::Dissimilarity,
        }
    }
}

impl FromStr for Modality {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "face" => Ok(Modality::Face),
            "iris" => Ok(Modality::Iris),
            "multimodal" | "face+iris" => Ok(Modality::Multimodal),
            other => Err(HarnessError::Config(format!("Unknown modality '{}'", other))),
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Modality::Face => "face",
            Modality::Iris => "iris",
            Modality::Multimodal => "multimodal",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorePolarity {
    /// Higher is more similar.
    Similarity,
    /// Lower is more similar.
    Dissimilarity,
}

impl ScorePolarity {
    /// Orders two scores most-relevant-first.
    pub fn rank(self, a: f64, b: f64) -> Ordering {
        match self {
            ScorePolarity::Similarity => b.total_cmp(&a),
            ScorePolarity::Dissimilarity => a.total_cmp(&b),
        }
    }
}

/// Intended use of the templates a plugin is about to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateRole {
    Enrollment1N,
    Search1N,
    Verification,
}

/// What the implementation is being initialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Quality,
    MorphDetection,
    Comparison,
    Template(TemplateRole),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GalleryType {
    /// Subject-based.
    #[default]
    Consolidated,
    /// Event-based.
    Unconsolidated,
}

impl FromStr for GalleryType {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "consolidated" => Ok(GalleryType::Consolidated),
            "unconsolidated" => Ok(GalleryType::Unconsolidated),
            other => Err(HarnessError::Config(format!("Unknown gallery type '{}'", other))),
        }
    }
}

/// One entry of a search result. When `is_assigned` is false the identifier
/// and score carry no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub is_assigned: bool,
    pub template_id: String,
    pub score: f64,
}

impl Candidate {
    pub fn assigned(template_id: impl Into<String>, score: f64) -> Self {
        Self {
            is_assigned: true,
            template_id: template_id.into(),
            score,
        }
    }

    pub fn unassigned() -> Self {
        Self {
            is_assigned: false,
            template_id: String::new(),
            score: -1.0,
        }
    }

    /// Assigned with a usable score.
    pub fn is_usable(&self) -> bool {
        self.is_assigned && self.score.is_finite()
    }
}

impl Default for Candidate {
    fn default() -> Self {
        Self::unassigned()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EyePair {
    pub is_left_assigned: bool,
    pub is_right_assigned: bool,
    pub x_left: u16,
    pub y_left: u16,
    pub x_right: u16,
    pub y_right: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IrisAnnulus {
    pub x_center: u16,
    pub y_center: u16,
    pub inner_radius: u16,
    pub outer_radius: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_follows_modality() {
        assert_eq!(Modality::Face.polarity(), ScorePolarity::Similarity);
        assert_eq!(Modality::Multimodal.polarity(), ScorePolarity::Similarity);
        assert_eq!(Modality::Iris.polarity(), ScorePolarity::Dissimilarity);
    }

    #[test]
    fn test_rank_orders_most_relevant_first() {
        let mut scores = vec![0.2, 0.9, 0.5];
        scores.sort_by(|a, b| ScorePolarity::Similarity.rank(*a, *b));
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);

        scores.sort_by(|a, b| ScorePolarity::Dissimilarity.rank(*a, *b));
        assert_eq!(scores, vec![0.2, 0.5, 0.9]);
    }

    #[test]
    fn test_unassigned_candidate_is_not_usable() {
        assert!(!Candidate::unassigned().is_usable());
        assert!(!Candidate::assigned("E1", f64::NAN).is_usable());
        assert!(Candidate::assigned("E1", 0.3).is_usable());
    }

    #[test]
    fn test_modality_parsing() {
        assert_eq!("IRIS".parse::<Modality>().unwrap(), Modality::Iris);
        assert!("palm".parse::<Modality>().is_err());
        assert_eq!(
            "unconsolidated".parse::<GalleryType>().unwrap(),
            GalleryType::Unconsolidated
        );
    }
}
