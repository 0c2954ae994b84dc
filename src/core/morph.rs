// src/core/morph.rs
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::utils::error::{HarnessError, Result};

/// Media type of a suspected morph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageLabel {
    #[default]
    Unknown,
    NonScanned,
    Scanned,
}

impl FromStr for ImageLabel {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(ImageLabel::Unknown),
            "nonscanned" | "non-scanned" => Ok(ImageLabel::NonScanned),
            "scanned" | "printandscan" => Ok(ImageLabel::Scanned),
            other => Err(HarnessError::Config(format!("Unknown image label '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    #[default]
    Unknown,
    Female,
    Male,
}

/// Optional subject information for differential morph detection. Ages are in
/// months; `None` is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubjectMetadata {
    pub sex: Sex,
    pub age_in_months: Option<u16>,
    pub age_delta_in_months: Option<u16>,
}
