// src/core/status.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome kinds of a plugin call. The discriminants are the integers written
/// to shard logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReturnCode {
    Success = 0,
    UnknownError = 1,
    ConfigError = 2,
    RefuseInput = 3,
    ExtractError = 4,
    ParseError = 5,
    TemplateCreationError = 6,
    VerifTemplateError = 7,
    DetectionError = 8,
    NumDataError = 9,
    TemplateFormatError = 10,
    EnrollDirError = 11,
    InputLocationError = 12,
    MemoryError = 13,
    NotImplemented = 14,
    VendorError = 15,
}

impl ReturnCode {
    pub const ALL: [ReturnCode; 16] = [
        ReturnCode::Success,
        ReturnCode::UnknownError,
        ReturnCode::ConfigError,
        ReturnCode::RefuseInput,
        ReturnCode::ExtractError,
        ReturnCode::ParseError,
        ReturnCode::TemplateCreationError,
        ReturnCode::VerifTemplateError,
        ReturnCode::DetectionError,
        ReturnCode::NumDataError,
        ReturnCode::TemplateFormatError,
        ReturnCode::EnrollDirError,
        ReturnCode::InputLocationError,
        ReturnCode::MemoryError,
        ReturnCode::NotImplemented,
        ReturnCode::VendorError,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn is_success(self) -> bool {
        self == ReturnCode::Success
    }

    fn description(self) -> &'static str {
        match self {
            ReturnCode::Success => "Success",
            ReturnCode::UnknownError => "Unknown error",
            ReturnCode::ConfigError => "Error reading configuration files",
            ReturnCode::RefuseInput => "Elective refusal to process the input",
            ReturnCode::ExtractError => "Involuntary failure to process the image",
            ReturnCode::ParseError => "Cannot parse the input data",
            ReturnCode::TemplateCreationError => "Elective refusal to produce a template",
            ReturnCode::VerifTemplateError => {
                "Either or both of the input templates were result of failed feature extraction"
            }
            ReturnCode::DetectionError => "Unable to detect a face or iris in the image",
            ReturnCode::NumDataError => "Number of input images not supported",
            ReturnCode::TemplateFormatError => "Template file is an incorrect format or defective",
            ReturnCode::EnrollDirError => "An operation on the enrollment directory failed",
            ReturnCode::InputLocationError => "Cannot locate the input data",
            ReturnCode::MemoryError => "Memory allocation failed",
            ReturnCode::NotImplemented => "Function is not implemented",
            ReturnCode::VendorError => "Vendor-defined error",
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Result of every plugin call: a code plus optional free-text diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnStatus {
    pub code: ReturnCode,
    pub info: String,
}

impl ReturnStatus {
    pub fn new(code: ReturnCode, info: impl Into<String>) -> Self {
        Self {
            code,
            info: info.into(),
        }
    }

    pub fn success() -> Self {
        Self::new(ReturnCode::Success, "")
    }

    pub fn not_implemented() -> Self {
        Self::new(ReturnCode::NotImplemented, "")
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    pub fn is_not_implemented(&self) -> bool {
        self.code == ReturnCode::NotImplemented
    }
}

impl From<ReturnCode> for ReturnStatus {
    fn from(code: ReturnCode) -> Self {
        Self::new(code, "")
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.info.is_empty() {
            write!(f, "{} ({})", self.code, self.code.as_u8())
        } else {
            write!(f, "{} ({}): {}", self.code, self.code.as_u8(), self.info)
        }
    }
}
