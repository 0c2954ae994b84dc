// src/harness/record.rs
use std::fmt::Display;

use crate::core::{Candidate, ReturnStatus};
use crate::harness::action::NOT_AVAILABLE;

/// Builder for one space-separated log line.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    pub fn new(id: &str) -> Self {
        Self {
            fields: vec![id.to_string()],
        }
    }

    pub fn field(mut self, value: impl Display) -> Self {
        self.fields.push(value.to_string());
        self
    }

    pub fn code(self, status: &ReturnStatus) -> Self {
        self.field(status.code.as_u8())
    }

    pub fn not_available(self) -> Self {
        self.field(NOT_AVAILABLE)
    }

    pub fn optional(self, value: Option<impl Display>) -> Self {
        match value {
            Some(value) => self.field(value),
            None => self.not_available(),
        }
    }

    pub fn flag(self, value: bool) -> Self {
        self.field(u8::from(value))
    }

    pub fn candidate(self, candidate: &Candidate) -> Self {
        if candidate.is_assigned {
            self.field(&candidate.template_id).field(candidate.score)
        } else {
            self.not_available().not_available()
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn finish(self) -> String {
        self.fields.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ReturnCode;

    #[test]
    fn test_absent_values_render_as_marker() {
        let line = Record::new("M1")
            .field("a.png")
            .code(&ReturnStatus::new(ReturnCode::DetectionError, "no face"))
            .not_available()
            .optional(None::<f64>)
            .finish();
        assert_eq!(line, "M1 a.png 8 NA NA");
    }

    #[test]
    fn test_candidates_and_flags() {
        let line = Record::new("S1")
            .flag(true)
            .candidate(&Candidate::assigned("E7", 0.5))
            .candidate(&Candidate::unassigned())
            .finish();
        assert_eq!(line, "S1 1 E7 0.5 NA NA");
    }
}
