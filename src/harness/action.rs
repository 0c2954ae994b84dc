// src/harness/action.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::{ImageDescription, ImageLabel, QualityMeasure, Role, TemplateRole};
use crate::utils::error::{HarnessError, Result};

/// Literal written for values a plugin did not compute.
pub const NOT_AVAILABLE: &str = "NA";

/// One kind of harness invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Quality,
    DetectMorph,
    DetectMorphDiff,
    Compare,
    Enroll,
    Finalize,
    Search,
}

/// How many image references follow the identifier on an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageCount {
    Exactly(usize),
    AtLeastOne,
}

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub images: Vec<PathBuf>,
    pub label: Option<String>,
}

impl WorkItem {
    /// Image references as one log column.
    pub fn images_column(&self) -> String {
        self.images
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Quality,
        Action::DetectMorph,
        Action::DetectMorphDiff,
        Action::Compare,
        Action::Enroll,
        Action::Finalize,
        Action::Search,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Action::Quality => "quality",
            Action::DetectMorph => "detect-morph",
            Action::DetectMorphDiff => "detect-morph-diff",
            Action::Compare => "compare",
            Action::Enroll => "enroll",
            Action::Finalize => "finalize",
            Action::Search => "search",
        }
    }

    /// Finalize runs once in the supervising process; everything else is
    /// partitioned across workers.
    pub fn is_sharded(self) -> bool {
        self != Action::Finalize
    }

    pub fn role(self) -> Role {
        match self {
            Action::Quality => Role::Quality,
            Action::DetectMorph | Action::DetectMorphDiff => Role::MorphDetection,
            Action::Compare => Role::Comparison,
            Action::Enroll | Action::Finalize => Role::Template(TemplateRole::Enrollment1N),
            Action::Search => Role::Template(TemplateRole::Search1N),
        }
    }

    fn layout(self) -> (ImageCount, bool) {
        match self {
            Action::Quality | Action::DetectMorph => (ImageCount::Exactly(1), true),
            Action::DetectMorphDiff => (ImageCount::Exactly(2), true),
            Action::Compare => (ImageCount::Exactly(2), false),
            Action::Enroll | Action::Search => (ImageCount::AtLeastOne, false),
            Action::Finalize => (ImageCount::Exactly(0), false),
        }
    }

    /// Parses one input line. `line_no` is only used for diagnostics.
    pub fn parse_item(self, line_no: usize, line: &str) -> Result<WorkItem> {
        let mut fields = line.split_whitespace();
        let id = fields.next().ok_or_else(|| HarnessError::Input {
            line: line_no,
            reason: "empty line".into(),
        })?;
        let rest: Vec<&str> = fields.collect();

        let (images, labelled) = self.layout();
        let (image_fields, label) = match images {
            ImageCount::AtLeastOne if !rest.is_empty() => (&rest[..], None),
            ImageCount::Exactly(n) if rest.len() == n => (&rest[..], None),
            ImageCount::Exactly(n) if labelled && rest.len() == n + 1 => {
                (&rest[..n], Some(rest[n].to_string()))
            }
            _ => {
                return Err(HarnessError::Input {
                    line: line_no,
                    reason: format!(
                        "'{}' does not match the {} layout: {}",
                        line.trim(),
                        self,
                        self.layout_hint()
                    ),
                })
            }
        };

        if let Some(label) = label.as_deref() {
            self.check_label(label).map_err(|e| HarnessError::Input {
                line: line_no,
                reason: e.to_string(),
            })?;
        }

        Ok(WorkItem {
            id: id.to_string(),
            images: image_fields.iter().map(PathBuf::from).collect(),
            label,
        })
    }

    fn check_label(self, label: &str) -> Result<()> {
        match self {
            Action::Quality => label.parse::<ImageDescription>().map(drop),
            Action::DetectMorph | Action::DetectMorphDiff => label.parse::<ImageLabel>().map(drop),
            _ => Ok(()),
        }
    }

    fn layout_hint(self) -> &'static str {
        match self {
            Action::Quality => "id image [description]",
            Action::DetectMorph => "id image [imageLabel]",
            Action::DetectMorphDiff => "id suspect probe [imageLabel]",
            Action::Compare => "id enrollImage verifImage",
            Action::Enroll | Action::Search => "id image [image...]",
            Action::Finalize => "no input",
        }
    }

    /// Column header of this action's log.
    pub fn header(self, top_k: u32) -> String {
        let mut columns: Vec<String> = match self {
            Action::Quality => ["id", "image", "returnCode", "bb_xleft", "bb_ytop", "bb_width", "bb_height"]
                .iter()
                .map(|c| c.to_string())
                .chain(QualityMeasure::ALL.iter().map(|m| m.to_string()))
                .collect(),
            Action::DetectMorph => vec!["id", "image", "returnCode", "isMorph", "score"]
                .into_iter()
                .map(String::from)
                .collect(),
            Action::DetectMorphDiff => vec!["id", "suspect", "probe", "returnCode", "isMorph", "score"]
                .into_iter()
                .map(String::from)
                .collect(),
            Action::Compare => vec!["id", "enrollImage", "verifImage", "returnCode", "similarity"]
                .into_iter()
                .map(String::from)
                .collect(),
            Action::Enroll => vec!["id", "images", "returnCode", "templateSize"]
                .into_iter()
                .map(String::from)
                .collect(),
            Action::Search => vec!["id", "images", "returnCode"]
                .into_iter()
                .map(String::from)
                .collect(),
            Action::Finalize => Vec::new(),
        };
        if self == Action::Search {
            for k in 0..top_k {
                columns.push(format!("candidate{}_id", k));
                columns.push(format!("candidate{}_score", k));
            }
        }
        columns.join(" ")
    }

    /// Index of the return code column in a log record.
    pub fn return_code_column(self) -> usize {
        match self {
            Action::DetectMorphDiff | Action::Compare => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Action::ALL
            .into_iter()
            .find(|action| action.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Action::ALL.iter().map(|a| a.name()).collect();
                HarnessError::Config(format!(
                    "Unknown action '{}', expected one of: {}",
                    s,
                    known.join(", ")
                ))
            })
    }
}
