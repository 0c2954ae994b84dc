// src/harness/worker.rs
//! Runs one shard against the implementation, inside a forked process.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::identity::GalleryLifecycle;
use crate::core::{
    Image, ImageDescription, ImageLabel, Media, Modality, QualityMeasure, ReturnStatus,
    TemplateRole,
};
use crate::harness::action::{Action, WorkItem};
use crate::harness::partition::{remove_if_present, Shard};
use crate::harness::record::Record;
use crate::plugins::traits::Interface;
use crate::storage::{EnrollmentPart, EnrollmentPartWriter};
use crate::utils::error::{HarnessError, Result};
use crate::utils::metrics::WorkerMetrics;

/// Process exit status of a worker. The numeric values are shared with the
/// harness binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerExit {
    Success,
    Failure,
    NotImplemented,
}

impl WorkerExit {
    pub fn code(self) -> i32 {
        match self {
            WorkerExit::Success => 0,
            WorkerExit::Failure => 1,
            WorkerExit::NotImplemented => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(WorkerExit::Success),
            1 => Some(WorkerExit::Failure),
            2 => Some(WorkerExit::NotImplemented),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WorkerExit::Success => "success",
            WorkerExit::Failure => "failure",
            WorkerExit::NotImplemented => "not_implemented",
        }
    }
}

enum Flow {
    Completed,
    NotImplemented,
}

struct ItemOutcome {
    status: ReturnStatus,
    line: String,
}

pub struct WorkerDriver<'a> {
    action: Action,
    shard: &'a Shard,
    plugin: &'a dyn Interface,
    gallery: Option<&'a GalleryLifecycle>,
    enrollment_part: Option<EnrollmentPart>,
    modality: Modality,
    top_k: u32,
}

impl<'a> WorkerDriver<'a> {
    pub fn new(action: Action, shard: &'a Shard, plugin: &'a dyn Interface) -> Self {
        Self {
            action,
            shard,
            plugin,
            gallery: None,
            enrollment_part: None,
            modality: Modality::default(),
            top_k: 1,
        }
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_gallery(mut self, gallery: &'a GalleryLifecycle) -> Self {
        self.gallery = Some(gallery);
        self
    }

    pub fn with_enrollment_part(mut self, part: EnrollmentPart) -> Self {
        self.enrollment_part = Some(part);
        self
    }

    /// Processes the whole shard and returns the exit status. Partial output
    /// is removed unless the shard completed. The shard input is left for the
    /// supervising process, which may fork the shard again.
    pub fn run(self) -> WorkerExit {
        let mut metrics = WorkerMetrics::new(self.shard.index);
        let exit = match self.process(&mut metrics) {
            Ok(Flow::Completed) => WorkerExit::Success,
            Ok(Flow::NotImplemented) => {
                info!(shard = self.shard.index, action = %self.action, "Implementation declined the action");
                self.discard_output();
                WorkerExit::NotImplemented
            }
            Err(e) => {
                error!(shard = self.shard.index, action = %self.action, "Worker aborted: {}", e);
                self.discard_output();
                WorkerExit::Failure
            }
        };
        metrics.report(exit.name());
        exit
    }

    fn discard_output(&self) {
        remove_if_present(&self.shard.log);
        if let Some(part) = &self.enrollment_part {
            part.remove();
        }
    }

    fn process(&self, metrics: &mut WorkerMetrics) -> Result<Flow> {
        let input = BufReader::new(File::open(&self.shard.input).map_err(|e| {
            HarnessError::ResourceLoad {
                path: self.shard.input.clone(),
                reason: e.to_string(),
            }
        })?);
        let mut log = BufWriter::new(File::create(&self.shard.log)?);
        writeln!(log, "{}", self.action.header(self.top_k))?;

        let mut part = match (self.action, &self.enrollment_part) {
            (Action::Enroll, Some(part)) => Some(EnrollmentPartWriter::create(part.clone())?),
            (Action::Enroll, None) => {
                return Err(HarnessError::Config(
                    "Enroll worker started without an enrollment part".into(),
                ))
            }
            _ => None,
        };

        for (index, line) in input.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let item = self.action.parse_item(index + 1, &line)?;

            let started = Instant::now();
            let Some(outcome) = self.process_item(&item, part.as_mut())? else {
                return Ok(Flow::NotImplemented);
            };
            metrics.record_item(started.elapsed(), &outcome.status);
            if !outcome.status.is_success() {
                debug!(id = %item.id, status = %outcome.status, "Item not processed successfully");
            }
            writeln!(log, "{}", outcome.line)?;
        }

        log.flush()?;
        if let Some(part) = part {
            part.finish()?;
        }
        Ok(Flow::Completed)
    }

    fn load_images(item: &WorkItem) -> Result<Vec<Image>> {
        item.images.iter().map(|path| Image::load(path)).collect()
    }

    /// `None` when the implementation reports the action as unsupported.
    fn process_item(
        &self,
        item: &WorkItem,
        part: Option<&mut EnrollmentPartWriter>,
    ) -> Result<Option<ItemOutcome>> {
        let images = Self::load_images(item)?;
        let record = Record::new(&item.id).field(item.images_column());

        let (status, record) = match self.action {
            Action::Quality => {
                let description = item
                    .label
                    .as_deref()
                    .map(str::parse::<ImageDescription>)
                    .transpose()?
                    .unwrap_or_default();
                let face = images[0].clone().with_description(description);
                let result = self.plugin.vector_quality(&face);
                if result.status.is_not_implemented() {
                    return Ok(None);
                }

                let bb = &result.assessment.bounding_box;
                let mut record = record
                    .code(&result.status)
                    .field(bb.xleft)
                    .field(bb.ytop)
                    .field(bb.width)
                    .field(bb.height);
                for measure in QualityMeasure::ALL {
                    record = record.optional(result.assessment.get(measure));
                }
                (result.status, record)
            }
            Action::DetectMorph | Action::DetectMorphDiff => {
                let label = item
                    .label
                    .as_deref()
                    .map(str::parse::<ImageLabel>)
                    .transpose()?
                    .unwrap_or_default();
                let result = match self.action {
                    Action::DetectMorph => self.plugin.detect_morph(&images[0], label),
                    _ => self
                        .plugin
                        .detect_morph_differentially(&images[0], label, &images[1], None),
                };
                if result.status.is_not_implemented() {
                    return Ok(None);
                }

                let record = record.code(&result.status);
                let record = if result.status.is_success() {
                    record.flag(result.is_morph)
                } else {
                    record.not_available()
                };
                (result.status, record.optional(result.score))
            }
            Action::Compare => {
                let result = self.plugin.compare_images(&images[0], &images[1]);
                if result.status.is_not_implemented() {
                    return Ok(None);
                }
                let record = record.code(&result.status).optional(result.similarity);
                (result.status, record)
            }
            Action::Enroll => {
                let result = self.plugin.create_template(
                    &Media::still(images),
                    TemplateRole::Enrollment1N,
                    self.modality,
                );
                if result.status.is_not_implemented() {
                    return Ok(None);
                }
                let part = part.ok_or_else(|| {
                    HarnessError::Config("Enroll worker has no enrollment part".into())
                })?;
                part.append(&item.id, &result.template)?;
                let record = record.code(&result.status).field(result.template.len());
                (result.status, record)
            }
            Action::Search => {
                let gallery = self.gallery.ok_or_else(|| {
                    HarnessError::Gallery("Search requires an initialized gallery".into())
                })?;
                let result = self.plugin.create_template(
                    &Media::still(images),
                    TemplateRole::Search1N,
                    self.modality,
                );
                if result.status.is_not_implemented() {
                    return Ok(None);
                }
                if !result.status.is_success() {
                    let mut record = record.code(&result.status);
                    for _ in 0..self.top_k {
                        record = record.not_available().not_available();
                    }
                    (result.status, record)
                } else {
                    let found = gallery.search(
                        self.plugin,
                        &result.template,
                        self.top_k,
                        self.modality.polarity(),
                    )?;
                    if found.status.is_not_implemented() {
                        return Ok(None);
                    }
                    let mut record = record.code(&found.status);
                    for candidate in &found.candidates {
                        record = record.candidate(candidate);
                    }
                    (found.status, record)
                }
            }
            Action::Finalize => {
                warn!("Finalize has no per-item work");
                return Err(HarnessError::Config(
                    "Finalize is not a sharded action".into(),
                ));
            }
        };

        Ok(Some(ItemOutcome {
            status,
            line: record.finish(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ReturnCode, Template};
    use crate::plugins::official::reference::ReferenceImplementation;
    use crate::plugins::traits::MockInterface;
    use crate::plugins::types::{ComparisonResult, TemplateResult};
    use crate::storage::Manifest;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;
    use test_log::test;

    fn write_png(path: &Path, value: u8) {
        image::GrayImage::from_pixel(8, 8, image::Luma([value]))
            .save(path)
            .unwrap();
    }

    fn shard(dir: &Path, lines: &[&str]) -> Shard {
        let mut shard = Shard::new(dir, "test", 0);
        fs::write(&shard.input, lines.join("\n") + "\n").unwrap();
        shard.ids = lines
            .iter()
            .map(|l| l.split_whitespace().next().unwrap().to_string())
            .collect();
        shard
    }

    #[test]
    fn test_compare_writes_one_record_per_item() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_png(&a, 40);
        write_png(&b, 40);
        let line1 = format!("C1 {} {}", a.display(), b.display());
        let line2 = format!("C2 {} {}", b.display(), a.display());
        let shard = shard(dir.path(), &[&line1, &line2]);

        let plugin = ReferenceImplementation::new();
        let exit = WorkerDriver::new(Action::Compare, &shard, &plugin).run();
        assert_eq!(exit, WorkerExit::Success);
        assert!(shard.input.exists());

        let log = fs::read_to_string(&shard.log).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], Action::Compare.header(1));
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("C1 "));
        assert!(lines[1].ends_with(" 0 1"));
        assert!(lines[2].starts_with("C2 "));
    }

    #[test]
    fn test_not_implemented_removes_log() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        write_png(&a, 90);
        let line = format!("M1 {}", a.display());
        let shard = shard(dir.path(), &[&line, &line.replace("M1", "M2")]);

        let plugin = ReferenceImplementation::new();
        let exit = WorkerDriver::new(Action::DetectMorph, &shard, &plugin).run();
        assert_eq!(exit, WorkerExit::NotImplemented);
        assert_eq!(exit.code(), 2);
        assert!(!shard.log.exists());
        assert!(shard.input.exists());
    }

    #[test]
    fn test_missing_image_is_fatal() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.png");
        let line = format!("C1 {} {}", missing.display(), missing.display());
        let shard = shard(dir.path(), &[&line]);

        let mut mock = MockInterface::new();
        mock.expect_compare_images().never();
        let exit = WorkerDriver::new(Action::Compare, &shard, &mock).run();
        assert_eq!(exit, WorkerExit::Failure);
        assert!(!shard.log.exists());
    }

    #[test]
    fn test_item_failures_are_logged_not_fatal() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        write_png(&a, 10);
        let line = format!("C1 {} {}", a.display(), a.display());
        let shard = shard(dir.path(), &[&line, &line.replace("C1", "C2")]);

        let mut mock = MockInterface::new();
        mock.expect_compare_images().times(2).returning(|_, _| ComparisonResult {
            status: ReturnStatus::new(ReturnCode::ExtractError, "no face"),
            similarity: None,
        });
        let exit = WorkerDriver::new(Action::Compare, &shard, &mock).run();
        assert_eq!(exit, WorkerExit::Success);

        let log = fs::read_to_string(&shard.log).unwrap();
        assert_eq!(log.lines().count(), 3);
        assert!(log.lines().skip(1).all(|l| l.ends_with(" 4 NA")));
    }

    #[test]
    fn test_enroll_keeps_empty_templates() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        write_png(&a, 10);
        let line = format!("E1 {}", a.display());
        let shard = shard(dir.path(), &[&line, &line.replace("E1", "E2")]);
        let part = shard.enrollment_part(dir.path(), "test");

        let mut mock = MockInterface::new();
        let mut calls = 0;
        mock.expect_create_template().times(2).returning(move |_, _, _| {
            calls += 1;
            let mut result = TemplateResult::unsupported();
            if calls == 1 {
                result.status = ReturnStatus::success();
                result.template = Template(vec![1, 2, 3]);
            } else {
                result.status = ReturnStatus::new(ReturnCode::RefuseInput, "");
            }
            result
        });

        let exit = WorkerDriver::new(Action::Enroll, &shard, &mock)
            .with_enrollment_part(part.clone())
            .run();
        assert_eq!(exit, WorkerExit::Success);

        let manifest = Manifest::load(&part.manifest).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries()[1].length, 0);
        assert_eq!(fs::read(&part.blob).unwrap(), vec![1, 2, 3]);

        let log = fs::read_to_string(&shard.log).unwrap();
        assert!(log.contains(" 0 3"));
        assert!(log.contains(" 3 0"));
    }

    #[test]
    fn test_empty_shard_succeeds_with_header_only() {
        let dir = tempdir().unwrap();
        let shard = Shard::new(dir.path(), "test", 3);
        fs::write(&shard.input, "").unwrap();

        let plugin = ReferenceImplementation::new();
        let exit = WorkerDriver::new(Action::Quality, &shard, &plugin).run();
        assert_eq!(exit, WorkerExit::Success);
        assert_eq!(fs::read_to_string(&shard.log).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_exit_codes_round_trip() {
        for exit in [WorkerExit::Success, WorkerExit::Failure, WorkerExit::NotImplemented] {
            assert_eq!(WorkerExit::from_code(exit.code()), Some(exit));
        }
        assert_eq!(WorkerExit::from_code(9), None);
    }
}
