// src/utils/config.rs
use config::{Config as ConfigLib, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::{GalleryType, Modality};
use crate::harness::supervisor::RetryPolicy;
use crate::plugins::manager::PluginSource;
use crate::plugins::official::reference::ReferenceImplementation;
use crate::storage::GalleryPaths;
use crate::utils::error::{HarnessError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    pub run: RunConfig,
    pub plugin: PluginConfig,
    pub gallery: GalleryConfig,
    pub supervisor: SupervisorConfig,
    pub aggregate: AggregateConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub config_dir: PathBuf,
    pub output_dir: PathBuf,
    pub stem: Option<String>,
    pub input: Option<PathBuf>,
    pub workers: usize,
    pub modality: String,
    pub top_k: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    pub implementation: String,
    pub library: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GalleryConfig {
    pub gallery_type: String,
    pub enrollment_dir: Option<PathBuf>,
    pub blob: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    pub crash_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregateConfig {
    pub merge_logs: bool,
    pub write_report: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

/// Values given on the command line. They win over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub stem: Option<String>,
    pub input: Option<PathBuf>,
    pub workers: Option<usize>,
    pub modality: Option<String>,
    pub top_k: Option<u32>,
    pub implementation: Option<String>,
    pub library: Option<PathBuf>,
    pub gallery_type: Option<String>,
    pub enrollment_dir: Option<PathBuf>,
    pub crash_retries: Option<u32>,
    pub merge_logs: Option<bool>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

fn path_value(path: Option<&PathBuf>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

impl HarnessConfig {
    fn defaults() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
        ConfigLib::builder()
            .set_default("run.config_dir", "config")?
            .set_default("run.output_dir", "output")?
            .set_default("run.workers", 1)?
            .set_default("run.modality", "face")?
            .set_default("run.top_k", 20)?
            .set_default("plugin.implementation", ReferenceImplementation::NAME)?
            .set_default("gallery.gallery_type", "consolidated")?
            .set_default("supervisor.crash_retries", 0)?
            .set_default("aggregate.merge_logs", false)?
            .set_default("aggregate.write_report", true)?
            .set_default("logging.level", "info")
    }

    /// Defaults, then `file`, then `BIOVALIDATE_SECTION__KEY` variables, then
    /// `overrides`.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }

        builder = builder
            .add_source(
                Environment::with_prefix("BIOVALIDATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("run.config_dir", path_value(overrides.config_dir.as_ref()))?
            .set_override_option("run.output_dir", path_value(overrides.output_dir.as_ref()))?
            .set_override_option("run.stem", overrides.stem.clone())?
            .set_override_option("run.input", path_value(overrides.input.as_ref()))?
            .set_override_option("run.workers", overrides.workers.map(|v| v as i64))?
            .set_override_option("run.modality", overrides.modality.clone())?
            .set_override_option("run.top_k", overrides.top_k.map(i64::from))?
            .set_override_option("plugin.implementation", overrides.implementation.clone())?
            .set_override_option("plugin.library", path_value(overrides.library.as_ref()))?
            .set_override_option("gallery.gallery_type", overrides.gallery_type.clone())?
            .set_override_option(
                "gallery.enrollment_dir",
                path_value(overrides.enrollment_dir.as_ref()),
            )?
            .set_override_option(
                "supervisor.crash_retries",
                overrides.crash_retries.map(i64::from),
            )?
            .set_override_option("aggregate.merge_logs", overrides.merge_logs)?
            .set_override_option("logging.level", overrides.log_level.clone())?
            .set_override_option("logging.file", path_value(overrides.log_file.as_ref()))?;

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.workers == 0 {
            return Err(HarnessError::Config("workers must be greater than 0".into()));
        }
        if self.run.top_k == 0 {
            return Err(HarnessError::Config("top_k must be greater than 0".into()));
        }
        if self.run.stem.as_deref().is_some_and(|s| s.is_empty() || s.contains('/')) {
            return Err(HarnessError::Config("stem must be a plain file name".into()));
        }
        self.modality()?;
        self.gallery_type()?;
        if self.plugin.library.is_none() && self.plugin.implementation.trim().is_empty() {
            return Err(HarnessError::Config(
                "Either an implementation name or a library path must be set".into(),
            ));
        }
        Ok(())
    }

    pub fn modality(&self) -> Result<Modality> {
        self.run.modality.parse()
    }

    pub fn gallery_type(&self) -> Result<GalleryType> {
        self.gallery.gallery_type.parse()
    }

    pub fn plugin_source(&self) -> PluginSource {
        match &self.plugin.library {
            Some(path) => PluginSource::Library(path.clone()),
            None => PluginSource::Builtin(self.plugin.implementation.clone()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            crash_retries: self.supervisor.crash_retries,
        }
    }

    /// Gallery locations; unset ones live in the output directory.
    pub fn gallery_paths(&self) -> GalleryPaths {
        let output = &self.run.output_dir;
        GalleryPaths::new(
            self.gallery
                .enrollment_dir
                .clone()
                .unwrap_or_else(|| output.join("enroll")),
            self.gallery
                .blob
                .clone()
                .unwrap_or_else(|| output.join("enroll.edb")),
            self.gallery
                .manifest
                .clone()
                .unwrap_or_else(|| output.join("enroll.manifest")),
        )
    }
}

impl From<ConfigError> for HarnessError {
    fn from(error: ConfigError) -> Self {
        HarnessError::Config(error.to_string())
    }
}
