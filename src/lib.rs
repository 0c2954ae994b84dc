pub mod core;
pub mod harness;
pub mod plugins;
pub mod storage;
pub mod utils;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    core::identity::GalleryLifecycle,
    core::{GalleryType, Modality, ReturnStatus},
    harness::{
        aggregate::{self, AggregateReport},
        partition, Action, PartitionPlan, ShardOutcome, ShardReport, Supervisor, Verdict,
        WorkerDriver,
    },
    plugins::{PluginManager, PluginRegistry, VersionManager},
    storage::{merge_parts, GallerySeal},
    utils::{
        config::HarnessConfig,
        error::{HarnessError, Result},
    },
};

/// Result of one harness invocation.
#[derive(Debug)]
pub struct RunOutcome {
    pub verdict: Verdict,
    pub report: Option<AggregateReport>,
}

impl RunOutcome {
    fn bare(verdict: Verdict) -> Self {
        Self {
            verdict,
            report: None,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.verdict.exit_code()
    }
}

fn verdict_of(status: &ReturnStatus) -> Verdict {
    if status.is_success() {
        Verdict::Success
    } else if status.is_not_implemented() {
        Verdict::NotImplemented
    } else {
        Verdict::Failure
    }
}

/// Drives one action against one implementation.
pub struct Harness {
    config: HarnessConfig,
    action: Action,
    plugins: PluginManager,
    modality: Modality,
    gallery_type: GalleryType,
}

impl Harness {
    /// Loads the configured implementation and checks its interface versions.
    pub fn new(config: HarnessConfig, action: Action) -> Result<Self> {
        let plugins = PluginManager::load(&config.plugin_source(), &PluginRegistry::with_builtins())?;
        Self::with_plugin(config, action, plugins)
    }

    pub fn with_plugin(config: HarnessConfig, action: Action, plugins: PluginManager) -> Result<Self> {
        config.validate()?;
        plugins.check_version(&VersionManager::new()?)?;
        let metadata = plugins.metadata();
        info!(
            implementation = %metadata.name,
            version = %metadata.version,
            dynamic = plugins.is_dynamic(),
            "Implementation loaded"
        );
        Ok(Self {
            modality: config.modality()?,
            gallery_type: config.gallery_type()?,
            config,
            action,
            plugins,
        })
    }

    fn stem(&self) -> String {
        self.config
            .run
            .stem
            .clone()
            .unwrap_or_else(|| self.action.name().to_string())
    }

    pub fn run(mut self) -> Result<RunOutcome> {
        let started_at = Utc::now();
        info!(action = %self.action, "Starting run");

        if self.action == Action::Finalize {
            return self.finalize();
        }

        let paths = self.config.gallery_paths();
        let mut gallery = match self.action {
            Action::Enroll => {
                if GallerySeal::load(&paths)?.is_some() {
                    return Err(HarnessError::AlreadyFinalized(paths.blob));
                }
                None
            }
            Action::Search => Some(GalleryLifecycle::open(paths)?),
            _ => None,
        };

        let input = self.config.run.input.clone().ok_or_else(|| {
            HarnessError::Config(format!("The {} action requires an input file", self.action))
        })?;

        let config_dir = self.config.run.config_dir.clone();
        let status = self.plugins.initialize(&config_dir, self.action.role())?;
        if !status.is_success() {
            warn!(status = %status, "Initialization did not succeed; nothing was processed");
            return Ok(RunOutcome::bare(verdict_of(&status)));
        }
        if let Some(gallery) = gallery.as_mut() {
            let status = gallery.initialize_identification(self.plugins.implementation_mut(), &config_dir)?;
            if !status.is_success() {
                warn!(status = %status, "Identification initialization did not succeed");
                return Ok(RunOutcome::bare(verdict_of(&status)));
            }
        }

        let stem = self.stem();
        let plan = partition::partition(
            self.action,
            &input,
            &self.config.run.output_dir,
            &stem,
            self.config.run.workers,
        )?;

        let shards = self.supervise(&plan, gallery.as_ref())?;
        let mut verdict = Verdict::reduce(shards.iter().map(|s| &s.outcome));
        let declined = shards.iter().any(|s| s.outcome.is_not_implemented());
        self.clean_up(&plan, &shards, verdict, declined);

        if declined {
            info!(action = %self.action, verdict = ?verdict, "Implementation declined the action; no logs kept");
            return Ok(RunOutcome::bare(verdict));
        }
        if self.action == Action::Enroll && verdict == Verdict::Success {
            merge_parts(&plan.enrollment_parts(), &self.config.gallery_paths())?;
        }

        let top_k = self.config.run.top_k;
        let reconciliation = aggregate::block_on(aggregate::reconcile(&plan, top_k))??;
        if !reconciliation.is_complete() {
            error!(
                missing = ?reconciliation.missing,
                duplicated = ?reconciliation.duplicated,
                unexpected = ?reconciliation.unexpected,
                "Logged items do not match the input"
            );
            verdict = Verdict::Failure;
        }
        for (code, count) in reconciliation.non_success_by_code() {
            warn!(code = %code, count, "Items flagged for review");
        }

        let report = AggregateReport {
            run_id: Uuid::new_v4(),
            action: self.action,
            implementation: self.plugins.metadata().name,
            started_at,
            finished_at: Utc::now(),
            verdict,
            shards,
            non_success_by_code: reconciliation.non_success_by_code(),
            reconciliation,
        };
        let merge = self.config.aggregate.merge_logs;
        let write_report = self.config.aggregate.write_report;
        aggregate::block_on(async {
            if merge {
                aggregate::merge_logs(&plan, top_k).await?;
            }
            if write_report {
                report.write(&AggregateReport::path(&plan)).await?;
            }
            Ok::<_, HarnessError>(())
        })??;

        info!(action = %self.action, verdict = ?verdict, "Run finished");
        Ok(RunOutcome {
            verdict,
            report: Some(report),
        })
    }

    fn finalize(&mut self) -> Result<RunOutcome> {
        let mut gallery = GalleryLifecycle::open(self.config.gallery_paths())?;
        let status = gallery.finalize(
            self.plugins.implementation_mut(),
            &self.config.run.config_dir,
            self.gallery_type,
        )?;
        if !status.is_success() {
            warn!(status = %status, "Finalization did not succeed");
        }
        Ok(RunOutcome::bare(verdict_of(&status)))
    }

    fn supervise(
        &self,
        plan: &PartitionPlan,
        gallery: Option<&GalleryLifecycle>,
    ) -> Result<Vec<ShardReport>> {
        let plugin = self.plugins.implementation();
        let top_k = self.config.run.top_k;
        Supervisor::new(self.config.retry_policy()).run(&plan.shards, |shard| {
            let mut driver = WorkerDriver::new(self.action, shard, plugin)
                .with_modality(self.modality)
                .with_top_k(top_k);
            if let Some(gallery) = gallery {
                driver = driver.with_gallery(gallery);
            }
            if self.action == Action::Enroll {
                driver = driver.with_enrollment_part(shard.enrollment_part(&plan.output_dir, &plan.stem));
            }
            driver.run()
        })
    }

    /// Removes output that must not outlive the run. Once any worker declined
    /// the action, nothing it logged is kept.
    fn clean_up(&self, plan: &PartitionPlan, shards: &[ShardReport], verdict: Verdict, declined: bool) {
        for (shard, report) in plan.shards.iter().zip(shards) {
            partition::remove_if_present(&shard.input);
            if matches!(report.outcome, ShardOutcome::Signaled(_)) {
                partition::remove_if_present(&shard.log);
            }
        }
        if declined {
            plan.remove_outputs();
        }
        if self.action == Action::Enroll && verdict != Verdict::Success {
            for part in plan.enrollment_parts() {
                part.remove();
            }
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }
}
