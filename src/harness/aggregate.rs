// src/harness/aggregate.rs
//! Reconciles shard logs against the partition plan.
//!
//! Logs are read concurrently and consumed as they finish, so nothing here
//! depends on the order in which shards complete. A missing, duplicated or
//! unexpected identifier is a harness defect; a non-success return code is
//! data and is only flagged.

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::ReturnCode;
use crate::harness::action::Action;
use crate::harness::partition::PartitionPlan;
use crate::harness::supervisor::{ShardReport, Verdict};
use crate::utils::error::{HarnessError, Result};

/// A logged item whose return code was not success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedRecord {
    pub id: String,
    pub shard: usize,
    pub code: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub expected: usize,
    pub observed: usize,
    pub missing: Vec<String>,
    pub duplicated: Vec<String>,
    pub unexpected: Vec<String>,
    /// Records without a readable return code, as `shard:line`.
    pub malformed: Vec<String>,
    pub non_success: Vec<FlaggedRecord>,
}

impl Reconciliation {
    /// Every expected identifier was logged exactly once and nothing else was.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
            && self.duplicated.is_empty()
            && self.unexpected.is_empty()
            && self.malformed.is_empty()
    }

    pub fn non_success_by_code(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.non_success {
            let name = ReturnCode::from_u8(record.code)
                .map(|code| code.to_string())
                .unwrap_or_else(|| record.code.to_string());
            *counts.entry(name).or_default() += 1;
        }
        counts
    }
}

/// JSON run report written next to the logs.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub run_id: Uuid,
    pub action: Action,
    pub implementation: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub verdict: Verdict,
    pub shards: Vec<ShardReport>,
    pub reconciliation: Reconciliation,
    pub non_success_by_code: BTreeMap<String, usize>,
}

impl AggregateReport {
    pub fn path(plan: &PartitionPlan) -> PathBuf {
        plan.output_dir.join(format!("{}.report.json", plan.stem))
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, body).await?;
        info!(path = %path.display(), "Run report written");
        Ok(())
    }
}

struct ShardLog {
    index: usize,
    ids: Vec<String>,
    malformed: Vec<String>,
    non_success: Vec<FlaggedRecord>,
}

async fn read_shard_log(
    index: usize,
    path: PathBuf,
    header: String,
    code_column: usize,
) -> Result<ShardLog> {
    let mut log = ShardLog {
        index,
        ids: Vec::new(),
        malformed: Vec::new(),
        non_success: Vec::new(),
    };
    let body = match tokio::fs::read_to_string(&path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(shard = index, "No log for shard");
            return Ok(log);
        }
        Err(e) => return Err(e.into()),
    };

    let mut lines = body.lines().enumerate();
    match lines.next() {
        Some((_, first)) if first == header => {}
        Some(_) => {
            return Err(HarnessError::Serialization(format!(
                "{} does not start with the expected header",
                path.display()
            )))
        }
        None => return Ok(log),
    }

    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split(' ').collect();
        let Some(id) = fields.first().filter(|id| !id.is_empty()) else {
            log.malformed.push(format!("{}:{}", index, line_no + 1));
            continue;
        };
        log.ids.push(id.to_string());
        match fields.get(code_column).and_then(|c| c.parse::<u8>().ok()) {
            Some(code) if code == ReturnCode::Success.as_u8() => {}
            Some(code) => log.non_success.push(FlaggedRecord {
                id: id.to_string(),
                shard: index,
                code,
            }),
            None => log.malformed.push(format!("{}:{}", index, line_no + 1)),
        }
    }
    Ok(log)
}

/// Reads every shard log of `plan` and checks it against the partition.
pub async fn reconcile(plan: &PartitionPlan, top_k: u32) -> Result<Reconciliation> {
    let header = plan.action.header(top_k);
    let code_column = plan.action.return_code_column();

    let mut reads: FuturesUnordered<_> = plan
        .shards
        .iter()
        .map(|shard| {
            tokio::spawn(read_shard_log(
                shard.index,
                shard.log.clone(),
                header.clone(),
                code_column,
            ))
        })
        .collect();

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut reconciliation = Reconciliation {
        expected: plan.total_items(),
        ..Default::default()
    };
    while let Some(joined) = reads.next().await {
        let log = joined??;
        debug!(shard = log.index, records = log.ids.len(), "Shard log read");
        reconciliation.observed += log.ids.len();
        for id in log.ids {
            *seen.entry(id).or_default() += 1;
        }
        reconciliation.malformed.extend(log.malformed);
        reconciliation.non_success.extend(log.non_success);
    }

    let expected: HashSet<&str> = plan.ids().collect();
    reconciliation.missing = plan
        .ids()
        .filter(|id| !seen.contains_key(*id))
        .map(String::from)
        .collect();
    reconciliation.duplicated = seen
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(id, _)| id.clone())
        .collect();
    reconciliation.unexpected = seen
        .keys()
        .filter(|id| !expected.contains(id.as_str()))
        .cloned()
        .collect();
    reconciliation.duplicated.sort();
    reconciliation.unexpected.sort();
    reconciliation.malformed.sort();
    reconciliation
        .non_success
        .sort_by(|a, b| (a.shard, &a.id).cmp(&(b.shard, &b.id)));

    if reconciliation.is_complete() {
        info!(
            items = reconciliation.observed,
            non_success = reconciliation.non_success.len(),
            "Shard logs reconciled"
        );
    } else {
        warn!(
            missing = reconciliation.missing.len(),
            duplicated = reconciliation.duplicated.len(),
            unexpected = reconciliation.unexpected.len(),
            malformed = reconciliation.malformed.len(),
            "Shard logs do not match the input"
        );
    }
    Ok(reconciliation)
}

/// Concatenates shard logs into `<stem>.log` under one header and removes
/// them.
pub async fn merge_logs(plan: &PartitionPlan, top_k: u32) -> Result<PathBuf> {
    let merged_path = plan.output_dir.join(format!("{}.log", plan.stem));
    let mut merged = BufWriter::new(tokio::fs::File::create(&merged_path).await?);
    merged.write_all(plan.action.header(top_k).as_bytes()).await?;
    merged.write_all(b"\n").await?;

    for shard in &plan.shards {
        let body = match tokio::fs::read_to_string(&shard.log).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        for line in body.lines().skip(1) {
            merged.write_all(line.as_bytes()).await?;
            merged.write_all(b"\n").await?;
        }
    }
    merged.flush().await?;

    for shard in &plan.shards {
        if let Err(e) = tokio::fs::remove_file(&shard.log).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }
    }
    info!(path = %merged_path.display(), "Shard logs merged");
    Ok(merged_path)
}

/// Runs `future` on a fresh runtime. Only called after every worker has been
/// reaped, so no fork ever happens while runtime threads exist.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
