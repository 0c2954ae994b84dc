// src/harness/supervisor.rs
//! One forked process per shard, reduced to a single verdict.

use nix::errno::Errno;
use nix::sys::wait::{wait, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

use crate::harness::partition::{remove_if_present, Shard};
use crate::harness::worker::WorkerExit;
use crate::utils::error::Result;

// `wait` reaps any child of the test process, so forking tests take turns.
#[cfg(test)]
pub(crate) static FORK_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// How a worker process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardOutcome {
    Exited(i32),
    Signaled(String),
}

impl ShardOutcome {
    /// The worker declined the action.
    pub fn is_not_implemented(&self) -> bool {
        *self == ShardOutcome::Exited(WorkerExit::NotImplemented.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardReport {
    pub index: usize,
    pub outcome: ShardOutcome,
    /// Number of times the shard was forked.
    pub attempts: u32,
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    NotImplemented,
    Failure,
}

impl Verdict {
    /// Worst-case reduction. Any failure code or signal fails the run;
    /// not-implemented only wins over success.
    pub fn reduce<'a>(outcomes: impl IntoIterator<Item = &'a ShardOutcome>) -> Verdict {
        let mut verdict = Verdict::Success;
        for outcome in outcomes {
            match outcome {
                ShardOutcome::Exited(code) => match WorkerExit::from_code(*code) {
                    Some(WorkerExit::Success) => {}
                    Some(WorkerExit::NotImplemented) => {
                        if verdict == Verdict::Success {
                            verdict = Verdict::NotImplemented;
                        }
                    }
                    _ => return Verdict::Failure,
                },
                ShardOutcome::Signaled(_) => return Verdict::Failure,
            }
        }
        verdict
    }

    /// Process exit code of the harness binary.
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Success => 0,
            Verdict::Failure => 1,
            Verdict::NotImplemented => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra forks allowed for a shard whose worker was killed by a signal.
    pub crash_retries: u32,
}

pub struct Supervisor {
    policy: RetryPolicy,
}

impl Supervisor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Forks one child per shard running `work`, then waits for all of them.
    ///
    /// The caller must not have started any threads it relies on in the
    /// children. Reports come back in shard order. A shard that could not be
    /// forked is reported as failed; every child that was forked is reaped
    /// before this returns.
    pub fn run<F>(&self, shards: &[Shard], work: F) -> Result<Vec<ShardReport>>
    where
        F: FnMut(&Shard) -> WorkerExit,
    {
        self.supervise(shards, work, spawn::<F>)
    }

    fn supervise<F, S>(&self, shards: &[Shard], mut work: F, mut spawn: S) -> Result<Vec<ShardReport>>
    where
        F: FnMut(&Shard) -> WorkerExit,
        S: FnMut(&Shard, &mut F) -> Result<Pid>,
    {
        let mut running: HashMap<Pid, usize> = HashMap::with_capacity(shards.len());
        let mut attempts = vec![0u32; shards.len()];
        let mut outcomes: Vec<Option<ShardOutcome>> = vec![None; shards.len()];

        for (position, shard) in shards.iter().enumerate() {
            match spawn(shard, &mut work) {
                Ok(pid) => {
                    attempts[position] += 1;
                    running.insert(pid, position);
                    debug!(shard = shard.index, pid = pid.as_raw(), "Worker forked");
                }
                Err(e) => {
                    error!(shard = shard.index, "Problem forking worker: {}", e);
                    outcomes[position] = Some(ShardOutcome::Exited(WorkerExit::Failure.code()));
                }
            }
        }
        info!(workers = running.len(), "Waiting for workers");

        let mut wait_error = None;
        while !running.is_empty() {
            let status = match wait() {
                Ok(status) => status,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    error!(running = running.len(), "Waiting for workers failed: {}", e);
                    wait_error = Some(e);
                    break;
                }
            };
            let (pid, outcome) = match status {
                WaitStatus::Exited(pid, code) => (pid, ShardOutcome::Exited(code)),
                WaitStatus::Signaled(pid, signal, _) => {
                    (pid, ShardOutcome::Signaled(signal.as_str().to_string()))
                }
                other => {
                    debug!(status = ?other, "Ignoring wait status");
                    continue;
                }
            };
            let Some(position) = running.remove(&pid) else {
                warn!(pid = pid.as_raw(), "Reaped an unknown child");
                continue;
            };
            let shard = &shards[position];

            match &outcome {
                ShardOutcome::Signaled(signal) if attempts[position] <= self.policy.crash_retries => {
                    warn!(shard = shard.index, signal = %signal, attempt = attempts[position], "Worker killed, forking again");
                    remove_if_present(&shard.log);
                    match spawn(shard, &mut work) {
                        Ok(pid) => {
                            attempts[position] += 1;
                            running.insert(pid, position);
                        }
                        Err(e) => {
                            error!(shard = shard.index, "Problem forking worker again: {}", e);
                            outcomes[position] = Some(outcome);
                        }
                    }
                }
                ShardOutcome::Signaled(signal) => {
                    error!(shard = shard.index, signal = %signal, "Worker killed by signal");
                    outcomes[position] = Some(outcome);
                }
                ShardOutcome::Exited(code) => {
                    debug!(shard = shard.index, code, "Worker exited");
                    outcomes[position] = Some(outcome);
                }
            }
        }
        if let Some(e) = wait_error {
            return Err(e.into());
        }

        Ok(shards
            .iter()
            .zip(outcomes)
            .zip(attempts)
            .map(|((shard, outcome), attempts)| ShardReport {
                index: shard.index,
                outcome: outcome.unwrap_or(ShardOutcome::Exited(WorkerExit::Failure.code())),
                attempts,
            })
            .collect())
    }
}

fn spawn<F>(shard: &Shard, work: &mut F) -> Result<Pid>
where
    F: FnMut(&Shard) -> WorkerExit,
{
    // SAFETY: the child only runs the worker closure and then exits without
    // returning into the caller's stack.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            let exit = panic::catch_unwind(AssertUnwindSafe(|| work(shard)))
                .unwrap_or(WorkerExit::Failure);
            std::process::exit(exit.code())
        }
    }
}
