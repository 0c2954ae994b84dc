// src/utils/metrics.rs
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::info;

use crate::core::{ReturnCode, ReturnStatus};

/// Per-worker counters, reported once when the worker exits.
pub struct WorkerMetrics {
    shard: usize,
    start_time: Instant,
    items_total: u64,
    items_failed: u64,
    call_time: Duration,
    codes: BTreeMap<u8, u64>,
}

impl WorkerMetrics {
    pub fn new(shard: usize) -> Self {
        Self {
            shard,
            start_time: Instant::now(),
            items_total: 0,
            items_failed: 0,
            call_time: Duration::ZERO,
            codes: BTreeMap::new(),
        }
    }

    pub fn record_item(&mut self, duration: Duration, status: &ReturnStatus) {
        self.items_total += 1;
        self.call_time += duration;
        *self.codes.entry(status.code.as_u8()).or_default() += 1;
        if !status.is_success() {
            self.items_failed += 1;
        }
    }

    pub fn items_total(&self) -> u64 {
        self.items_total
    }

    pub fn items_failed(&self) -> u64 {
        self.items_failed
    }

    pub fn count(&self, code: ReturnCode) -> u64 {
        self.codes.get(&code.as_u8()).copied().unwrap_or(0)
    }

    pub fn report(&self, outcome: &str) {
        let elapsed = self.start_time.elapsed();
        let mean_call_ms = if self.items_total == 0 {
            0.0
        } else {
            self.call_time.as_secs_f64() * 1000.0 / self.items_total as f64
        };
        info!(
            shard = self.shard,
            outcome,
            items = self.items_total,
            failed = self.items_failed,
            elapsed_ms = elapsed.as_millis() as u64,
            mean_call_ms,
            "Worker finished"
        );
    }
}
