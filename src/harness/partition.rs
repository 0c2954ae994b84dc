// src/harness/partition.rs
//! Splits a work-item list into contiguous shards, one per worker.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::harness::action::Action;
use crate::storage::EnrollmentPart;
use crate::utils::error::{HarnessError, Result};

/// Files owned by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub index: usize,
    pub input: PathBuf,
    pub log: PathBuf,
    /// Identifiers assigned to this shard, in input order.
    pub ids: Vec<String>,
}

impl Shard {
    pub fn new(output_dir: &Path, stem: &str, index: usize) -> Self {
        Self {
            index,
            input: output_dir.join(format!("{}.input.{}", stem, index)),
            log: output_dir.join(format!("{}.log.{}", stem, index)),
            ids: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn enrollment_part(&self, output_dir: &Path, stem: &str) -> EnrollmentPart {
        EnrollmentPart::for_shard(output_dir, stem, self.index)
    }
}

#[derive(Debug, Clone)]
pub struct PartitionPlan {
    pub action: Action,
    pub output_dir: PathBuf,
    pub stem: String,
    pub shards: Vec<Shard>,
}

impl PartitionPlan {
    pub fn total_items(&self) -> usize {
        self.shards.iter().map(|s| s.ids.len()).sum()
    }

    /// Every identifier, in shard order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.shards.iter().flat_map(|s| s.ids.iter().map(String::as_str))
    }

    pub fn enrollment_parts(&self) -> Vec<EnrollmentPart> {
        self.shards
            .iter()
            .map(|s| s.enrollment_part(&self.output_dir, &self.stem))
            .collect()
    }

    /// Removes every shard's input and log.
    pub fn remove_outputs(&self) {
        for shard in &self.shards {
            remove_if_present(&shard.input);
            remove_if_present(&shard.log);
        }
    }
}

/// Chunk size for `total` items over `workers` shards: `ceil(total / workers)`.
pub fn chunk_size(total: usize, workers: usize) -> usize {
    if workers == 0 {
        return total;
    }
    total.div_ceil(workers)
}

/// Reads the non-blank lines of `path`, validating each against the
/// action's layout. Identifiers must be unique.
pub fn read_items(action: Action, path: &Path) -> Result<Vec<(String, String)>> {
    let file = File::open(path).map_err(|e| HarnessError::ResourceLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = action.parse_item(index + 1, &line)?;
        if !seen.insert(item.id.clone()) {
            return Err(HarnessError::Input {
                line: index + 1,
                reason: format!("duplicate identifier '{}'", item.id),
            });
        }
        items.push((item.id, line));
    }
    Ok(items)
}

/// Writes `workers` shard files under `output_dir` and deletes `input`.
///
/// Shards are contiguous ranges of `chunk_size` lines; trailing shards may be
/// short or empty. On error no shard file is left behind and the input is
/// kept.
pub fn partition(
    action: Action,
    input: &Path,
    output_dir: &Path,
    stem: &str,
    workers: usize,
) -> Result<PartitionPlan> {
    if workers == 0 {
        return Err(HarnessError::Config("At least one worker is required".into()));
    }

    let items = read_items(action, input)?;
    fs::create_dir_all(output_dir)?;

    let chunk = chunk_size(items.len(), workers);
    let mut plan = PartitionPlan {
        action,
        output_dir: output_dir.to_path_buf(),
        stem: stem.to_string(),
        shards: Vec::with_capacity(workers),
    };

    for index in 0..workers {
        let start = (index * chunk).min(items.len());
        let end = (start + chunk).min(items.len());
        let mut shard = Shard::new(output_dir, stem, index);

        if let Err(e) = write_shard(&shard.input, &items[start..end]) {
            plan.shards.push(shard);
            plan.remove_outputs();
            return Err(e);
        }
        shard.ids = items[start..end].iter().map(|(id, _)| id.clone()).collect();
        debug!(shard = index, items = shard.ids.len(), path = %shard.input.display(), "Shard written");
        plan.shards.push(shard);
    }

    fs::remove_file(input)?;
    info!(
        action = %action,
        items = items.len(),
        workers,
        chunk,
        "Input partitioned"
    );
    Ok(plan)
}

fn write_shard(path: &Path, lines: &[(String, String)]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (_, line) in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %path.display(), "Could not remove file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_input(dir: &Path, count: usize) -> PathBuf {
        let path = dir.join("input.txt");
        let body: String = (0..count).map(|i| format!("Q{} img{}.png\n", i, i)).collect();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_chunk_size_rounds_up() {
        assert_eq!(chunk_size(10, 3), 4);
        assert_eq!(chunk_size(9, 3), 3);
        assert_eq!(chunk_size(0, 4), 0);
        assert_eq!(chunk_size(2, 5), 1);
    }

    #[test]
    fn test_ten_items_over_three_workers() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path(), 10);
        let plan = partition(Action::Quality, &input, dir.path(), "quality", 3).unwrap();

        let sizes: Vec<usize> = plan.shards.iter().map(|s| s.ids.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(plan.total_items(), 10);
        assert!(!input.exists());
    }

    #[test]
    fn test_concatenation_reproduces_input() {
        for total in [0usize, 1, 7, 16] {
            for workers in 1..=6 {
                let dir = tempdir().unwrap();
                let input = write_input(dir.path(), total);
                let original = fs::read_to_string(&input).unwrap();

                let plan = partition(Action::Quality, &input, dir.path(), "q", workers).unwrap();
                assert_eq!(plan.shards.len(), workers);
                let joined: String = plan
                    .shards
                    .iter()
                    .map(|s| fs::read_to_string(&s.input).unwrap())
                    .collect();
                assert_eq!(joined, original, "total={} workers={}", total, workers);

                let unique: HashSet<&str> = plan.ids().collect();
                assert_eq!(unique.len(), total);
            }
        }
    }

    #[test]
    fn test_more_workers_than_items_leaves_empty_shards() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path(), 2);
        let plan = partition(Action::Quality, &input, dir.path(), "q", 4).unwrap();
        assert_eq!(plan.shards.iter().filter(|s| s.is_empty()).count(), 2);
        assert!(plan.shards[3].input.exists());
    }

    #[test]
    fn test_blank_lines_are_dropped() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "A a.png\n\n   \nB b.png\n").unwrap();
        let plan = partition(Action::Quality, &input, dir.path(), "q", 1).unwrap();
        assert_eq!(plan.shards[0].ids, vec!["A", "B"]);
    }

    #[test]
    fn test_malformed_input_is_kept() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "C1 a.png b.png\nC2 only.png\n").unwrap();

        let err = partition(Action::Compare, &input, dir.path(), "c", 2).unwrap_err();
        assert!(matches!(err, HarnessError::Input { line: 2, .. }));
        assert!(input.exists());
        assert!(!dir.path().join("c.input.0").exists());
    }

    #[test]
    fn test_unknown_label_is_rejected_before_sharding() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "Q1 a.png mugshot\nQ2 b.png selfie\n").unwrap();

        let err = partition(Action::Quality, &input, dir.path(), "q", 2).unwrap_err();
        assert!(matches!(err, HarnessError::Input { line: 2, .. }));
        assert!(input.exists());
        assert!(!dir.path().join("q.input.0").exists());
    }

    #[test]
    fn test_duplicate_identifiers_are_rejected() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "A a.png\nA b.png\n").unwrap();
        assert!(partition(Action::Quality, &input, dir.path(), "q", 1).is_err());
    }

    #[test]
    fn test_zero_workers_is_a_config_error() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path(), 3);
        assert!(matches!(
            partition(Action::Quality, &input, dir.path(), "q", 0),
            Err(HarnessError::Config(_))
        ));
    }
}
