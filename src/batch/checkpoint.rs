//! Resumable dataset runs with periodic checkpoints.
//!
//! A run splits a dataset into batches, feeds them to a
//! [`BatchInferenceProcessor`], and persists progress as
//! `checkpoint_{n}.json` every `save_interval` results and
//! `final_results_{n}.json` at the end, where `n` is the number of results so far.
//! Resuming from a checkpoint skips the items it already covers.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::BatchError;

use super::{BatchInferenceProcessor, BatchItem, BatchResult};

/// Running totals of a dataset run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_samples: usize,
    pub processed: usize,
    pub correct: usize,
    pub errors: usize,
    /// Seconds spent in batch processing, summed over resumed sessions.
    pub total_time: f64,
    pub avg_time_per_sample: f64,
}

impl RunStats {
    /// Fraction of processed items answered correctly.
    pub fn accuracy(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.correct as f64 / self.processed as f64
        }
    }

    fn refresh(&mut self, results: &[BatchResult]) {
        self.processed = results.len();
        self.correct = results.iter().filter(|r| r.correct).count();
        self.errors = results.iter().filter(|r| r.error.is_some()).count();
        self.avg_time_per_sample = if self.processed == 0 {
            0.0
        } else {
            self.total_time / self.processed as f64
        };
    }
}

/// Persisted progress: `{"results": [...], "stats": {...}, "timestamp": secs}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub results: Vec<BatchResult>,
    pub stats: RunStats,
    /// Unix time in seconds.
    pub timestamp: f64,
}

impl Checkpoint {
    pub fn new(results: Vec<BatchResult>, stats: RunStats) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self {
            results,
            stats,
            timestamp,
        }
    }

    /// Load a checkpoint from a JSON file.
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let content = std::fs::read_to_string(path).map_err(|e| BatchError::CheckpointIo {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| BatchError::CheckpointParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), BatchError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| BatchError::CheckpointParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BatchError::CheckpointIo {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| BatchError::CheckpointIo {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Newest `checkpoint_{n}.json` in `dir` (largest `n`), if any.
pub fn latest_checkpoint(dir: &Path) -> Result<Option<PathBuf>, BatchError> {
    if !dir.exists() {
        return Ok(None);
    }
    let entries = std::fs::read_dir(dir).map_err(|e| BatchError::CheckpointIo {
        path: dir.display().to_string(),
        source: e,
    })?;
    let mut best: Option<(usize, PathBuf)> = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(n) = name
            .to_str()
            .and_then(|s| s.strip_prefix("checkpoint_"))
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|s| s.parse::<usize>().ok())
        else {
            continue;
        };
        if best.as_ref().is_none_or(|(m, _)| n > *m) {
            best = Some((n, entry.path()));
        }
    }
    Ok(best.map(|(_, path)| path))
}

/// Result of a dataset run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: Vec<BatchResult>,
    pub stats: RunStats,
    /// Checkpoints written during this session, in order.
    pub checkpoints: Vec<PathBuf>,
    pub final_path: PathBuf,
}

/// Drives a processor over a whole dataset, checkpointing as it goes.
pub struct DatasetRunner<'a> {
    processor: &'a BatchInferenceProcessor,
    results_dir: PathBuf,
    batch_size: usize,
    save_interval: usize,
}

impl<'a> DatasetRunner<'a> {
    /// Batch size and checkpoint interval come from the processor's `[batch]` config.
    pub fn new(processor: &'a BatchInferenceProcessor, results_dir: impl Into<PathBuf>) -> Self {
        let config = processor.config();
        Self {
            processor,
            results_dir: results_dir.into(),
            batch_size: config.batch_size,
            save_interval: config.save_interval,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Checkpoint every `save_interval` results; 0 disables intermediate checkpoints.
    pub fn with_save_interval(mut self, save_interval: usize) -> Self {
        self.save_interval = save_interval;
        self
    }

    /// Run `items`, continuing after `resume` when given.
    ///
    /// The first `resume.results.len()` items are assumed done and skipped.
    pub fn run(&self, items: &[BatchItem], resume: Option<Checkpoint>) -> Result<RunOutcome, BatchError> {
        if self.batch_size == 0 {
            return Err(BatchError::ZeroBatchSize);
        }

        let (mut results, mut stats) = match resume {
            Some(checkpoint) => {
                tracing::info!(done = checkpoint.results.len(), "resuming from checkpoint");
                (checkpoint.results, checkpoint.stats)
            }
            None => (Vec::new(), RunStats::default()),
        };
        stats.total_samples = items.len().max(results.len());

        let remaining = items.get(results.len()..).unwrap_or_default();
        let mut checkpoints = Vec::new();

        for chunk in remaining.chunks(self.batch_size) {
            let before = results.len();
            let (batch_results, metrics) = self.processor.process_batch(chunk);
            results.extend(batch_results);
            stats.total_time += metrics.processing_time;
            stats.refresh(&results);

            if self.crossed_interval(before, results.len()) {
                let path = self.results_dir.join(format!("checkpoint_{}.json", results.len()));
                Checkpoint::new(results.clone(), stats.clone()).save(&path)?;
                tracing::info!(
                    path = %path.display(),
                    processed = stats.processed,
                    accuracy = format!("{:.3}", stats.accuracy()),
                    "checkpoint saved"
                );
                checkpoints.push(path);
            }
        }

        stats.refresh(&results);
        let final_path = self.results_dir.join(format!("final_results_{}.json", results.len()));
        Checkpoint::new(results.clone(), stats.clone()).save(&final_path)?;
        tracing::info!(
            path = %final_path.display(),
            processed = stats.processed,
            correct = stats.correct,
            errors = stats.errors,
            "dataset run complete"
        );

        Ok(RunOutcome {
            results,
            stats,
            checkpoints,
            final_path,
        })
    }

    fn crossed_interval(&self, before: usize, after: usize) -> bool {
        self.save_interval > 0 && after / self.save_interval > before / self.save_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, correct: bool, error: Option<&str>) -> BatchResult {
        BatchResult {
            id: id.into(),
            question: "q".into(),
            gold_answers: vec!["a".into()],
            predicted_answer: "a".into(),
            confidence: 0.5,
            correct,
            processing_time: 0.1,
            num_evidence_paths: 1,
            error: error.map(String::from),
        }
    }

    #[test]
    fn stats_refresh_counts() {
        let mut stats = RunStats {
            total_time: 3.0,
            ..RunStats::default()
        };
        stats.refresh(&[
            result("1", true, None),
            result("2", false, Some("boom")),
            result("3", false, None),
        ]);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.correct, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.avg_time_per_sample, 1.0);
    }

    #[test]
    fn checkpoint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("checkpoint_2.json");
        let checkpoint = Checkpoint::new(vec![result("1", true, None), result("2", false, Some("x"))], RunStats::default());
        checkpoint.save(&path).unwrap();

        let back = Checkpoint::load(&path).unwrap();
        assert_eq!(back.results, checkpoint.results);
        assert_eq!(back.stats, checkpoint.stats);
        assert!((back.timestamp - checkpoint.timestamp).abs() < 1e-3);
    }

    #[test]
    fn checkpoint_json_keys() {
        let value = serde_json::to_value(Checkpoint::new(vec![result("1", true, None)], RunStats::default())).unwrap();
        assert!(value["results"].is_array());
        assert!(value["stats"]["avg_time_per_sample"].is_number());
        assert!(value["timestamp"].is_number());
        assert!(value["results"][0].get("error").is_none());
    }

    #[test]
    fn corrupt_checkpoint_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint_1.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Checkpoint::load(&path), Err(BatchError::CheckpointParse { .. })));
    }

    #[test]
    fn latest_checkpoint_picks_largest_count() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["checkpoint_50.json", "checkpoint_100.json", "final_results_120.json", "checkpoint_x.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let latest = latest_checkpoint(dir.path()).unwrap().unwrap();
        assert!(latest.ends_with("checkpoint_100.json"));
        assert!(latest_checkpoint(&dir.path().join("missing")).unwrap().is_none());
    }
}
