use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use serde::Serialize;
use super::containers::{ResultsDocument, SampleRecord};
use super::decay::DecayAggregator;
use super::model::Model;
use super::utils::label_for_capture;

/// Slices are fifteen minutes of traffic each.
pub const SLICES_PER_HOUR: f64 = 4.0;

const BYTES_PER_MB: f64 = 1_000_000.0;

/// Throughput figures for one run over a set of captures.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub files: usize,
    pub bytes: u64,
    pub slices: usize,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MB
    }

    pub fn capture_hours(&self) -> f64 {
        self.slices as f64 / SLICES_PER_HOUR
    }

    /// MB processed per second, zero if no time was measured.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.megabytes() / secs } else { 0.0 }
    }

    /// Seconds spent per fifteen-minute slice, zero if nothing was processed.
    pub fn seconds_per_slice(&self) -> f64 {
        if self.slices > 0 { self.elapsed.as_secs_f64() / self.slices as f64 } else { 0.0 }
    }
}

/// Classifies every slice of every capture and folds each capture's features into
/// the aggregator under its entity key.
///
/// Captures the model cannot produce features for, or whose features the aggregator
/// rejects, are skipped and left out of the statistics.
pub fn analyse<M: Model>(
    model: &M,
    captures: &[PathBuf],
    assignments: &HashMap<String, String>,
    aggregator: &mut DecayAggregator,
) -> (ResultsDocument, RunStats) {
    log::info!("Processing {} captures.", captures.len());

    let mut results = ResultsDocument {
        labels: model.labels(),
        ..Default::default()
    };
    let mut stats = RunStats::default();
    let tick = Instant::now();

    for capture in captures {
        let label = label_for_capture(capture, assignments);
        log::info!("Reading {} as {label}", capture.display());

        let sequence = match model.feature_sequence(capture) {
            Some(sequence) => sequence,
            None => {
                log::warn!("No representation for {}, skipping.", capture.display());
                continue;
            }
        };

        log::debug!("Computing classifications by slice.");
        let individual = sequence.vectors.iter().map(|v| model.classify(v)).collect();

        if let Err(e) = aggregator.update_batch(&sequence.entity, &sequence.observations()) {
            log::error!("Skipping {}: {e}", capture.display());
            continue;
        }

        stats.files += 1;
        stats.bytes += fs::metadata(capture).map(|m| m.len()).unwrap_or_else(|e| {
            log::warn!("Could not stat {}: {e}", capture.display());
            0
        });
        stats.slices += sequence.len();

        results.samples.insert(
            capture.display().to_string(),
            SampleRecord {
                label,
                aggregate: sequence.aggregate,
                individual,
            },
        );
    }

    stats.elapsed = tick.elapsed();
    log::info!("Evaluated {} captures in {:.3} seconds.", stats.files, stats.elapsed.as_secs_f64());

    (results, stats)
}
