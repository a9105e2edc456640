//! Scoring of per-slice classifications against ground truth.
//!
//! A pass folds [SampleRecord]s into a [ConfusionTable] and then maps every bucket to
//! precision, recall and F1. Nothing is kept between passes.
use std::collections::BTreeMap;
use super::containers::{
    ClassificationRanking, ConfusionCounts, Evaluation, LabelScore, SampleRecord, ScoringPolicy, UNKNOWN_LABEL,
};

/// Picks the label a slice is scored as.
///
/// Under [ScoringPolicy::ForcedDecision] an `Unknown` top pick falls back to the runner-up.
/// Returns `None` for an empty ranking, or a forced decision with nothing to fall back to.
pub fn resolve_label(ranking: &ClassificationRanking, policy: ScoringPolicy) -> Option<&str> {
    let top = ranking.top()?;
    if top == UNKNOWN_LABEL && policy.ignores_unknown() {
        return ranking.runner_up();
    }
    Some(top)
}

/// Confusion buckets per label, created on first sight.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfusionTable {
    buckets: BTreeMap<String, ConfusionCounts>,
}

impl ConfusionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<&ConfusionCounts> {
        self.buckets.get(label)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfusionCounts)> {
        self.buckets.iter()
    }

    fn bucket(&mut self, label: &str) -> &mut ConfusionCounts {
        self.buckets.entry(label.to_string()).or_default()
    }

    /// Counts one slice predicted as `predicted` whose ground truth is `truth`.
    pub fn record(&mut self, truth: &str, predicted: &str) {
        self.bucket(predicted);
        if truth == predicted {
            self.bucket(truth).tp += 1;
        } else {
            self.bucket(truth).fn_ += 1;
            self.bucket(predicted).fp += 1;
        }
    }

    /// Folds one sample into the table.
    pub fn add_sample(&mut self, sample: &SampleRecord, policy: ScoringPolicy) {
        if sample.is_unknown() && policy.ignores_unknown() {
            log::debug!("Skipping sample with indeterminate ground truth");
            return;
        }

        self.bucket(&sample.label);

        for (slice, ranking) in sample.individual.iter().enumerate() {
            match resolve_label(ranking, policy) {
                Some(predicted) => {
                    log::trace!("Slice {slice}: {} predicted as {predicted}", sample.label);
                    self.record(&sample.label, predicted);
                }
                None => log::warn!("Slice {slice} of a {} sample has no usable prediction", sample.label),
            }
        }
    }

    /// Adds another table's counts into this one.
    ///
    /// Lets partial tables built over disjoint sample sets be combined by a single writer.
    pub fn merge(&mut self, other: &ConfusionTable) {
        for (label, counts) in &other.buckets {
            let bucket = self.bucket(label);
            bucket.tp += counts.tp;
            bucket.fp += counts.fp;
            bucket.fn_ += counts.fn_;
        }
    }
}

/// Builds the confusion table for a set of samples.
pub fn tally<'a, I>(samples: I, policy: ScoringPolicy) -> ConfusionTable
where
    I: IntoIterator<Item = &'a SampleRecord>,
{
    let mut table = ConfusionTable::new();
    for sample in samples {
        table.add_sample(sample, policy);
    }
    table
}

/// Precision, recall and F1 for one bucket. Zero denominators yield zero scores.
pub fn score_label(counts: &ConfusionCounts) -> LabelScore {
    let (precision, recall) = if counts.tp + counts.fp == 0 || counts.tp + counts.fn_ == 0 {
        log::debug!("Precision and recall set to 0 for {counts:?}: zero denominator");
        (0.0, 0.0)
    } else {
        (
            counts.tp as f64 / (counts.tp + counts.fp) as f64,
            counts.tp as f64 / (counts.tp + counts.fn_) as f64,
        )
    };

    let f1 = if precision == 0.0 || recall == 0.0 {
        0.0
    } else {
        2.0 / (1.0 / precision + 1.0 / recall)
    };

    LabelScore {
        counts: *counts,
        precision,
        recall,
        f1,
    }
}

/// Scores every bucket and averages F1 over labels that occurred as ground truth.
pub fn score_table(table: &ConfusionTable, policy: ScoringPolicy) -> Evaluation {
    let scores: BTreeMap<String, LabelScore> = table
        .iter()
        .map(|(label, counts)| (label.clone(), score_label(counts)))
        .collect();

    let qualifying: Vec<f64> = scores
        .values()
        .filter(|score| score.counts.seen_as_truth())
        .map(|score| score.f1)
        .collect();

    let mean_f1 = if qualifying.is_empty() {
        None
    } else {
        Some(qualifying.iter().sum::<f64>() / qualifying.len() as f64)
    };

    Evaluation {
        policy,
        scores,
        mean_f1,
    }
}

/// Full pass: tally the samples, then score.
pub fn evaluate<'a, I>(samples: I, policy: ScoringPolicy) -> Evaluation
where
    I: IntoIterator<Item = &'a SampleRecord>,
{
    log::info!("Scoring samples: {policy}");
    let evaluation = score_table(&tally(samples, policy), policy);

    for (label, f1) in evaluation.f1_by_label() {
        log::info!("F1 of {f1} for {label}");
    }
    match evaluation.mean_f1 {
        Some(mean) => log::info!("Mean F1: {mean}"),
        None => log::warn!("No labels occurred as ground truth, mean F1 undefined"),
    }

    evaluation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(labels: &[&str]) -> ClassificationRanking {
        let step = 1.0 / (labels.len() as f64 + 1.0);
        ClassificationRanking::new(
            labels
                .iter()
                .enumerate()
                .map(|(i, l)| (l.to_string(), 1.0 - step * (i as f64 + 1.0)))
                .collect(),
        )
    }

    fn sample(truth: &str, slices: &[&[&str]]) -> SampleRecord {
        SampleRecord {
            label: truth.to_string(),
            aggregate: None,
            individual: slices.iter().map(|s| ranking(s)).collect(),
        }
    }

    fn three_samples() -> Vec<SampleRecord> {
        vec![
            sample("Malware", &[&["Malware", "Benign"]]),
            sample("Benign", &[&["Malware", "Benign"]]),
            sample("Unknown", &[&["Unknown", "Benign"]]),
        ]
    }

    #[test]
    fn forced_decision_falls_back_to_runner_up() {
        let r = ranking(&["Unknown", "Printer", "Camera"]);
        assert_eq!(resolve_label(&r, ScoringPolicy::OpenSet), Some("Unknown"));
        assert_eq!(resolve_label(&r, ScoringPolicy::ForcedDecision), Some("Printer"));

        let concrete = ranking(&["Camera", "Unknown"]);
        assert_eq!(resolve_label(&concrete, ScoringPolicy::ForcedDecision), Some("Camera"));
    }

    #[test]
    fn unresolvable_rankings() {
        assert_eq!(resolve_label(&ClassificationRanking::default(), ScoringPolicy::OpenSet), None);
        assert_eq!(resolve_label(&ranking(&["Unknown"]), ScoringPolicy::ForcedDecision), None);
    }

    #[test]
    fn open_set_scenario() {
        let table = tally(&three_samples(), ScoringPolicy::OpenSet);

        assert_eq!(table.get("Malware"), Some(&ConfusionCounts { tp: 1, fp: 1, fn_: 0 }));
        assert_eq!(table.get("Benign"), Some(&ConfusionCounts { tp: 0, fp: 0, fn_: 1 }));
        assert_eq!(table.get("Unknown"), Some(&ConfusionCounts { tp: 1, fp: 0, fn_: 0 }));

        let eval = score_table(&table, ScoringPolicy::OpenSet);
        let malware = eval.scores["Malware"];
        assert_eq!(malware.precision, 0.5);
        assert_eq!(malware.recall, 1.0);
        assert!((malware.f1 - 2.0 / 3.0).abs() < 1e-12);

        assert_eq!(eval.scores["Benign"].f1, 0.0);
        assert_eq!(eval.scores["Unknown"].f1, 1.0);
        let mean = eval.mean_f1.unwrap();
        assert!((mean - (2.0 / 3.0 + 0.0 + 1.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn forced_decision_scenario_drops_unknown_truth() {
        let eval = evaluate(&three_samples(), ScoringPolicy::ForcedDecision);

        assert!(!eval.scores.contains_key("Unknown"));
        assert!((eval.scores["Malware"].f1 - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(eval.f1_by_label().len(), 2);
    }

    #[test]
    fn unknown_truth_misclassified_under_open_set() {
        let table = tally(&[sample("Unknown", &[&["Printer", "Unknown"]])], ScoringPolicy::OpenSet);
        assert_eq!(table.get("Unknown"), Some(&ConfusionCounts { tp: 0, fp: 0, fn_: 1 }));
        assert_eq!(table.get("Printer"), Some(&ConfusionCounts { tp: 0, fp: 1, fn_: 0 }));
    }

    #[test]
    fn false_positive_only_labels_are_excluded_from_mean() {
        let samples = vec![sample("Camera", &[&["Camera"], &["Printer"]])];
        let eval = evaluate(&samples, ScoringPolicy::OpenSet);

        assert!(eval.scores.contains_key("Printer"));
        assert!(!eval.f1_by_label().contains_key("Printer"));
        // Camera: p = 1, r = 1/2
        assert!((eval.mean_f1.unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn sample_without_slices_still_creates_truth_bucket() {
        let table = tally(&[sample("Camera", &[])], ScoringPolicy::OpenSet);
        assert_eq!(table.get("Camera"), Some(&ConfusionCounts::default()));
        assert_eq!(score_table(&table, ScoringPolicy::OpenSet).mean_f1, None);
    }

    #[test]
    fn zero_denominators_score_zero() {
        let score = score_label(&ConfusionCounts { tp: 0, fp: 0, fn_: 4 });
        assert_eq!((score.precision, score.recall, score.f1), (0.0, 0.0, 0.0));

        let fp_only = score_label(&ConfusionCounts { tp: 0, fp: 3, fn_: 0 });
        assert_eq!(fp_only.f1, 0.0);
        assert!(!fp_only.f1.is_nan());
    }

    #[test]
    fn merged_partial_tables_match_single_pass() {
        let samples = three_samples();
        let whole = tally(&samples, ScoringPolicy::OpenSet);

        let mut merged = tally(&samples[..1], ScoringPolicy::OpenSet);
        merged.merge(&tally(&samples[1..], ScoringPolicy::OpenSet));

        assert_eq!(merged, whole);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let samples = three_samples();
        assert_eq!(
            evaluate(&samples, ScoringPolicy::OpenSet),
            evaluate(&samples, ScoringPolicy::OpenSet)
        );
    }
}
