use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved label for traffic the model could not attribute to a known class.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Behavioural summary of one entity over one time slice.
pub type FeatureVector = Vec<f64>;

/// Identifier of an observed endpoint, usually its address.
pub type EntityKey = String;

/// One timestamped feature vector for an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub vector: FeatureVector,
}

impl Observation {
    /// Timestamp in seconds, the unit the decay constant is expressed in.
    pub fn seconds(&self) -> f64 {
        self.timestamp.timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Observation stream for a single entity, as read from an observations document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityObservations {
    pub entity: EntityKey,
    pub observations: Vec<Observation>,
}

/// Ordered (label, score) pairs for one slice, highest score first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationRanking(pub Vec<(String, f64)>);

impl ClassificationRanking {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self(entries)
    }

    pub fn top(&self) -> Option<&str> {
        self.0.first().map(|(label, _)| label.as_str())
    }

    pub fn runner_up(&self) -> Option<&str> {
        self.0.get(1).map(|(label, _)| label.as_str())
    }
}

/// One evaluated unit, e.g. a single capture file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Ground truth, possibly [UNKNOWN_LABEL].
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<ClassificationRanking>,
    /// Per-slice rankings in slice order.
    #[serde(default)]
    pub individual: Vec<ClassificationRanking>,
}

impl SampleRecord {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Everything produced by one evaluation run, keyed by sample id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResultsDocument {
    /// Labels the model knows about.
    #[serde(default)]
    pub labels: Vec<String>,
    pub samples: BTreeMap<String, SampleRecord>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: u64,
    pub fp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
}

impl ConfusionCounts {
    /// Whether the label occurred at least once as ground truth.
    pub fn seen_as_truth(&self) -> bool {
        self.tp + self.fn_ > 0
    }
}

/// How `Unknown` predictions and ground truth are treated while scoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringPolicy {
    /// `Unknown` is a legitimate, scorable class.
    OpenSet,
    /// A concrete prediction is required; indeterminate ground truth is skipped.
    ForcedDecision,
}

impl ScoringPolicy {
    pub fn from_ignore_unknown(ignore_unknown: bool) -> Self {
        if ignore_unknown {
            ScoringPolicy::ForcedDecision
        } else {
            ScoringPolicy::OpenSet
        }
    }

    pub fn ignores_unknown(&self) -> bool {
        *self == ScoringPolicy::ForcedDecision
    }
}

impl fmt::Display for ScoringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScoringPolicy::OpenSet => write!(f, "Results with unknowns"),
            ScoringPolicy::ForcedDecision => write!(f, "Results forcing decisions"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LabelScore {
    pub counts: ConfusionCounts,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Output of one scoring pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    pub policy: ScoringPolicy,
    /// Every label that got a bucket, including false-positive-only ones.
    pub scores: BTreeMap<String, LabelScore>,
    /// Mean F1 over labels seen as ground truth; `None` when there are none.
    pub mean_f1: Option<f64>,
}

impl Evaluation {
    /// F1 per label, restricted to labels that count towards the mean.
    pub fn f1_by_label(&self) -> BTreeMap<&str, f64> {
        self.scores
            .iter()
            .filter(|(_, score)| score.counts.seen_as_truth())
            .map(|(label, score)| (label.as_str(), score.f1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_top_and_runner_up() {
        let ranking = ClassificationRanking::new(vec![
            ("Unknown".to_string(), 0.6),
            ("Printer".to_string(), 0.3),
        ]);
        assert_eq!(ranking.top(), Some("Unknown"));
        assert_eq!(ranking.runner_up(), Some("Printer"));
        assert_eq!(ClassificationRanking::default().top(), None);
    }

    #[test]
    fn sample_record_reads_nested_rankings() {
        let json = r#"{
            "label": "Printer",
            "aggregate": [["Printer", 0.9], ["Unknown", 0.1]],
            "individual": [[["Printer", 0.8], ["Unknown", 0.2]]]
        }"#;
        let record: SampleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.label, "Printer");
        assert_eq!(record.individual.len(), 1);
        assert_eq!(record.aggregate.unwrap().top(), Some("Printer"));
    }

    #[test]
    fn confusion_counts_serialise_fn_field() {
        let counts = ConfusionCounts { tp: 1, fp: 2, fn_: 3 };
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json["fn"], 3);
    }

    #[test]
    fn observation_seconds_keeps_subsecond_precision() {
        let obs = Observation {
            timestamp: DateTime::parse_from_rfc3339("1970-01-01T00:00:01.5Z")
                .unwrap()
                .with_timezone(&Utc),
            vector: vec![1.0],
        };
        assert_eq!(obs.seconds(), 1.5);
    }
}
