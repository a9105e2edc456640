//! Contract with the classification model that produces features and rankings.
use std::path::Path;
use chrono::{DateTime, Utc};
use super::containers::{ClassificationRanking, EntityKey, FeatureVector, Observation};

/// Per-slice features extracted from one capture.
#[derive(Clone, Debug, Default)]
pub struct FeatureSequence {
    pub vectors: Vec<FeatureVector>,
    pub entity: EntityKey,
    pub timestamps: Vec<DateTime<Utc>>,
    /// Whole-capture ranking, if the model produces one.
    pub aggregate: Option<ClassificationRanking>,
}

impl FeatureSequence {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Pairs vectors with their timestamps. Unpaired trailing entries are ignored.
    pub fn observations(&self) -> Vec<Observation> {
        self.vectors
            .iter()
            .zip(&self.timestamps)
            .map(|(vector, timestamp)| Observation {
                timestamp: *timestamp,
                vector: vector.clone(),
            })
            .collect()
    }
}

pub trait Model {
    /// Features for every slice of a capture, or `None` when none could be produced.
    fn feature_sequence(&self, capture: &Path) -> Option<FeatureSequence>;

    fn classify(&self, vector: &[f64]) -> ClassificationRanking;

    /// Labels the model can emit.
    fn labels(&self) -> Vec<String> {
        Vec::new()
    }
}
