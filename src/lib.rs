pub mod analyser;
pub mod ui;

pub use analyser::containers::{ClassificationRanking, Evaluation, SampleRecord, ScoringPolicy};
pub use analyser::decay::DecayAggregator;
pub use analyser::error::{AnalysisError, Result};
pub use analyser::evaluate::evaluate;
pub use analyser::model::{FeatureSequence, Model};
