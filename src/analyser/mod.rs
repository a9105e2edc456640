//! Representation tracking and classifier scoring for network captures.
//! Folds per-entity feature vectors into recency-weighted summaries and scores per-slice predictions.
pub mod containers;
pub mod core;
pub mod decay;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod utils;
