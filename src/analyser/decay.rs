//! Recency-weighted representation tracking.
//!
//! Each entity keeps a single vector that moves toward every newer observation by
//! `alpha = 1 - exp(-dt / tau)`, so long gaps let a new observation dominate and
//! closely spaced ones barely nudge the state.
use std::collections::hash_map::{Entry, HashMap};
use serde::Serialize;
use super::containers::{EntityKey, FeatureVector, Observation};
use super::error::{AnalysisError, Result};

/// One day, in seconds.
pub const DEFAULT_TAU: f64 = 60.0 * 60.0 * 24.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatorState {
    /// Seconds, same unit as the decay constant.
    pub last_update: f64,
    pub vector: FeatureVector,
}

/// Smoothing factor for a gap of `dt`. Lies in (0, 1) whenever `dt > 0`.
pub fn decay_alpha(dt: f64, tau: f64) -> f64 {
    // exp_m1 keeps small gaps from rounding alpha to zero
    -(-dt / tau).exp_m1()
}

/// Per-entity decayed state. Entities never share a slot, so disjoint key sets
/// can be driven from separate aggregators without locking.
#[derive(Debug)]
pub struct DecayAggregator {
    tau: f64,
    states: HashMap<EntityKey, AggregatorState>,
}

impl Default for DecayAggregator {
    fn default() -> Self {
        Self {
            tau: DEFAULT_TAU,
            states: HashMap::new(),
        }
    }
}

impl DecayAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tau(tau: f64) -> Result<Self> {
        if !tau.is_finite() || tau <= 0.0 {
            return Err(AnalysisError::InvalidDecayConstant(tau));
        }
        Ok(Self {
            tau,
            states: HashMap::new(),
        })
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn state(&self, entity: &str) -> Option<&AggregatorState> {
        self.states.get(entity)
    }

    pub fn states(&self) -> &HashMap<EntityKey, AggregatorState> {
        &self.states
    }

    /// Folds one observation into the entity's state and returns the current vector.
    ///
    /// The first observation for an entity is adopted as-is. Observations that are not
    /// strictly newer than the state are dropped without touching it. Non-finite
    /// timestamps are rejected before any state is created or changed.
    pub fn update(&mut self, entity: &str, vector: &[f64], timestamp: f64) -> Result<&[f64]> {
        if !timestamp.is_finite() {
            return Err(AnalysisError::InvalidTimestamp {
                entity: entity.to_string(),
                timestamp,
            });
        }
        let tau = self.tau;

        let state = match self.states.entry(entity.to_string()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                log::debug!("First observation for {entity} at {timestamp}");
                let state = slot.insert(AggregatorState {
                    last_update: timestamp,
                    vector: vector.to_vec(),
                });
                return Ok(&state.vector);
            }
        };

        if state.vector.len() != vector.len() {
            return Err(AnalysisError::DimensionMismatch {
                entity: entity.to_string(),
                expected: state.vector.len(),
                actual: vector.len(),
            });
        }

        let dt = timestamp - state.last_update;
        if !(dt > 0.0) {
            log::debug!("Dropping observation for {entity}: {timestamp} is not after {}", state.last_update);
            return Ok(&state.vector);
        }

        let alpha = decay_alpha(dt, tau);
        log::trace!("{entity}: dt={dt} alpha={alpha}");
        for (current, new) in state.vector.iter_mut().zip(vector) {
            *current += alpha * (new - *current);
        }
        state.last_update = timestamp;

        Ok(&state.vector)
    }

    /// Applies an ordered observation stream for one entity.
    ///
    /// The whole stream is checked first, so either every observation is applied or
    /// the entity's state is left untouched.
    ///
    /// Returns `None` when the stream is empty and the entity has no prior state,
    /// which callers must treat as "no representation", not as a zero vector.
    pub fn update_batch(&mut self, entity: &str, observations: &[Observation]) -> Result<Option<&AggregatorState>> {
        let expected = match self.states.get(entity) {
            Some(state) => Some(state.vector.len()),
            None => observations.first().map(|obs| obs.vector.len()),
        };

        for obs in observations {
            if let Some(expected) = expected {
                if obs.vector.len() != expected {
                    return Err(AnalysisError::DimensionMismatch {
                        entity: entity.to_string(),
                        expected,
                        actual: obs.vector.len(),
                    });
                }
            }
        }

        for obs in observations {
            self.update(entity, &obs.vector, obs.seconds())?;
        }

        Ok(self.states.get(entity))
    }
}
