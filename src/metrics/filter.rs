//! Observation filtering before transmission.

use regex::Regex;
use tracing::debug;

use crate::model::Observation;

/// Drops observations without a value and, optionally, those whose path
/// contains a segment matching an exclusion pattern.
#[derive(Debug, Clone, Default)]
pub struct MetricFilter {
    exclude: Option<Regex>,
}

impl MetricFilter {
    /// Filter that only drops null values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exclude(exclude: Option<Regex>) -> Self {
        Self { exclude }
    }

    /// Returns `true` if the observation should be transmitted.
    ///
    /// Exclusion is tested against every segment, not only the leaf.
    pub fn accepts(&self, observation: &Observation) -> bool {
        if observation.value.is_none() {
            return false;
        }
        match &self.exclude {
            Some(re) => !observation.path.iter().any(|segment| re.is_match(segment)),
            None => true,
        }
    }

    /// Keeps accepted observations in insertion order.
    pub fn apply(&self, mut observations: Vec<Observation>) -> Vec<Observation> {
        let before = observations.len();
        observations.retain(|o| self.accepts(o));
        debug!(
            kept = observations.len(),
            dropped = before - observations.len(),
            "filtered metrics"
        );
        observations
    }
}
