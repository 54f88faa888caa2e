//! Discovery configuration
//!
//! All learning knobs are plain values handed down the pipeline; nothing is
//! configured at module load. Construct with [`DiscoveryConfig::default`],
//! adjust fields, then call [`DiscoveryConfig::validate`] before use.

use crate::errors::{ProcgraphError, Result};
use serde::{Deserialize, Serialize};

/// Shape of the EFSM→DPN projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    /// One place per EFSM state, one net transition per EFSM transition
    #[default]
    Canonical,
    /// Single shared "process" place with one self-looping transition per
    /// activity label; guards of same-labelled transitions are merged with
    /// a disjunction. Loses which guard gated which control-flow edge.
    Compact,
}

/// Knobs of the discovery pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// State-merging compatibility threshold, in `[0, 1]`.
    /// Raising it merges less and yields a larger EFSM.
    pub divergence_threshold: f64,

    /// Maximum number of atomic predicates in a synthesised guard
    pub max_conjuncts: usize,

    /// Bypass PTA construction and merging; derive states from the places
    /// of an externally discovered Petri net. All guards come out trivial.
    pub use_inductive_miner: bool,

    /// Fraction of cases kept before learning, in `(0, 1]`.
    /// The deterministic head of the sorted case list is kept.
    pub log_sample_ratio: f64,

    /// Require identical outgoing-label sets in the compatibility test
    /// instead of comparing over common labels only
    pub require_matching_labels: bool,

    /// EFSM→DPN projection variant
    pub projection: ProjectionKind,

    /// Per-check budget of the guard validation solver, in milliseconds.
    /// A timed-out check rejects the candidate.
    pub solver_timeout_ms: u64,

    /// Cap on positive/negative examples per guard validation
    pub max_examples_per_side: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            divergence_threshold: 0.3,
            max_conjuncts: 3,
            use_inductive_miner: false,
            log_sample_ratio: 1.0,
            require_matching_labels: false,
            projection: ProjectionKind::Canonical,
            solver_timeout_ms: 5_000,
            max_examples_per_side: 50,
        }
    }
}

impl DiscoveryConfig {
    /// Range-check every knob
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.divergence_threshold) {
            return Err(ProcgraphError::config(format!(
                "divergence_threshold must be in [0, 1], got {}",
                self.divergence_threshold
            )));
        }
        if self.max_conjuncts < 1 {
            return Err(ProcgraphError::config("max_conjuncts must be at least 1"));
        }
        if !(self.log_sample_ratio > 0.0 && self.log_sample_ratio <= 1.0) {
            return Err(ProcgraphError::config(format!(
                "log_sample_ratio must be in (0, 1], got {}",
                self.log_sample_ratio
            )));
        }
        if self.solver_timeout_ms == 0 {
            return Err(ProcgraphError::config("solver_timeout_ms must be positive"));
        }
        if self.max_examples_per_side == 0 {
            return Err(ProcgraphError::config(
                "max_examples_per_side must be positive",
            ));
        }
        Ok(())
    }
}
