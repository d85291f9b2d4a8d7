//! The permanence model: the numeric rule applied to a single synapse during learning.
//!
//! A synapse whose presynaptic source was active is reinforced by `increment`,
//! every other synapse is weakened by `decrement`. The result saturates at the
//! bounds of `[MIN_PERMANENCE, MAX_PERMANENCE]` instead of wrapping.
//!
//! Whether a weakened synapse survives is not decided here. The caller compares
//! the clipped value against its prune threshold (`PermanenceRule::prunes`).

use serde::{Deserialize, Serialize};

/// Lower bound of a stored permanence.
pub const MIN_PERMANENCE: f64 = 0.0;

/// Upper bound of a stored permanence.
pub const MAX_PERMANENCE: f64 = 1.0;

/// Clamps a permanence into `[MIN_PERMANENCE, MAX_PERMANENCE]`.
#[inline]
pub fn clip(permanence: f64) -> f64 {
    permanence.clamp(MIN_PERMANENCE, MAX_PERMANENCE)
}

/// Applies one learning step to a permanence and clips the result.
#[inline]
pub fn update(permanence: f64, was_active: bool, increment: f64, decrement: f64) -> f64 {
    if was_active {
        clip(permanence + increment)
    } else {
        clip(permanence - decrement)
    }
}

/// The constants one algorithm adapts with during a single call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PermanenceRule {
    /// Added to synapses whose source was active.
    pub increment: f64,

    /// Subtracted from synapses whose source was inactive.
    pub decrement: f64,

    /// Synapses whose updated permanence is at or below this value are destroyed.
    pub prune_threshold: f64,
}

impl PermanenceRule {
    /// Creates a rule from its three constants.
    pub fn new(increment: f64, decrement: f64, prune_threshold: f64) -> Self {
        Self {
            increment,
            decrement,
            prune_threshold,
        }
    }

    /// Returns the clipped permanence after one step.
    #[inline]
    pub fn apply(&self, permanence: f64, was_active: bool) -> f64 {
        update(permanence, was_active, self.increment, self.decrement)
    }

    /// True if a synapse with this (already clipped) permanence must be destroyed.
    #[inline]
    pub fn prunes(&self, permanence: f64) -> bool {
        permanence <= self.prune_threshold
    }
}
