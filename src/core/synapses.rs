//! A `Synapse` models a single connection from a presynaptic source to a segment.
//!
//! Proximal synapses read from input bits (`InputIdx`), distal synapses read from
//! cells (`CellIdx`). Both carry a permanence value: above a connection threshold the
//! synapse counts as "connected" for overlap and prediction, which happens outside
//! this crate. During learning the permanence is increased or decreased depending on
//! whether the source was active in the reference cycle.
//!
//! Each synapse receives a `SynapseId` from the registry when it is created. The id is
//! never handed out again, so a destroyed synapse cannot be revived by accident.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::{BuildHasher, Hash};

/// Stable identity of a synapse, unique within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SynapseId(pub u64);

/// Index of an input bit, the source type of proximal synapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InputIdx(pub usize);

/// Global index of a cell, the source type of distal synapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIdx(pub usize);

/// Something a synapse can read activity from.
pub trait Presynaptic: Copy + Eq + Hash + Ord + Debug {
    /// The flat index used for dense permanence vectors.
    fn index(self) -> usize;
}

impl Presynaptic for InputIdx {
    #[inline]
    fn index(self) -> usize {
        self.0
    }
}

impl Presynaptic for CellIdx {
    #[inline]
    fn index(self) -> usize {
        self.0
    }
}

/// Read-only view of which sources were active in the reference cycle.
pub trait ActiveSources<S> {
    fn is_active(&self, source: S) -> bool;
}

impl<S, H> ActiveSources<S> for HashSet<S, H>
where
    S: Eq + Hash,
    H: BuildHasher,
{
    #[inline]
    fn is_active(&self, source: S) -> bool {
        self.contains(&source)
    }
}

/// A dense binary input vector, indexed by input bit. Bits past the end are inactive.
impl ActiveSources<InputIdx> for [bool] {
    #[inline]
    fn is_active(&self, source: InputIdx) -> bool {
        self.get(source.0).copied().unwrap_or(false)
    }
}

/// A synapse connecting a presynaptic source with an associated permanence value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Synapse<S> {
    /// Identity issued by the registry.
    pub id: SynapseId,

    /// Which input bit or cell this synapse reads from.
    pub source: S,

    /// Represents the strength of the connection.
    pub permanence: f64,
}

impl<S: Presynaptic> Synapse<S> {
    /// True if the permanence has reached `threshold`.
    #[inline]
    pub fn is_connected(&self, threshold: f64) -> bool {
        self.permanence >= threshold
    }
}
