//! A `Segment` is a dendrite: a container of synapses anchored to one column or cell.
//!
//! Proximal segments (a column's receptive-field pool) hold synapses to input bits,
//! distal segments hold synapses to cells. Both adapt the same way:
//! - every synapse is judged against one snapshot of the active sources,
//! - its permanence is stepped and clipped by the permanence model,
//! - synapses that end at or below the prune threshold are destroyed,
//! - a segment left without synapses is destroyed as well.
//!
//! The segment owns its synapses. The registry only mirrors the counts, and is updated
//! under its lock before the segment's synapses are touched, so a failed call never
//! leaves the segment half adapted.

use super::{
    connections::{Connections, SegmentOrdinal, SegmentOwner},
    error::{HtmError, Result},
    permanence::{self, PermanenceRule, MAX_PERMANENCE, MIN_PERMANENCE},
    synapses::{ActiveSources, Presynaptic, Synapse, SynapseId},
};

/// What one adaptation call changed structurally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdaptOutcome {
    /// Synapses destroyed because their permanence fell to the prune threshold.
    pub pruned_synapses: usize,

    /// True if the segment lost its last synapse and was destroyed.
    pub destroyed_segment: bool,
}

/// A dendritic segment holding synapses to sources of type `S`.
#[derive(Debug)]
pub struct Segment<S> {
    registry: u64,
    ordinal: SegmentOrdinal,
    owner: SegmentOwner,
    max_synapses: usize,
    synapses: Vec<Synapse<S>>,
    destroyed: bool,
}

impl<S: Presynaptic> Segment<S> {
    pub(crate) fn new(
        registry: u64,
        ordinal: SegmentOrdinal,
        owner: SegmentOwner,
        max_synapses: usize,
    ) -> Self {
        Self {
            registry,
            ordinal,
            owner,
            max_synapses,
            synapses: Vec::new(),
            destroyed: false,
        }
    }

    #[inline]
    pub fn ordinal(&self) -> SegmentOrdinal {
        self.ordinal
    }

    #[inline]
    pub fn owner(&self) -> SegmentOwner {
        self.owner
    }

    #[inline]
    pub fn max_synapses(&self) -> usize {
        self.max_synapses
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.synapses.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.synapses.is_empty()
    }

    /// True once the segment has been destroyed through this handle.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// All synapses in insertion order.
    #[inline]
    pub fn synapses(&self) -> &[Synapse<S>] {
        &self.synapses
    }

    pub fn synapse(&self, id: SynapseId) -> Option<&Synapse<S>> {
        self.synapses.iter().find(|syn| syn.id == id)
    }

    /// Current permanence of the synapse to `source`, if there is one.
    pub fn permanence(&self, source: S) -> Option<f64> {
        self.synapses
            .iter()
            .find(|syn| syn.source == source)
            .map(|syn| syn.permanence)
    }

    /// Permanences laid out by source index. Sources without a synapse read as 0.0,
    /// sources at or past `len` are left out.
    pub fn dense_permanences(&self, len: usize) -> Vec<f64> {
        let mut dense = vec![0.0; len];
        for syn in &self.synapses {
            if let Some(slot) = dense.get_mut(syn.source.index()) {
                *slot = syn.permanence;
            }
        }
        dense
    }

    /// `(source, permanence)` pairs sorted by source.
    pub fn sparse_permanences(&self) -> Vec<(S, f64)> {
        let mut sparse: Vec<_> = self
            .synapses
            .iter()
            .map(|syn| (syn.source, syn.permanence))
            .collect();
        sparse.sort_unstable_by_key(|&(source, _)| source);
        sparse
    }

    /// Sources whose synapse permanence is at least `threshold`, sorted.
    pub fn connected_sources(&self, threshold: f64) -> Vec<S> {
        let mut sources: Vec<_> = self
            .synapses
            .iter()
            .filter(|syn| syn.is_connected(threshold))
            .map(|syn| syn.source)
            .collect();
        sources.sort_unstable();
        sources
    }

    /// Fails with `InvalidSegment` unless the segment is live in `connections`.
    pub(crate) fn check_registry(&self, connections: &Connections) -> Result<()> {
        if connections.id() != self.registry || self.destroyed {
            return Err(HtmError::InvalidSegment {
                segment: self.ordinal,
            });
        }
        Ok(())
    }

    /// Creates a synapse to `source`.
    ///
    /// The permanence is stored as given. Values outside `[0, 1]` are tolerated and
    /// pulled into range by the first adaptation.
    pub fn add_synapse(
        &mut self,
        connections: &Connections,
        source: S,
        permanence: f64,
    ) -> Result<SynapseId> {
        self.check_registry(connections)?;
        if self.synapses.iter().any(|syn| syn.source == source) {
            connections.ensure_live(self.ordinal)?;
            return Err(HtmError::DuplicateSource {
                segment: self.ordinal,
            });
        }

        let id = connections.register_synapse(self.ordinal)?;
        if !(MIN_PERMANENCE..=MAX_PERMANENCE).contains(&permanence) {
            log::debug!(
                "synapse {:?} on segment {} created with out-of-range permanence {}",
                source,
                self.ordinal,
                permanence
            );
        }
        self.synapses.push(Synapse {
            id,
            source,
            permanence,
        });
        Ok(id)
    }

    /// Adapts every synapse against `active` using `rule`.
    ///
    /// Synapses whose new permanence is at or below `rule.prune_threshold` are destroyed,
    /// and the segment itself is destroyed if none remain.
    pub fn adapt<A>(
        &mut self,
        connections: &Connections,
        active: &A,
        rule: &PermanenceRule,
    ) -> Result<AdaptOutcome>
    where
        A: ActiveSources<S> + ?Sized,
    {
        self.check_registry(connections)?;

        let updated: Vec<f64> = self
            .synapses
            .iter()
            .map(|syn| rule.apply(syn.permanence, active.is_active(syn.source)))
            .collect();
        let pruned = updated.iter().filter(|&&p| rule.prunes(p)).count();

        // Bookkeeping first: an unknown segment fails here with nothing mutated.
        let destroyed = connections.release_synapses(self.ordinal, pruned)?;

        let mut updated = updated.into_iter();
        let ordinal = self.ordinal;
        self.synapses.retain_mut(|syn| match updated.next() {
            Some(p) if rule.prunes(p) => {
                log::trace!("pruned synapse {:?} from segment {}", syn.id, ordinal);
                false
            }
            Some(p) => {
                syn.permanence = p;
                true
            }
            None => true,
        });

        if destroyed {
            self.destroyed = true;
        }

        Ok(AdaptOutcome {
            pruned_synapses: pruned,
            destroyed_segment: destroyed,
        })
    }

    /// Destroys one synapse. Returns true if that emptied, and so destroyed, the segment.
    pub fn destroy_synapse(&mut self, connections: &Connections, id: SynapseId) -> Result<bool> {
        self.check_registry(connections)?;
        let position = self
            .synapses
            .iter()
            .position(|syn| syn.id == id)
            .ok_or(HtmError::InvalidSynapse {
                segment: self.ordinal,
                synapse: id.0,
            })?;

        let destroyed = connections.release_synapses(self.ordinal, 1)?;
        self.synapses.swap_remove(position);
        if destroyed {
            self.destroyed = true;
        }
        Ok(destroyed)
    }

    /// Destroys the segment together with all of its synapses.
    pub fn destroy(&mut self, connections: &Connections) -> Result<()> {
        self.check_registry(connections)?;
        connections.unregister_segment(self.ordinal)?;
        self.synapses.clear();
        self.destroyed = true;
        Ok(())
    }

    /// Overwrites permanences of existing synapses from a vector indexed by source.
    ///
    /// Values are clipped. Sources past the end of `dense` keep their permanence.
    pub fn set_permanences(&mut self, dense: &[f64]) {
        for syn in &mut self.synapses {
            if let Some(&p) = dense.get(syn.source.index()) {
                syn.permanence = permanence::clip(p);
            }
        }
    }
}
