//! `Connections` is the registry shared by the Spatial Pooler and the Temporal Memory.
//!
//! Segments themselves (and their synapses) are owned by the column or cell they hang
//! off. The registry only keeps the bookkeeping that must agree across all of them:
//! - the ordinal counter and the flat ordinal -> segment record list,
//! - the synapse id counter and the live synapse/segment counts,
//! - the active and matching segment sets of the most recent cycle.
//!
//! All of that lives behind a single mutex, so ordinals and ids are never duplicated
//! and no count update is lost when several threads create or adapt segments at once.
//! Per-synapse arithmetic happens on the segment itself and needs no locking.

use super::{
    error::{HtmError, Result},
    segment::Segment,
    synapses::{CellIdx, Presynaptic, SynapseId},
};
use fxhash::FxHashSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a segment: its position in the registry's flat list.
pub type SegmentOrdinal = usize;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(0);

/// What a segment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentOwner {
    /// The proximal dendrite of a column.
    Column(usize),
    /// A distal dendrite of a cell.
    Cell(CellIdx),
}

/// Registry-side view of a live segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRecord {
    pub owner: SegmentOwner,
    pub num_synapses: usize,
    pub max_synapses: usize,
}

/// Parameters shared by every segment the registry issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionsParams {
    /// Capacity of distal segments.
    pub max_synapses_per_segment: usize,

    /// Distal synapses at or below this permanence are destroyed during adaptation.
    pub synapse_epsilon: f64,
}

impl Default for ConnectionsParams {
    fn default() -> Self {
        Self {
            max_synapses_per_segment: 225,
            synapse_epsilon: 0.00001,
        }
    }
}

impl ConnectionsParams {
    /// Checks that the parameters describe a usable registry.
    pub fn validate(&self) -> Result<()> {
        if self.max_synapses_per_segment == 0 {
            return Err(HtmError::InvalidConfig(
                "max_synapses_per_segment must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.synapse_epsilon) {
            return Err(HtmError::InvalidConfig(format!(
                "synapse_epsilon must lie in [0, 1), got {}",
                self.synapse_epsilon
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Registry {
    /// Indexed by ordinal. Destroyed slots stay `None`, so `len()` is the next ordinal.
    segments: Vec<Option<SegmentRecord>>,
    num_segments: usize,
    next_synapse_id: u64,
    num_synapses: usize,
    active_segments: FxHashSet<SegmentOrdinal>,
    matching_segments: FxHashSet<SegmentOrdinal>,
}

impl Registry {
    fn live_mut(&mut self, ordinal: SegmentOrdinal) -> Result<&mut SegmentRecord> {
        self.segments
            .get_mut(ordinal)
            .and_then(Option::as_mut)
            .ok_or(HtmError::InvalidSegment { segment: ordinal })
    }

    fn remove(&mut self, ordinal: SegmentOrdinal) -> Option<SegmentRecord> {
        let record = self.segments.get_mut(ordinal)?.take()?;
        self.num_segments -= 1;
        self.num_synapses -= record.num_synapses;
        self.active_segments.remove(&ordinal);
        self.matching_segments.remove(&ordinal);
        log::debug!(
            "destroyed segment {} of {:?} ({} synapses released)",
            ordinal,
            record.owner,
            record.num_synapses
        );
        Some(record)
    }

    fn check_all_live(&self, ordinals: &[SegmentOrdinal]) -> Result<()> {
        for &ordinal in ordinals {
            if !matches!(self.segments.get(ordinal), Some(Some(_))) {
                return Err(HtmError::InvalidSegment { segment: ordinal });
            }
        }
        Ok(())
    }
}

/// The process-wide connection registry.
#[derive(Debug)]
pub struct Connections {
    id: u64,
    params: ConnectionsParams,
    registry: Mutex<Registry>,
}

impl Default for Connections {
    fn default() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            params: ConnectionsParams::default(),
            registry: Mutex::new(Registry::default()),
        }
    }
}

impl Connections {
    /// Creates an empty registry after validating `params`.
    pub fn new(params: ConnectionsParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            ..Self::default()
        })
    }

    /// Distinguishes this registry from every other one in the process.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn params(&self) -> &ConnectionsParams {
        &self.params
    }

    /// Creates a distal segment on `cell` with the configured capacity.
    pub fn create_distal_segment(&self, cell: CellIdx) -> Segment<CellIdx> {
        self.create_segment(
            SegmentOwner::Cell(cell),
            self.params.max_synapses_per_segment,
        )
    }

    /// Creates an empty segment for `owner` holding at most `max_synapses` synapses.
    pub fn create_segment<S: Presynaptic>(
        &self,
        owner: SegmentOwner,
        max_synapses: usize,
    ) -> Segment<S> {
        let mut registry = self.registry.lock();
        let ordinal = registry.segments.len();
        registry.segments.push(Some(SegmentRecord {
            owner,
            num_synapses: 0,
            max_synapses,
        }));
        registry.num_segments += 1;
        drop(registry);

        Segment::new(self.id, ordinal, owner, max_synapses)
    }

    /// Reserves room for one synapse on `ordinal` and issues its id.
    pub(crate) fn register_synapse(&self, ordinal: SegmentOrdinal) -> Result<SynapseId> {
        let mut registry = self.registry.lock();
        let record = registry.live_mut(ordinal)?;
        if record.num_synapses >= record.max_synapses {
            return Err(HtmError::Capacity {
                segment: ordinal,
                max: record.max_synapses,
            });
        }
        record.num_synapses += 1;
        registry.num_synapses += 1;
        let id = SynapseId(registry.next_synapse_id);
        registry.next_synapse_id += 1;
        Ok(id)
    }

    /// Fails unless `ordinal` is live. Used to validate before touching a segment.
    pub(crate) fn ensure_live(&self, ordinal: SegmentOrdinal) -> Result<()> {
        self.registry.lock().live_mut(ordinal).map(|_| ())
    }

    /// Releases `pruned` synapses of `ordinal` and destroys the segment once it holds none.
    ///
    /// Returns whether the segment was destroyed.
    pub(crate) fn release_synapses(
        &self,
        ordinal: SegmentOrdinal,
        pruned: usize,
    ) -> Result<bool> {
        let mut registry = self.registry.lock();
        let record = registry.live_mut(ordinal)?;
        debug_assert!(pruned <= record.num_synapses);
        record.num_synapses -= pruned;
        let emptied = record.num_synapses == 0;
        registry.num_synapses -= pruned;
        if emptied {
            registry.remove(ordinal);
        }
        Ok(emptied)
    }

    /// Removes a segment and all of its synapses from the bookkeeping.
    pub(crate) fn unregister_segment(&self, ordinal: SegmentOrdinal) -> Result<SegmentRecord> {
        self.registry
            .lock()
            .remove(ordinal)
            .ok_or(HtmError::InvalidSegment { segment: ordinal })
    }

    /// Number of live segments.
    pub fn num_segments(&self) -> usize {
        self.registry.lock().num_segments
    }

    /// Number of live synapses across all segments.
    pub fn num_synapses(&self) -> usize {
        self.registry.lock().num_synapses
    }

    /// Number of ordinals issued so far, live or destroyed.
    pub fn segment_flat_list_length(&self) -> usize {
        self.registry.lock().segments.len()
    }

    pub fn contains_segment(&self, ordinal: SegmentOrdinal) -> bool {
        matches!(self.registry.lock().segments.get(ordinal), Some(Some(_)))
    }

    /// The registry's record for a live segment.
    pub fn segment_record(&self, ordinal: SegmentOrdinal) -> Option<SegmentRecord> {
        self.registry.lock().segments.get(ordinal).copied().flatten()
    }

    /// Synapse count of a live segment as tracked by the registry.
    pub fn num_synapses_on_segment(&self, ordinal: SegmentOrdinal) -> Result<usize> {
        self.segment_record(ordinal)
            .map(|record| record.num_synapses)
            .ok_or(HtmError::InvalidSegment { segment: ordinal })
    }

    /// Ordinals of the live segments attached to `owner`, in creation order.
    pub fn segments_for_owner(&self, owner: SegmentOwner) -> Vec<SegmentOrdinal> {
        self.registry
            .lock()
            .segments
            .iter()
            .enumerate()
            .filter_map(|(ordinal, record)| match record {
                Some(record) if record.owner == owner => Some(ordinal),
                _ => None,
            })
            .collect()
    }

    /// Replaces the active segment set. Every ordinal must be live.
    pub fn set_active_segments(&self, ordinals: &[SegmentOrdinal]) -> Result<()> {
        let mut registry = self.registry.lock();
        registry.check_all_live(ordinals)?;
        registry.active_segments = ordinals.iter().copied().collect();
        Ok(())
    }

    /// Replaces the matching segment set. Every ordinal must be live.
    pub fn set_matching_segments(&self, ordinals: &[SegmentOrdinal]) -> Result<()> {
        let mut registry = self.registry.lock();
        registry.check_all_live(ordinals)?;
        registry.matching_segments = ordinals.iter().copied().collect();
        Ok(())
    }

    /// Active segments of the most recent cycle, sorted by ordinal.
    pub fn active_segments(&self) -> Vec<SegmentOrdinal> {
        let mut ordinals: Vec<_> = self
            .registry
            .lock()
            .active_segments
            .iter()
            .copied()
            .collect();
        ordinals.sort_unstable();
        ordinals
    }

    /// Matching segments of the most recent cycle, sorted by ordinal.
    pub fn matching_segments(&self) -> Vec<SegmentOrdinal> {
        let mut ordinals: Vec<_> = self
            .registry
            .lock()
            .matching_segments
            .iter()
            .copied()
            .collect();
        ordinals.sort_unstable();
        ordinals
    }

    pub fn is_active_segment(&self, ordinal: SegmentOrdinal) -> bool {
        self.registry.lock().active_segments.contains(&ordinal)
    }

    pub fn is_matching_segment(&self, ordinal: SegmentOrdinal) -> bool {
        self.registry.lock().matching_segments.contains(&ordinal)
    }

    /// Forgets the active and matching sets. Segments and synapses are kept.
    pub fn clear_activity(&self) {
        let mut registry = self.registry.lock();
        registry.active_segments.clear();
        registry.matching_segments.clear();
    }
}
