//! Hierarchical Temporal Memory (HTM) learning core.
//!
//! The `core` module holds the connection registry, the permanence model, segments and the two
//! adaptation algorithms: `SpatialPooler::adapt_synapses` for proximal pools and
//! `temporal_memory::adapt_segment` for distal segments.

pub mod core;

pub use crate::core::{
    column::Column,
    connections::{Connections, ConnectionsParams, SegmentOrdinal, SegmentOwner, SegmentRecord},
    error::{HtmError, Result},
    permanence::PermanenceRule,
    segment::{AdaptOutcome, Segment},
    spatial_pooler::{SpatialPooler, SynapsePermanenceOptions},
    synapses::{ActiveSources, CellIdx, InputIdx, Presynaptic, Synapse, SynapseId},
    temporal_memory::{adapt_segment, Cell, TemporalMemory, TemporalMemoryParams},
};
