//! Error types for synapse creation and adaptation.
//!
//! Every failure is synchronous and leaves the targeted segment untouched:
//! the checks that can fail run before any permanence or bookkeeping is changed.

use super::connections::SegmentOrdinal;
use thiserror::Error;

/// Errors raised by the connection registry and the adaptation algorithms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HtmError {
    /// A synapse creation would exceed the segment's capacity.
    #[error("segment {segment} already holds the maximum of {max} synapses")]
    Capacity { segment: SegmentOrdinal, max: usize },

    /// The segment was destroyed, or was issued by a different registry.
    #[error("segment {segment} does not exist in this registry")]
    InvalidSegment { segment: SegmentOrdinal },

    /// The synapse is not (or no longer) on the segment.
    #[error("synapse {synapse} is not on segment {segment}")]
    InvalidSynapse { segment: SegmentOrdinal, synapse: u64 },

    /// A column index outside the pooler.
    #[error("column {column} is out of range (num_columns = {num_columns})")]
    InvalidColumn { column: usize, num_columns: usize },

    /// A cell index outside the temporal memory.
    #[error("cell {cell} is out of range (num_cells = {num_cells})")]
    InvalidCell { cell: usize, num_cells: usize },

    /// An input bit outside the input space.
    #[error("input {input} is out of range (num_inputs = {num_inputs})")]
    InvalidInput { input: usize, num_inputs: usize },

    /// The segment already has a synapse to this presynaptic source.
    #[error("segment {segment} already has a synapse to this source")]
    DuplicateSource { segment: SegmentOrdinal },

    /// An input vector whose length does not match the input space.
    #[error("input length mismatch: expected {expected}, got {got}")]
    InputLength { expected: usize, got: usize },

    /// A parameter struct failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HtmError>;
