//! The `TemporalMemory` module holds the distal side of HTM learning.
//!
//! At a high level, it models a set of columns, where each column contains multiple cells.
//! Each cell can form multiple dendritic segments, which in turn consist of synapses.
//!
//! Cell:
//! - An individual processing unit within a column, identified by a global index.
//! - Cells are responsible for representing different contexts of the same input.
//!
//! Dendritic Segment (Segment):
//! - A cluster of synapses on a cell that detects patterns of activity from other cells.
//! - Each segment learns to recognize sequences by forming connections to presynaptic cells.
//!
//! Synapse:
//! - A connection from a presynaptic cell (i.e., a cell that provided input) to a dendritic
//!   segment.
//! - Each synapse has a permanence value that indicates the strength of the connection.
//!
//! How learning works here:
//! - The caller decides which segments learn in a cycle (predicted, bursting or punished columns).
//! - `adapt_segment` reinforces synapses whose presynaptic cell was active in the previous cycle
//!   and punishes the others, following Hebbian-like learning rules.
//! - Synapses that decay to the epsilon threshold disappear, and so does a segment left
//!   without any.
//! - New synapses may be grown on segments to incorporate previously winning cells.

use super::{
    connections::{Connections, SegmentOrdinal, SegmentOwner},
    error::{HtmError, Result},
    permanence::PermanenceRule,
    segment::{AdaptOutcome, Segment},
    synapses::{ActiveSources, CellIdx, SynapseId},
};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Holds the parameters required for distal learning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalMemoryParams {
    pub connected_permanence: f64,
    pub initial_permanence: f64,
    pub permanence_increment: f64,
    pub permanence_decrement: f64,
}

impl Default for TemporalMemoryParams {
    fn default() -> Self {
        Self {
            connected_permanence: 0.5,
            initial_permanence: 0.21,
            permanence_increment: 0.10,
            permanence_decrement: 0.10,
        }
    }
}

impl TemporalMemoryParams {
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        for (name, value) in [
            ("connected_permanence", self.connected_permanence),
            ("initial_permanence", self.initial_permanence),
            ("permanence_increment", self.permanence_increment),
            ("permanence_decrement", self.permanence_decrement),
        ] {
            if !unit.contains(&value) {
                return Err(HtmError::InvalidConfig(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Represents a cell that owns zero or more distal segments.
#[derive(Debug, Default)]
pub struct Cell {
    segments: Vec<Segment<CellIdx>>,
}

impl Cell {
    /// The cell's live segments in creation order.
    #[inline]
    pub fn segments(&self) -> &[Segment<CellIdx>] {
        &self.segments
    }
}

/// Adapts one distal segment against the cells that were active in the previous cycle.
///
/// Synapses to active cells gain `increment`, all others lose `decrement`. Synapses that end
/// at or below the registry's `synapse_epsilon` are destroyed, and the segment with them once
/// it is empty. No synapses are created here.
pub fn adapt_segment<A>(
    connections: &Connections,
    segment: &mut Segment<CellIdx>,
    prev_active_cells: &A,
    increment: f64,
    decrement: f64,
) -> Result<AdaptOutcome>
where
    A: ActiveSources<CellIdx> + ?Sized,
{
    let rule = PermanenceRule::new(increment, decrement, connections.params().synapse_epsilon);
    segment.adapt(connections, prev_active_cells, &rule)
}

/// Owns the cells of a temporal memory and the distal segments grown on them.
pub struct TemporalMemory {
    params: TemporalMemoryParams,
    cells_per_column: usize,
    cells: Vec<Cell>,
    rand: StdRng,
}

impl TemporalMemory {
    /// Constructs a Temporal Memory with `num_columns * cells_per_column` cells and no segments.
    pub fn new(
        num_columns: usize,
        cells_per_column: usize,
        params: TemporalMemoryParams,
    ) -> Result<Self> {
        params.validate()?;
        if cells_per_column == 0 {
            return Err(HtmError::InvalidConfig(
                "cells_per_column must be at least 1".into(),
            ));
        }
        let cells = (0..num_columns * cells_per_column)
            .map(|_| Cell::default())
            .collect();

        Ok(Self {
            params,
            cells_per_column,
            cells,
            rand: StdRng::from_seed([42u8; 32]),
        })
    }

    #[inline]
    pub fn params(&self) -> &TemporalMemoryParams {
        &self.params
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Global index of the `cell`-th cell in `column`.
    #[inline]
    pub fn cell_index(&self, column: usize, cell: usize) -> CellIdx {
        CellIdx(column * self.cells_per_column + cell)
    }

    /// The column a cell belongs to.
    #[inline]
    pub fn column_for_cell(&self, cell: CellIdx) -> usize {
        cell.0 / self.cells_per_column
    }

    fn check_cell(&self, cell: CellIdx) -> Result<()> {
        if cell.0 >= self.cells.len() {
            return Err(HtmError::InvalidCell {
                cell: cell.0,
                num_cells: self.cells.len(),
            });
        }
        Ok(())
    }

    /// Finds the (cell, position) of a live segment owned by this temporal memory.
    fn locate(
        &self,
        connections: &Connections,
        ordinal: SegmentOrdinal,
    ) -> Result<(usize, usize)> {
        let invalid = HtmError::InvalidSegment { segment: ordinal };
        let cell = match connections.segment_record(ordinal).map(|record| record.owner) {
            Some(SegmentOwner::Cell(cell)) if cell.0 < self.cells.len() => cell.0,
            _ => return Err(invalid),
        };
        let position = self.cells[cell]
            .segments
            .iter()
            .position(|segment| segment.ordinal() == ordinal)
            .ok_or(invalid)?;
        Ok((cell, position))
    }

    /// The live segments of a cell.
    pub fn segments_for_cell(&self, cell: CellIdx) -> Result<&[Segment<CellIdx>]> {
        self.check_cell(cell)?;
        Ok(self.cells[cell.0].segments())
    }

    /// A live segment by ordinal.
    pub fn segment(
        &self,
        connections: &Connections,
        ordinal: SegmentOrdinal,
    ) -> Result<&Segment<CellIdx>> {
        let (cell, position) = self.locate(connections, ordinal)?;
        Ok(&self.cells[cell].segments[position])
    }

    /// Grows a new, empty distal segment on `cell` and returns its ordinal.
    pub fn create_segment(
        &mut self,
        connections: &Connections,
        cell: CellIdx,
    ) -> Result<SegmentOrdinal> {
        self.check_cell(cell)?;
        let segment = connections.create_distal_segment(cell);
        let ordinal = segment.ordinal();
        self.cells[cell.0].segments.push(segment);
        Ok(ordinal)
    }

    /// Creates a synapse from `presynaptic` onto a segment.
    ///
    /// Fails with `HtmError::Capacity` once the segment is full.
    pub fn create_synapse(
        &mut self,
        connections: &Connections,
        segment: SegmentOrdinal,
        presynaptic: CellIdx,
        permanence: f64,
    ) -> Result<SynapseId> {
        self.check_cell(presynaptic)?;
        let (cell, position) = self.locate(connections, segment)?;
        self.cells[cell].segments[position].add_synapse(connections, presynaptic, permanence)
    }

    /// Adapts a segment owned by this temporal memory. A segment destroyed by the
    /// adaptation is dropped from its cell.
    pub fn adapt_segment<A>(
        &mut self,
        connections: &Connections,
        segment: SegmentOrdinal,
        prev_active_cells: &A,
        increment: f64,
        decrement: f64,
    ) -> Result<AdaptOutcome>
    where
        A: ActiveSources<CellIdx> + ?Sized,
    {
        let (cell, position) = self.locate(connections, segment)?;
        let segments = &mut self.cells[cell].segments;
        let outcome = adapt_segment(
            connections,
            &mut segments[position],
            prev_active_cells,
            increment,
            decrement,
        )?;
        if outcome.destroyed_segment {
            segments.remove(position);
        }
        Ok(outcome)
    }

    /// Grows up to `count` new synapses on a segment:
    /// - Shuffles the candidate presynaptic cells (typically the previous winner cells).
    /// - Skips candidates the segment is already connected to.
    /// - Stops once `count` synapses were added or the segment is full.
    ///
    /// Returns how many synapses were grown.
    pub fn grow_synapses(
        &mut self,
        connections: &Connections,
        segment: SegmentOrdinal,
        candidates: &[CellIdx],
        count: usize,
    ) -> Result<usize> {
        if let Some(&cell) = candidates.iter().find(|cell| cell.0 >= self.cells.len()) {
            return Err(HtmError::InvalidCell {
                cell: cell.0,
                num_cells: self.cells.len(),
            });
        }
        let (cell, position) = self.locate(connections, segment)?;

        let mut candidates = candidates.to_vec();
        candidates.shuffle(&mut self.rand);

        let initial_permanence = self.params.initial_permanence;
        let segment = &mut self.cells[cell].segments[position];
        let mut grown = 0;
        for presynaptic in candidates {
            if grown == count || segment.len() == segment.max_synapses() {
                break;
            }
            if segment.permanence(presynaptic).is_some() {
                continue;
            }
            segment.add_synapse(connections, presynaptic, initial_permanence)?;
            grown += 1;
        }
        Ok(grown)
    }

    /// Forgets the active and matching segments of the last cycle.
    pub fn reset(&self, connections: &Connections) {
        connections.clear_activity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connections::ConnectionsParams;
    use fxhash::FxHashSet;

    fn cells(indices: &[usize]) -> FxHashSet<CellIdx> {
        indices.iter().map(|&c| CellIdx(c)).collect()
    }

    #[test]
    fn cell_indices_are_column_major() {
        let tm = TemporalMemory::new(4, 8, TemporalMemoryParams::default()).unwrap();
        assert_eq!(tm.num_cells(), 32);
        assert_eq!(tm.cell_index(2, 3), CellIdx(19));
        assert_eq!(tm.column_for_cell(CellIdx(19)), 2);
    }

    #[test]
    fn segments_live_on_their_cell() {
        let conns = Connections::default();
        let mut tm = TemporalMemory::new(4, 8, TemporalMemoryParams::default()).unwrap();
        let a = tm.create_segment(&conns, CellIdx(0)).unwrap();
        let b = tm.create_segment(&conns, CellIdx(0)).unwrap();

        let ordinals: Vec<_> = tm
            .segments_for_cell(CellIdx(0))
            .unwrap()
            .iter()
            .map(|s| s.ordinal())
            .collect();
        assert_eq!(ordinals, vec![a, b]);
        assert!(tm.create_segment(&conns, CellIdx(32)).is_err());
    }

    #[test]
    fn destroyed_segment_leaves_its_cell() {
        let conns = Connections::default();
        let mut tm = TemporalMemory::new(4, 8, TemporalMemoryParams::default()).unwrap();
        let seg = tm.create_segment(&conns, CellIdx(5)).unwrap();
        tm.create_synapse(&conns, seg, CellIdx(9), 0.05).unwrap();

        let outcome = tm
            .adapt_segment(&conns, seg, &cells(&[]), 0.1, 0.1)
            .unwrap();
        assert!(outcome.destroyed_segment);
        assert!(tm.segments_for_cell(CellIdx(5)).unwrap().is_empty());
        assert_eq!(
            tm.adapt_segment(&conns, seg, &cells(&[]), 0.1, 0.1),
            Err(HtmError::InvalidSegment { segment: seg })
        );
    }

    #[test]
    fn grow_synapses_skips_existing_and_stops_at_capacity() {
        let conns = Connections::new(ConnectionsParams {
            max_synapses_per_segment: 3,
            ..Default::default()
        })
        .unwrap();
        let mut tm = TemporalMemory::new(4, 8, TemporalMemoryParams::default()).unwrap();
        let seg = tm.create_segment(&conns, CellIdx(0)).unwrap();
        tm.create_synapse(&conns, seg, CellIdx(10), 0.3).unwrap();

        let candidates: Vec<_> = (10..20).map(CellIdx).collect();
        let grown = tm.grow_synapses(&conns, seg, &candidates, 5).unwrap();

        assert_eq!(grown, 2);
        let segment = tm.segment(&conns, seg).unwrap();
        assert_eq!(segment.len(), 3);
        assert_eq!(segment.permanence(CellIdx(10)), Some(0.3));
        assert!(segment
            .synapses()
            .iter()
            .filter(|syn| syn.source != CellIdx(10))
            .all(|syn| syn.permanence == 0.21));
    }

    #[test]
    fn grow_synapses_honours_count() {
        let conns = Connections::default();
        let mut tm = TemporalMemory::new(4, 8, TemporalMemoryParams::default()).unwrap();
        let seg = tm.create_segment(&conns, CellIdx(0)).unwrap();
        let candidates: Vec<_> = (1..30).map(CellIdx).collect();
        assert_eq!(tm.grow_synapses(&conns, seg, &candidates, 4).unwrap(), 4);
        assert_eq!(conns.num_synapses(), 4);
    }

    #[test]
    fn reset_clears_activity() {
        let conns = Connections::default();
        let mut tm = TemporalMemory::new(4, 8, TemporalMemoryParams::default()).unwrap();
        let seg = tm.create_segment(&conns, CellIdx(1)).unwrap();
        conns.set_active_segments(&[seg]).unwrap();
        conns.set_matching_segments(&[seg]).unwrap();

        tm.reset(&conns);
        assert!(conns.active_segments().is_empty());
        assert!(conns.matching_segments().is_empty());
        assert_eq!(conns.num_segments(), 1);
    }
}
