//! A `Column` in HTM represents one feature detector or receptive field in the Spatial Pooler.
//!
//! Biological inspiration:
//! Columns in HTM are inspired by cortical mini-columns found in the brain.
//! They consist of a group of neurons, which in HTM are modeled as "cells".
//!
//! Meaning in HTM:
//! Each column receives input from a subset of the input space through its proximal
//! segment, the receptive-field pool. During learning the column adjusts the permanence
//! of each pool synapse (the strength of the connection to an input bit) and thereby
//! becomes selective for particular input patterns.

use super::{
    connections::{Connections, SegmentOwner},
    error::{HtmError, Result},
    segment::Segment,
    synapses::InputIdx,
};

/// Represents a cortical column in the HTM model.
#[derive(Debug)]
pub struct Column {
    /// The index of the column.
    pub index: usize,

    /// The number of input bits the column can connect to.
    num_inputs: usize,

    /// The receptive-field pool over input bits.
    proximal: Segment<InputIdx>,
}

impl Column {
    /// Creates a new Column with an empty proximal segment registered in `connections`.
    pub fn new(connections: &Connections, index: usize, num_inputs: usize) -> Self {
        Self {
            index,
            num_inputs,
            proximal: connections.create_segment(SegmentOwner::Column(index), num_inputs),
        }
    }

    #[inline]
    pub fn proximal(&self) -> &Segment<InputIdx> {
        &self.proximal
    }

    #[inline]
    pub fn proximal_mut(&mut self) -> &mut Segment<InputIdx> {
        &mut self.proximal
    }

    /// Connects the column to every input in `inputs` with zero permanence.
    ///
    /// All indices are checked before the first synapse is created.
    pub fn set_potential_pool(
        &mut self,
        connections: &Connections,
        inputs: &[usize],
    ) -> Result<()> {
        if let Some(&input) = inputs.iter().find(|&&input| input >= self.num_inputs) {
            return Err(HtmError::InvalidInput {
                input,
                num_inputs: self.num_inputs,
            });
        }
        for &input in inputs {
            self.proximal.add_synapse(connections, InputIdx(input), 0.0)?;
        }
        Ok(())
    }

    /// Overwrites the pool's permanences from a dense vector indexed by input bit.
    pub fn set_permanences(&mut self, permanences: &[f64]) {
        self.proximal.set_permanences(permanences);
    }

    /// Dense permanences over the whole input space.
    pub fn permanences(&self) -> Vec<f64> {
        self.proximal.dense_permanences(self.num_inputs)
    }
}
