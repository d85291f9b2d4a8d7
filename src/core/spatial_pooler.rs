//! The learning half of the `SpatialPooler`:
//! - Holds a set of columns, each with a proximal segment (its receptive-field pool)
//!   over the input space.
//! - Increases synapse permanence if the connected input bit was active, decreases it otherwise.
//! - Trims synapses whose permanence falls to the trim threshold out of the pool entirely.
//!
//! Which columns are active in a cycle (overlap, inhibition, boosting) is decided by the caller;
//! this module only adapts the columns it is handed.
//!
//! Each column selectively "tunes" its connections to represent frequently encountered
//! input patterns.

use super::{
    column::Column,
    connections::Connections,
    error::{HtmError, Result},
    permanence::PermanenceRule,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Options governing how proximal synapse permanence is adjusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynapsePermanenceOptions {
    /// Added to a synapse whose input bit was active (`SynPermActiveInc`).
    pub active_increment: f64,

    /// Subtracted from a synapse whose input bit was inactive (`SynPermInactiveDec`).
    pub inactive_decrement: f64,

    /// Permanence at which a synapse counts as connected.
    pub connected: f64,

    /// Synapses at or below this permanence are removed from the pool.
    pub trim_threshold: f64,
}

impl Default for SynapsePermanenceOptions {
    fn default() -> Self {
        Self::with_increments(0.05, 0.008)
    }
}

impl SynapsePermanenceOptions {
    /// Builds options from the two learning rates.
    /// The trim threshold is half the increment.
    pub fn with_increments(active_increment: f64, inactive_decrement: f64) -> Self {
        Self {
            active_increment,
            inactive_decrement,
            connected: 0.10,
            trim_threshold: active_increment / 2.0,
        }
    }

    /// Checks that every option lies in a range the pooler can learn with.
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        for (name, value) in [
            ("active_increment", self.active_increment),
            ("inactive_decrement", self.inactive_decrement),
            ("connected", self.connected),
            ("trim_threshold", self.trim_threshold),
        ] {
            if !unit.contains(&value) {
                return Err(HtmError::InvalidConfig(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// The rule a single `adapt_synapses` call applies.
    #[inline]
    pub fn rule(&self) -> PermanenceRule {
        PermanenceRule::new(
            self.active_increment,
            self.inactive_decrement,
            self.trim_threshold,
        )
    }
}

/// The SpatialPooler's adaptation state: its columns and their receptive-field pools.
pub struct SpatialPooler {
    /// A seeded pseudo-random number generator for reproducible permanence initialization.
    pub rand: StdRng,

    /// The total number of bits/inputs available.
    pub num_inputs: usize,

    /// The total number of columns in the Spatial Pooler.
    pub num_columns: usize,

    /// Settings for how synapse permanence is incremented/decremented and thresholds for
    /// trimming or connecting.
    pub synapse_permanence_options: SynapsePermanenceOptions,

    /// Fraction of each column's synapses that initially start out above the "connected" threshold.
    pub init_connected_percentage: f64,

    /// The number of adaptation passes performed so far.
    pub iteration_learn_num: u32,

    /// One column per index, each owning its proximal segment.
    columns: Vec<Column>,
}

impl SpatialPooler {
    /// Creates a new `SpatialPooler` whose columns register their proximal segments in
    /// `connections`.
    /// Every pool starts empty; see `Column::set_potential_pool`.
    pub fn new(
        connections: &Connections,
        num_inputs: usize,
        num_columns: usize,
        options: SynapsePermanenceOptions,
    ) -> Result<Self> {
        options.validate()?;
        let columns = (0..num_columns)
            .map(|index| Column::new(connections, index, num_inputs))
            .collect();

        Ok(Self {
            rand: StdRng::from_seed([42u8; 32]),
            num_inputs,
            num_columns,
            synapse_permanence_options: options,
            init_connected_percentage: 0.5,
            iteration_learn_num: 0,
            columns,
        })
    }

    #[inline]
    pub fn column(&self, column: usize) -> Result<&Column> {
        self.columns.get(column).ok_or(HtmError::InvalidColumn {
            column,
            num_columns: self.num_columns,
        })
    }

    #[inline]
    pub fn column_mut(&mut self, column: usize) -> Result<&mut Column> {
        let num_columns = self.num_columns;
        self.columns
            .get_mut(column)
            .ok_or(HtmError::InvalidColumn {
                column,
                num_columns,
            })
    }

    /// Dense permanences of a column's pool over the whole input space.
    pub fn permanences(&self, column: usize) -> Result<Vec<f64>> {
        Ok(self.column(column)?.permanences())
    }

    /// How many synapses of the column are at or above the connected threshold.
    pub fn connected_count(&self, column: usize) -> Result<usize> {
        let connected = self.synapse_permanence_options.connected;
        Ok(self
            .column(column)?
            .proximal()
            .synapses()
            .iter()
            .filter(|syn| syn.is_connected(connected))
            .count())
    }

    /// Randomizes the permanences of a column's existing pool:
    /// - With probability `init_connected_percentage` a synapse starts between `connected` and 1.0.
    /// - Otherwise it starts below `connected`.
    /// - Values at or below the trim threshold are stored as 0.0.
    pub fn init_permanences(&mut self, column: usize) -> Result<()> {
        let options = self.synapse_permanence_options.clone();
        let init_connected_percentage = self.init_connected_percentage;
        let num_inputs = self.num_inputs;
        let rand = &mut self.rand;
        let column = self
            .columns
            .get_mut(column)
            .ok_or(HtmError::InvalidColumn {
                column,
                num_columns: self.num_columns,
            })?;

        let mut dense = vec![0.0; num_inputs];
        for syn in column.proximal().synapses() {
            let random = if rand.random::<f64>() <= init_connected_percentage {
                options.connected + (1.0 - options.connected) * rand.random::<f64>()
            } else {
                options.connected * rand.random::<f64>()
            };
            if let Some(slot) = dense.get_mut(syn.source.0) {
                *slot = if random > options.trim_threshold {
                    (random * 100_000.0).round() / 100_000.0
                } else {
                    0.0
                };
            }
        }
        column.set_permanences(&dense);
        Ok(())
    }

    /// Adjusts synapses for each active column after an input is processed:
    /// - Increments permanence of synapses whose input bit was active.
    /// - Decrements permanence of synapses whose input bit was inactive.
    /// - Removes synapses that end at or below the trim threshold.
    ///
    /// Columns are adapted independently. The input length, every column index and the
    /// liveness of every active pool are checked before the first column is touched.
    /// A column whose pool is empty is skipped.
    pub fn adapt_synapses(
        &mut self,
        connections: &Connections,
        input_vector: &[bool],
        active_columns: &[usize],
    ) -> Result<()> {
        if input_vector.len() != self.num_inputs {
            return Err(HtmError::InputLength {
                expected: self.num_inputs,
                got: input_vector.len(),
            });
        }
        if let Some(&column) = active_columns.iter().find(|&&col| col >= self.num_columns) {
            return Err(HtmError::InvalidColumn {
                column,
                num_columns: self.num_columns,
            });
        }

        for &col in active_columns {
            let proximal = self.columns[col].proximal();
            proximal.check_registry(connections)?;
            connections.ensure_live(proximal.ordinal())?;
        }

        self.iteration_learn_num += 1;
        let rule = self.synapse_permanence_options.rule();
        let mut pruned = 0;
        for &col in active_columns {
            let proximal = self.columns[col].proximal_mut();
            // A pool that was never populated has nothing to tune.
            if proximal.is_empty() {
                log::debug!("column {col} has an empty pool, skipping adaptation");
                continue;
            }
            let outcome = proximal.adapt(connections, input_vector, &rule)?;
            pruned += outcome.pruned_synapses;
            if outcome.destroyed_segment {
                log::warn!("column {col} lost its last pool synapse, its pool was destroyed");
            }
        }

        if pruned > 0 {
            log::debug!(
                "adapt_synapses pass {}: trimmed {} synapses over {} columns",
                self.iteration_learn_num,
                pruned,
                active_columns.len()
            );
        }
        Ok(())
    }
}
