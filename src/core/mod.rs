//! Synaptic permanence adaptation and segment lifecycle shared by the Spatial Pooler
//! and the Temporal Memory.

pub mod column;
pub mod connections;
pub mod error;
pub mod permanence;
pub mod segment;
pub mod spatial_pooler;
pub mod synapses;
pub mod temporal_memory;
