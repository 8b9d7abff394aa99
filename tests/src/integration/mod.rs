//! Integration scenarios.

pub mod chain_graph;
pub mod persistence;
pub mod sync_flows;
