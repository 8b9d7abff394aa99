//! # Domain Module
//!
//! Core domain types for header sync.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod network;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use network::*;
pub use value_objects::*;
