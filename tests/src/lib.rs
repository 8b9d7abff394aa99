//! # Zeta Test Suite
//!
//! Cross-module scenarios for the header sync engine.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── integration/      # Store, service and quorum working together
//! │   ├── chain_graph.rs
//! │   ├── sync_flows.rs
//! │   └── persistence.rs
//! │
//! └── properties.rs     # proptest invariants
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p zeta-tests
//! cargo test -p zeta-tests integration::
//! cargo test -p zeta-tests properties::
//! ```

pub mod integration;
pub mod properties;
