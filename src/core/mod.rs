//! Core algorithms – concurrent tree construction, size aggregation and
//! formatting.
//!
//! Nothing in this module writes output or reads user configuration.

pub mod fs;
pub mod size;
pub mod tree;
