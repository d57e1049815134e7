//! Plain data types for ash: stages, exit outcomes, and task records.
//!
//! This crate is a leaf dependency with no async runtime and no I/O. It exists
//! so that embedders can inspect pipeline and batch results without pulling in
//! the execution engine.

pub mod outcome;
pub mod stage;
pub mod task;

pub use outcome::*;
pub use stage::*;
pub use task::*;
