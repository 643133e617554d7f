//! Core data types, unit conversions, and the safety classifier for the
//! AAG CloudWatcher weather station.
//!
//! This crate is pure: no serial I/O, no HTTP, no clock side effects beyond
//! what callers pass in. It mirrors the role of a pipeline's "core" crate —
//! the shapes and math that every other layer builds on.

pub mod ring;
pub mod safety;
pub mod types;
pub mod units;

pub use ring::*;
pub use safety::*;
pub use types::*;
pub use units::*;
