//! Test utilities and helpers
//!
//! Fixtures and assertions shared by the unit tests, the integration tests
//! under `tests/` and the benchmarks.

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
