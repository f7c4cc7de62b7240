//! Test utilities
//!
//! In-memory repository implementations and fixtures for unit testing.
//!
//! The mocks are written by hand rather than generated: they keep real state,
//! so a test can run a whole flow through a service and then inspect the
//! stored result.

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
