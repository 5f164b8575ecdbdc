//! # SW Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Roster and match fixtures
//! - Recording listeners and scripted abilities
//! - Input scripts that drive a match like a player would
//! - Determinism test harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod script;

/// Re-export proptest for convenience.
pub use proptest;
