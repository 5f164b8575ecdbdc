//! # Stick Warfare Development Tools
//!
//! Command-line tools for development:
//! - Ability catalog and roster validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod validate;
