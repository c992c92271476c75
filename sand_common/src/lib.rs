//! Sand Table Common Library
//!
//! Shared constants, configuration loading and pattern types for all
//! sand table workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Protocol tokens, limits and defaults
//! - [`config`] - Configuration loading traits and types
//! - [`pattern`] - Coordinates and `.thr` parsing
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use sand_common::prelude::*;
//!
//! let parsed = parse_thr("0 0\n1.5708 0.5\n");
//! assert_eq!(parsed.coordinates.len(), 2);
//! ```

pub mod config;
pub mod consts;
pub mod pattern;
pub mod prelude;
