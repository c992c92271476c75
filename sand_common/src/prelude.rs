//! Prelude module for common re-exports.
//!
//! ```rust
//! use sand_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, TableConfig};

// ─── Patterns ───────────────────────────────────────────────────────
pub use crate::pattern::{Coordinate, ParsedPattern, PatternExtents, load_thr, parse_thr};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{BATCH_SIZE_DEFAULT, MOTION_RT_PRIORITY};
