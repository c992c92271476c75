//! # Sand Table Control Core
//!
//! Motion streaming, scheduling and diagnostics for a kinetic sand table.
//!
//! # Module Structure
//!
//! - [`sched`] - Priority and CPU affinity for real-time and background work
//! - [`pool`] - Isolated worker processes for CPU-bound offline tasks
//! - [`link`] - Batch-and-acknowledge streaming to the motion controller
//! - [`homing`] - Home-position sensor (GPIO or disabled)
//! - [`diagnostics`] - Bounded event history with live subscribers
//! - [`context`] - Process-wide registry passed to every component
//!
//! # Architecture
//!
//! ```text
//!  core 0 (SCHED_RR)                cores 1.. (nice +10)
//!  ┌──────────────┐   serial        ┌──────────────────────┐
//!  │  MotionLink  │◄────────► MCU   │ WorkerPool (≤3 procs)│
//!  └──────┬───────┘                 └──────────┬───────────┘
//!         │ HOME                               │
//!  ┌──────▼───────┐                            │
//!  │ HomingSensor │                            │
//!  └──────────────┘                            │
//!         └────────── tracing ─────────────────┘
//!                        ▼
//!                 DiagnosticsBus ──► subscribers
//! ```

pub mod context;
pub mod diagnostics;
pub mod homing;
pub mod link;
pub mod pool;
pub mod sched;
