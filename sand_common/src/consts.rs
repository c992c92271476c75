//! System-wide constants for the sand table workspace.
//!
//! Single source of truth for numeric limits, protocol tokens and defaults.
//! Imported by both crates; values are not repeated elsewhere.

// ─── Wire Protocol ──────────────────────────────────────────────────

/// Token the controller sends when its buffer can take the next batch.
pub const TOKEN_READY: &str = "READY";

/// Acknowledgment for single commands such as `HOME`.
pub const TOKEN_DONE: &str = "DONE";

/// Acknowledgment for the theta reset command.
pub const TOKEN_THETA_RESET: &str = "THETA_RESET";

/// Homing command.
pub const CMD_HOME: &str = "HOME";

/// Theta re-synchronisation command.
pub const CMD_RESET_THETA: &str = "RESET_THETA";

/// Fractional digits used for theta/rho on the wire.
pub const WIRE_DECIMALS: usize = 3;

/// Longest inbound line accepted before the link declares a protocol error.
pub const MAX_LINE_BYTES: usize = 4096;

// ─── Serial ─────────────────────────────────────────────────────────

/// Default serial baud rate.
pub const BAUD_RATE_DEFAULT: u32 = 115_200;

/// Default serial read timeout (poll granularity) [ms].
pub const READ_TIMEOUT_MS_DEFAULT: u64 = 100;

/// Default protocol deadline while waiting for an acknowledgment [ms].
pub const ACK_TIMEOUT_MS_DEFAULT: u64 = 30_000;

// ─── Motion ─────────────────────────────────────────────────────────

/// Default coordinates per transmitted batch.
pub const BATCH_SIZE_DEFAULT: usize = 5;

/// Upper bound for the batch size (controller buffer depth).
pub const BATCH_SIZE_MAX: usize = 64;

// ─── Scheduling ─────────────────────────────────────────────────────

/// Real-time priority of the motion streaming thread.
pub const MOTION_RT_PRIORITY: u8 = 60;

/// Real-time priority of auxiliary RT consumers (LED drivers etc.).
pub const AUXILIARY_RT_PRIORITY: u8 = 40;

/// Lowest valid real-time priority.
pub const RT_PRIORITY_MIN: u8 = 1;

/// Highest valid real-time priority.
pub const RT_PRIORITY_MAX: u8 = 99;

/// Niceness applied to background workers.
pub const BACKGROUND_NICE: i32 = 10;

/// Niceness requested when real-time scheduling is denied.
pub const FALLBACK_NICE: i32 = -10;

/// Valid niceness range.
pub const NICE_MIN: i32 = -20;
/// Valid niceness range.
pub const NICE_MAX: i32 = 19;

/// Core reserved for the real-time path.
pub const RESERVED_CORE: usize = 0;

// ─── Worker Pool ────────────────────────────────────────────────────

/// Worker count ceiling; throughput plateaus beyond this.
pub const POOL_MAX_WORKERS: usize = 3;

// ─── Homing ─────────────────────────────────────────────────────────

/// Highest BCM GPIO number on the 40-pin header.
pub const BCM_PIN_MAX: u8 = 27;

/// Default time to wait for the sensor after the controller reports home [ms].
pub const HOMING_SETTLE_MS_DEFAULT: u64 = 5_000;

// ─── Diagnostics ────────────────────────────────────────────────────

/// Default ring buffer capacity.
pub const DIAG_MAX_ENTRIES_DEFAULT: usize = 1000;

/// Default per-subscriber channel capacity.
pub const DIAG_SUBSCRIBER_CAPACITY_DEFAULT: usize = 100;
