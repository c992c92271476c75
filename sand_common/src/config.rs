//! Configuration loading traits and types.
//!
//! A sand table is configured from a single TOML file. Every section has
//! defaults, so an empty file is valid.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sand_common::config::{ConfigLoader, ConfigError, TableConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = TableConfig::load(Path::new("table.toml"))?;
//!     config.validate()?;
//!     println!("Serial port: {}", config.serial.port);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::{
    ACK_TIMEOUT_MS_DEFAULT, AUXILIARY_RT_PRIORITY, BACKGROUND_NICE, BATCH_SIZE_DEFAULT,
    BATCH_SIZE_MAX, BAUD_RATE_DEFAULT, BCM_PIN_MAX, DIAG_MAX_ENTRIES_DEFAULT,
    DIAG_SUBSCRIBER_CAPACITY_DEFAULT, FALLBACK_NICE, HOMING_SETTLE_MS_DEFAULT, MOTION_RT_PRIORITY,
    NICE_MAX, NICE_MIN, READ_TIMEOUT_MS_DEFAULT, RT_PRIORITY_MAX, RT_PRIORITY_MIN,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging and diagnostics events.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Upper-case name as shown to dashboards.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::ParseError(format!("unknown log level '{other}'"))),
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "sand-table-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "sand-table".to_string(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Sections ───────────────────────────────────────────────────────

/// Serial link to the motion controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0`).
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout of a single serial read [ms].
    pub read_timeout_ms: u64,
    /// Deadline for READY / DONE / THETA_RESET [ms]; 0 waits forever.
    pub ack_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: BAUD_RATE_DEFAULT,
            read_timeout_ms: READ_TIMEOUT_MS_DEFAULT,
            ack_timeout_ms: ACK_TIMEOUT_MS_DEFAULT,
        }
    }
}

impl SerialConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.is_empty() {
            return Err(ConfigError::ValidationError(
                "serial.port cannot be empty".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "serial.baud_rate must be > 0".to_string(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "serial.read_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Batching of the coordinate stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Coordinates per batch.
    pub batch_size: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE_DEFAULT,
        }
    }
}

impl MotionConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > BATCH_SIZE_MAX {
            return Err(ConfigError::ValidationError(format!(
                "motion.batch_size {} out of range [1, {}]",
                self.batch_size, BATCH_SIZE_MAX
            )));
        }
        Ok(())
    }
}

/// Priority targets for the two work classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// RT priority of the motion thread.
    pub motion_priority: u8,
    /// RT priority of auxiliary real-time consumers.
    pub auxiliary_priority: u8,
    /// Niceness of background workers.
    pub background_nice: i32,
    /// Niceness requested when RT scheduling is denied.
    pub fallback_nice: i32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            motion_priority: MOTION_RT_PRIORITY,
            auxiliary_priority: AUXILIARY_RT_PRIORITY,
            background_nice: BACKGROUND_NICE,
            fallback_nice: FALLBACK_NICE,
        }
    }
}

impl SchedulingConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("motion_priority", self.motion_priority),
            ("auxiliary_priority", self.auxiliary_priority),
        ] {
            if !(RT_PRIORITY_MIN..=RT_PRIORITY_MAX).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "scheduling.{name} {value} out of range [{RT_PRIORITY_MIN}, {RT_PRIORITY_MAX}]"
                )));
            }
        }
        for (name, value) in [
            ("background_nice", self.background_nice),
            ("fallback_nice", self.fallback_nice),
        ] {
            if !(NICE_MIN..=NICE_MAX).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "scheduling.{name} {value} out of range [{NICE_MIN}, {NICE_MAX}]"
                )));
            }
        }
        Ok(())
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Optional ceiling below the automatic size.
    pub max_workers: Option<usize>,
}

impl PoolConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == Some(0) {
            return Err(ConfigError::ValidationError(
                "pool.max_workers must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Homing sensor binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingSensorConfig {
    /// BCM pin number; `None` disables the sensor.
    pub pin: Option<u8>,
    /// Reverse the raw pin level.
    pub invert: bool,
    /// Wait for the sensor after the controller reports home [ms].
    pub settle_timeout_ms: u64,
}

impl Default for HomingSensorConfig {
    fn default() -> Self {
        Self {
            pin: None,
            invert: false,
            settle_timeout_ms: HOMING_SETTLE_MS_DEFAULT,
        }
    }
}

impl HomingSensorConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.pin {
            Some(pin) if pin > BCM_PIN_MAX => Err(ConfigError::ValidationError(format!(
                "homing.pin {pin} is not a header GPIO (0..={BCM_PIN_MAX})"
            ))),
            _ => Ok(()),
        }
    }
}

/// Diagnostics bus sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Ring buffer capacity.
    pub max_entries: usize,
    /// Per-subscriber channel capacity.
    pub subscriber_capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            max_entries: DIAG_MAX_ENTRIES_DEFAULT,
            subscriber_capacity: DIAG_SUBSCRIBER_CAPACITY_DEFAULT,
        }
    }
}

impl DiagnosticsConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "diagnostics.max_entries must be >= 1".to_string(),
            ));
        }
        if self.subscriber_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "diagnostics.subscriber_capacity must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete table configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "living-room-table"
///
/// [serial]
/// port = "/dev/ttyACM0"
///
/// [motion]
/// batch_size = 5
///
/// [homing]
/// pin = 17
/// invert = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub shared: SharedConfig,
    pub serial: SerialConfig,
    pub motion: MotionConfig,
    pub scheduling: SchedulingConfig,
    pub pool: PoolConfig,
    pub homing: HomingSensorConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl TableConfig {
    /// Validate every section, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.serial.validate()?;
        self.motion.validate()?;
        self.scheduling.validate()?;
        self.pool.validate()?;
        self.homing.validate()?;
        self.diagnostics.validate()?;
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
