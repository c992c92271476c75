//! Homing sensor: a reed switch that marks the physical home position.
//!
//! Two variants share the [`HomingSensor`] trait:
//!
//! | Variant          | When selected                                  |
//! |------------------|------------------------------------------------|
//! | `GpioSensor`     | `gpio` feature, Linux, pin configured, GPIO ok |
//! | `DisabledSensor` | everything else                                |
//!
//! [`open_sensor`] probes once at construction. Callers hold a
//! `Box<dyn HomingSensor>` and never branch on availability; the disabled
//! variant reads `false` and returns from waits immediately.

use std::time::Duration;

use sand_common::config::HomingSensorConfig;
use tracing::{info, warn};

#[cfg(all(feature = "gpio", target_os = "linux"))]
pub mod gpio;

/// A raw pin sample and the configured polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomingReading {
    /// Level at the pin (`true` = high).
    pub raw_pin: bool,
    /// Reverse the mapping from level to triggered.
    pub invert: bool,
}

impl HomingReading {
    /// Derived triggered state.
    #[inline]
    pub const fn triggered(&self) -> bool {
        self.raw_pin != self.invert
    }
}

/// Interface to the home-position sensor.
///
/// # Lifecycle
///
/// 1. Constructed by [`open_sensor`]
/// 2. `read()` / `wait_for_trigger()` any number of times
/// 3. `shutdown()` releases the pin; further calls are no-ops
pub trait HomingSensor: Send {
    /// Variant identifier for logs.
    fn name(&self) -> &'static str;

    /// Instantaneous triggered state.
    fn read(&self) -> bool;

    /// Block until the sensor becomes triggered.
    ///
    /// Returns `false` on timeout or when no hardware is present.
    /// `None` waits without a deadline.
    fn wait_for_trigger(&mut self, timeout: Option<Duration>) -> bool;

    /// Release the underlying resource. Idempotent.
    fn shutdown(&mut self);
}

/// Stand-in used when no sensor hardware is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSensor;

impl HomingSensor for DisabledSensor {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn read(&self) -> bool {
        false
    }

    fn wait_for_trigger(&mut self, _timeout: Option<Duration>) -> bool {
        false
    }

    fn shutdown(&mut self) {}
}

/// Select the sensor variant for this host and configuration.
pub fn open_sensor(config: &HomingSensorConfig) -> Box<dyn HomingSensor> {
    let Some(pin) = config.pin else {
        info!("Homing sensor not configured; controller-only homing");
        return Box::new(DisabledSensor);
    };
    open_hardware(pin, config.invert)
}

#[cfg(all(feature = "gpio", target_os = "linux"))]
fn open_hardware(pin: u8, invert: bool) -> Box<dyn HomingSensor> {
    match gpio::GpioSensor::open(pin, invert) {
        Ok(sensor) => {
            info!("Homing sensor on GPIO{pin} (invert={invert})");
            Box::new(sensor)
        }
        Err(e) => {
            warn!("GPIO{pin} unavailable ({e}); homing sensor disabled");
            Box::new(DisabledSensor)
        }
    }
}

#[cfg(not(all(feature = "gpio", target_os = "linux")))]
fn open_hardware(pin: u8, _invert: bool) -> Box<dyn HomingSensor> {
    warn!("GPIO{pin} configured but this build has no GPIO support; homing sensor disabled");
    Box::new(DisabledSensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn reading_truth_table() {
        let cases = [
            (false, false, false),
            (true, false, true),
            (false, true, true),
            (true, true, false),
        ];
        for (raw_pin, invert, expected) in cases {
            assert_eq!(
                HomingReading { raw_pin, invert }.triggered(),
                expected,
                "raw_pin={raw_pin} invert={invert}"
            );
        }
    }

    #[test]
    fn disabled_sensor_never_blocks() {
        let mut sensor = DisabledSensor;
        assert!(!sensor.read());

        let start = Instant::now();
        assert!(!sensor.wait_for_trigger(Some(Duration::from_secs(30))));
        assert!(!sensor.wait_for_trigger(None));
        assert!(start.elapsed() < Duration::from_secs(1));

        sensor.shutdown();
        sensor.shutdown();
        assert!(!sensor.read());
    }

    #[test]
    fn unconfigured_pin_selects_disabled_variant() {
        let sensor = open_sensor(&HomingSensorConfig::default());
        assert_eq!(sensor.name(), "disabled");
    }
}
