//! Raspberry Pi reed switch via `rppal`.
//!
//! The pin is configured as an input with the internal pull-up. Blocking
//! waits arm the rising edge whatever `invert` says; `invert` only changes
//! how `read` maps the level to triggered.

use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, Trigger};
use tracing::{debug, warn};

use super::{HomingReading, HomingSensor};

/// Edge armed by `wait_for_trigger`.
const HOME_EDGE: Trigger = Trigger::RisingEdge;

/// Hardware-backed homing sensor.
pub struct GpioSensor {
    pin: Option<InputPin>,
    bcm: u8,
    invert: bool,
}

impl GpioSensor {
    /// Claim `bcm` as a pulled-up input.
    pub fn open(bcm: u8, invert: bool) -> Result<Self, rppal::gpio::Error> {
        let pin = Gpio::new()?.get(bcm)?.into_input_pullup();
        Ok(Self {
            pin: Some(pin),
            bcm,
            invert,
        })
    }
}

impl HomingSensor for GpioSensor {
    fn name(&self) -> &'static str {
        "gpio"
    }

    fn read(&self) -> bool {
        self.pin.as_ref().is_some_and(|pin| {
            HomingReading {
                raw_pin: pin.is_high(),
                invert: self.invert,
            }
            .triggered()
        })
    }

    fn wait_for_trigger(&mut self, timeout: Option<Duration>) -> bool {
        let bcm = self.bcm;
        let Some(pin) = self.pin.as_mut() else {
            return false;
        };
        if let Err(e) = pin.set_interrupt(HOME_EDGE) {
            warn!("GPIO{bcm}: cannot arm edge interrupt: {e}");
            return false;
        }
        let fired = match pin.poll_interrupt(true, timeout) {
            Ok(Some(level)) => {
                debug!("GPIO{bcm}: edge detected (level {level:?})");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("GPIO{bcm}: interrupt poll failed: {e}");
                false
            }
        };
        if let Err(e) = pin.clear_interrupt() {
            debug!("GPIO{bcm}: clear_interrupt failed: {e}");
        }
        fired
    }

    fn shutdown(&mut self) {
        if let Some(mut pin) = self.pin.take() {
            let _ = pin.clear_interrupt();
            debug!("GPIO{} released", self.bcm);
        }
    }
}

impl Drop for GpioSensor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
