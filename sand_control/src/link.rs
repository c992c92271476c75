//! Motion link: batch-and-acknowledge streaming to the controller.
//!
//! ## States
//!
//! ```text
//! Disconnected ──open──► Connected ──stream──► AwaitingAck ⇄ StreamingBatch
//!      ▲                    │  ▲                       │
//!      │                    │  └──── reset ack ◄───────┘ (end or stop)
//!      │                    └──home──► Homing ──► Connected
//!      └──────── any wire failure ─────────────────────
//! ```
//!
//! ## Protocol
//! 1. Before every batch, read lines until `READY`. Anything else is logged
//!    and discarded.
//! 2. Send `t,r;t,r;...;\n` with three fractional digits.
//! 3. After the last batch, or after a stop, send `RESET_THETA` and wait for
//!    `THETA_RESET`.
//!
//! Stop and pause requests take effect only at batch boundaries; a batch in
//! flight is always delivered in full.
//!
//! ## Failures
//! Any read/write failure drops the transport and leaves the link
//! `Disconnected`. [`StreamFailure::resume_at`] names the first coordinate of
//! the batch that was in flight; the caller re-opens and streams from there.

use std::fmt;
use std::io::{self, ErrorKind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use sand_common::config::{SerialConfig, TableConfig};
use sand_common::consts::{
    BATCH_SIZE_DEFAULT, CMD_HOME, CMD_RESET_THETA, HOMING_SETTLE_MS_DEFAULT, TOKEN_DONE,
    TOKEN_READY, TOKEN_THETA_RESET, WIRE_DECIMALS,
};
use sand_common::pattern::Coordinate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::homing::{DisabledSensor, HomingSensor};

pub mod transport;

pub use transport::{SerialTransport, StreamTransport, Transport, list_ports, open_serial};

// ─── State & Errors ─────────────────────────────────────────────────

/// Link state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    StreamingBatch,
    AwaitingAck,
    Homing,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::StreamingBatch => "streaming",
            Self::AwaitingAck => "awaiting acknowledgment",
            Self::Homing => "homing in progress",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the motion link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No transport attached.
    #[error("connection not established")]
    NotConnected,

    /// Opening the serial port failed.
    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    /// The controller closed the connection.
    #[error("connection lost while waiting for {expected}")]
    ConnectionLost { expected: &'static str },

    /// The protocol deadline expired.
    #[error("no {expected} within {waited:?}")]
    AckTimeout {
        expected: &'static str,
        waited: Duration,
    },

    /// Unusable inbound data.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operation not allowed in the current state.
    #[error("link busy: {0}")]
    InvalidState(LinkState),

    /// Transport I/O failure.
    #[error("link I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A stream that stopped on a link error.
#[derive(Debug, Error)]
#[error("{error} (resume at coordinate {resume_at})")]
pub struct StreamFailure {
    #[source]
    pub error: LinkError,
    /// First coordinate of the batch that was in flight.
    pub resume_at: usize,
}

/// Summary of a completed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamReport {
    pub batches: usize,
    pub coordinates: usize,
    /// Ended early on a stop request.
    pub stopped: bool,
}

/// Outcome of the homing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomingOutcome {
    /// The sensor reported the home position.
    pub sensor_confirmed: bool,
}

// ─── Run Control ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RunFlags {
    stop: bool,
    pause: bool,
}

#[derive(Debug, Default)]
struct ControlInner {
    flags: Mutex<RunFlags>,
    changed: Condvar,
}

/// Cooperative stop/pause handle, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    inner: Arc<ControlInner>,
}

impl RunControl {
    /// Stop at the next batch boundary.
    pub fn request_stop(&self) {
        self.inner.flags.lock().stop = true;
        self.inner.changed.notify_all();
    }

    /// Hold at the next batch boundary until resumed.
    pub fn pause(&self) {
        self.inner.flags.lock().pause = true;
    }

    pub fn resume(&self) {
        self.inner.flags.lock().pause = false;
        self.inner.changed.notify_all();
    }

    pub fn stop_requested(&self) -> bool {
        self.inner.flags.lock().stop
    }

    pub fn is_paused(&self) -> bool {
        self.inner.flags.lock().pause
    }

    /// Clear a pending stop or pause before starting a new run.
    pub fn clear(&self) {
        let mut flags = self.inner.flags.lock();
        flags.stop = false;
        flags.pause = false;
    }

    /// Batch-boundary checkpoint; blocks while paused. Returns `true` to stop.
    fn checkpoint(&self) -> bool {
        let mut flags = self.inner.flags.lock();
        if flags.pause && !flags.stop {
            info!("Paused at batch boundary");
            while flags.pause && !flags.stop {
                self.inner.changed.wait(&mut flags);
            }
            info!("Resumed");
        }
        flags.stop
    }
}

// ─── Wire Encoding ──────────────────────────────────────────────────

/// Encode a batch as `t,r;t,r;...;` (no newline).
pub fn encode_batch(batch: &[Coordinate]) -> String {
    let mut out = String::with_capacity(batch.len() * 14);
    for c in batch {
        out.push_str(&format!(
            "{:.prec$},{:.prec$};",
            c.theta,
            c.rho,
            prec = WIRE_DECIMALS
        ));
    }
    out
}

// ─── Link ───────────────────────────────────────────────────────────

/// Tunables for a [`MotionLink`].
#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub batch_size: usize,
    /// `None` waits indefinitely.
    pub ack_timeout: Option<Duration>,
    /// Sensor wait after the controller reports home.
    pub settle_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE_DEFAULT,
            ack_timeout: None,
            settle_timeout: Duration::from_millis(HOMING_SETTLE_MS_DEFAULT),
        }
    }
}

impl LinkSettings {
    pub fn from_config(config: &TableConfig) -> Self {
        Self {
            batch_size: config.motion.batch_size.max(1),
            ack_timeout: (config.serial.ack_timeout_ms > 0)
                .then(|| Duration::from_millis(config.serial.ack_timeout_ms)),
            settle_timeout: Duration::from_millis(config.homing.settle_timeout_ms),
        }
    }
}

/// Sole owner of the controller connection.
pub struct MotionLink {
    transport: Option<Box<dyn Transport>>,
    state: LinkState,
    settings: LinkSettings,
    control: RunControl,
    sensor: Box<dyn HomingSensor>,
}

impl MotionLink {
    pub fn new(settings: LinkSettings, sensor: Box<dyn HomingSensor>) -> Self {
        Self {
            transport: None,
            state: LinkState::Disconnected,
            settings: LinkSettings {
                batch_size: settings.batch_size.max(1),
                ..settings
            },
            control: RunControl::default(),
            sensor,
        }
    }

    /// Link without a homing sensor.
    pub fn without_sensor(settings: LinkSettings) -> Self {
        Self::new(settings, Box::new(DisabledSensor))
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Handle for stop/pause requests from other threads.
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Adopt an open transport. Replaces any previous connection.
    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        if self.transport.is_some() {
            debug!("Replacing existing controller connection");
        }
        self.transport = Some(transport);
        self.state = LinkState::Connected;
        info!("Motion link connected");
    }

    /// Open the configured serial port and attach it.
    pub fn open_serial(&mut self, config: &SerialConfig) -> Result<(), LinkError> {
        let transport = open_serial(config).map_err(|e| LinkError::Open {
            port: config.port.clone(),
            reason: e.to_string(),
        })?;
        self.attach(Box::new(transport));
        Ok(())
    }

    /// Drop the connection.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            info!("Motion link disconnected");
        }
        self.state = LinkState::Disconnected;
    }

    /// Disconnect and release the homing sensor.
    pub fn shutdown(&mut self) {
        self.disconnect();
        self.sensor.shutdown();
    }

    fn require_connected(&self) -> Result<(), LinkError> {
        match self.state {
            LinkState::Connected => Ok(()),
            LinkState::Disconnected => Err(LinkError::NotConnected),
            other => Err(LinkError::InvalidState(other)),
        }
    }

    /// Record a wire failure: log it and drop to `Disconnected`.
    fn fail(&mut self, error: LinkError) -> LinkError {
        warn!("Motion link failure in state {}: {error}", self.state);
        self.transport = None;
        self.state = LinkState::Disconnected;
        error
    }

    fn write(&mut self, line: &str) -> Result<(), LinkError> {
        let result = match self.transport.as_mut() {
            Some(t) => t.write_line(line),
            None => return Err(LinkError::NotConnected),
        };
        result.map_err(|e| self.fail(LinkError::Io(e)))
    }

    /// Read lines until `expected` arrives or the deadline passes.
    fn wait_for(&mut self, expected: &'static str) -> Result<(), LinkError> {
        let started = Instant::now();
        loop {
            let waited = started.elapsed();
            if self.settings.ack_timeout.is_some_and(|limit| waited >= limit) {
                return Err(self.fail(LinkError::AckTimeout { expected, waited }));
            }
            let read = match self.transport.as_mut() {
                Some(t) => t.read_line(),
                None => return Err(LinkError::NotConnected),
            };
            match read {
                Ok(Some(line)) => {
                    let token = line.trim();
                    if token == expected {
                        return Ok(());
                    }
                    if !token.is_empty() {
                        debug!("Controller: {token} (waiting for {expected})");
                    }
                }
                Ok(None) => return Err(self.fail(LinkError::ConnectionLost { expected })),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    return Err(self.fail(LinkError::Protocol(e.to_string())));
                }
                Err(e) => return Err(self.fail(LinkError::Io(e))),
            }
        }
    }

    fn exchange(&mut self, command: &str, ack: &'static str) -> Result<(), LinkError> {
        debug!("Sending {command}, awaiting {ack}");
        self.write(command)?;
        self.wait_for(ack)
    }

    /// Send a single command and wait for its acknowledgment.
    pub fn send_command(&mut self, command: &str, ack: &'static str) -> Result<(), LinkError> {
        self.require_connected()?;
        self.exchange(command, ack)
    }

    /// Re-synchronise theta on the controller.
    pub fn reset_theta(&mut self) -> Result<(), LinkError> {
        self.send_command(CMD_RESET_THETA, TOKEN_THETA_RESET)
    }

    /// Stream a coordinate sequence in batches.
    pub fn stream(&mut self, coordinates: &[Coordinate]) -> Result<StreamReport, StreamFailure> {
        self.require_connected()
            .map_err(|error| StreamFailure { error, resume_at: 0 })?;

        let batch_size = self.settings.batch_size;
        let mut report = StreamReport {
            batches: 0,
            coordinates: 0,
            stopped: false,
        };

        // A stop raised during homing or an earlier reset still holds.
        let pending = if self.control.stop_requested() {
            info!("Stop already requested; skipping {} coordinates", coordinates.len());
            report.stopped = true;
            &coordinates[..0]
        } else {
            info!(
                "Streaming {} coordinates in batches of {batch_size}",
                coordinates.len()
            );
            coordinates
        };

        for (index, batch) in pending.chunks(batch_size).enumerate() {
            let resume_at = index * batch_size;
            self.state = LinkState::AwaitingAck;
            self.wait_for(TOKEN_READY)
                .map_err(|error| StreamFailure { error, resume_at })?;

            self.state = LinkState::StreamingBatch;
            let line = encode_batch(batch);
            self.write(&line)
                .map_err(|error| StreamFailure { error, resume_at })?;
            debug!("Batch {index} sent: {line}");

            report.batches += 1;
            report.coordinates += batch.len();

            if self.control.checkpoint() {
                info!(
                    "Stop requested; halting after {} of {} coordinates",
                    report.coordinates,
                    coordinates.len()
                );
                report.stopped = true;
                break;
            }
        }

        self.state = LinkState::Connected;
        self.reset_theta().map_err(|error| StreamFailure {
            error,
            resume_at: report.coordinates,
        })?;
        info!(
            "Stream finished: {} batches, {} coordinates{}",
            report.batches,
            report.coordinates,
            if report.stopped { " (stopped)" } else { "" }
        );
        Ok(report)
    }

    /// Home the table and re-synchronise theta.
    pub fn home(&mut self) -> Result<HomingOutcome, LinkError> {
        self.require_connected()?;
        self.state = LinkState::Homing;
        info!("Homing started (sensor: {})", self.sensor.name());

        self.exchange(CMD_HOME, TOKEN_DONE)?;

        let sensor_confirmed =
            self.sensor.read() || self.sensor.wait_for_trigger(Some(self.settings.settle_timeout));
        if sensor_confirmed {
            info!("Homing sensor confirmed home position");
        } else {
            debug!("Homing sensor did not confirm home position");
        }

        self.exchange(CMD_RESET_THETA, TOKEN_THETA_RESET)?;
        self.state = LinkState::Connected;
        info!("Homing complete");
        Ok(HomingOutcome { sensor_confirmed })
    }
}

impl Drop for MotionLink {
    fn drop(&mut self) {
        self.sensor.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Controller stand-in: replies are queued per written line.
    #[derive(Clone, Default)]
    struct Script {
        inner: Arc<Mutex<ScriptState>>,
    }

    #[derive(Default)]
    struct ScriptState {
        inbound: VecDeque<io::Result<Option<String>>>,
        written: Vec<String>,
        fail_writes: bool,
        stop_on_write: Option<RunControl>,
        stop_on_line: Option<(&'static str, RunControl)>,
    }

    impl Script {
        fn push(&self, line: &str) {
            self.inner.lock().inbound.push_back(Ok(Some(line.to_string())));
        }

        fn close(&self) {
            self.inner.lock().inbound.push_back(Ok(None));
        }

        fn written(&self) -> Vec<String> {
            self.inner.lock().written.clone()
        }
    }

    impl Transport for Script {
        fn write_line(&mut self, line: &str) -> io::Result<()> {
            let mut state = self.inner.lock();
            if state.fail_writes {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"));
            }
            state.written.push(line.to_string());
            if let Some(control) = &state.stop_on_write {
                control.request_stop();
            }
            if let Some((target, control)) = &state.stop_on_line {
                if line == *target {
                    control.request_stop();
                }
            }
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<Option<String>> {
            self.inner
                .lock()
                .inbound
                .pop_front()
                .unwrap_or_else(|| Err(io::Error::new(ErrorKind::TimedOut, "idle")))
        }
    }

    fn connected(script: &Script, batch_size: usize) -> MotionLink {
        let mut link = MotionLink::without_sensor(LinkSettings {
            batch_size,
            ack_timeout: Some(Duration::from_millis(200)),
            ..LinkSettings::default()
        });
        link.attach(Box::new(script.clone()));
        link
    }

    fn coords(n: usize) -> Vec<Coordinate> {
        (0..n).map(|i| Coordinate::new(i as f64, 0.5)).collect()
    }

    struct FixedSensor(bool);

    impl HomingSensor for FixedSensor {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn read(&self) -> bool {
            self.0
        }
        fn wait_for_trigger(&mut self, _timeout: Option<Duration>) -> bool {
            self.0
        }
        fn shutdown(&mut self) {}
    }

    #[test]
    fn streams_in_batches_then_resets_theta() {
        let script = Script::default();
        script.push("READY");
        script.push("READY");
        script.push("THETA_RESET");
        let mut link = connected(&script, 2);

        let pattern = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.5708, 0.5),
            Coordinate::new(3.14159, 1.0),
        ];
        let report = link.stream(&pattern).unwrap();
        assert_eq!(
            report,
            StreamReport {
                batches: 2,
                coordinates: 3,
                stopped: false
            }
        );
        assert_eq!(
            script.written(),
            vec!["0.000,0.000;1.571,0.500;", "3.142,1.000;", "RESET_THETA"]
        );
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[test]
    fn unrelated_lines_are_skipped() {
        let script = Script::default();
        script.push("booting v2");
        script.push("");
        script.push("READY");
        script.push("R: 12 steps");
        script.push("THETA_RESET");
        let mut link = connected(&script, 5);
        let report = link.stream(&coords(3)).unwrap();
        assert_eq!(report.batches, 1);
    }

    #[test]
    fn stop_takes_effect_at_batch_boundary() {
        let script = Script::default();
        script.push("READY");
        script.push("THETA_RESET");
        let mut link = connected(&script, 2);
        script.inner.lock().stop_on_write = Some(link.control());

        let report = link.stream(&coords(6)).unwrap();
        assert_eq!(
            report,
            StreamReport {
                batches: 1,
                coordinates: 2,
                stopped: true
            }
        );
        assert_eq!(
            script.written(),
            vec!["0.000,0.500;1.000,0.500;", "RESET_THETA"]
        );
    }

    #[test]
    fn pending_stop_sends_only_the_reset() {
        let script = Script::default();
        script.push("THETA_RESET");
        let mut link = connected(&script, 5);
        link.control().request_stop();

        let report = link.stream(&coords(4)).unwrap();
        assert_eq!(
            report,
            StreamReport {
                batches: 0,
                coordinates: 0,
                stopped: true
            }
        );
        assert_eq!(script.written(), vec!["RESET_THETA"]);
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[test]
    fn stop_during_homing_skips_the_pattern() {
        let script = Script::default();
        script.push("DONE");
        script.push("THETA_RESET");
        script.push("THETA_RESET");
        let mut link = connected(&script, 2);
        script.inner.lock().stop_on_line = Some(("HOME", link.control()));

        link.home().unwrap();
        let report = link.stream(&coords(4)).unwrap();
        assert!(report.stopped);
        assert_eq!(report.batches, 0);
        assert_eq!(
            script.written(),
            vec!["HOME", "RESET_THETA", "RESET_THETA"]
        );
    }

    #[test]
    fn stop_during_final_reset_carries_to_next_pattern() {
        let script = Script::default();
        script.push("READY");
        script.push("THETA_RESET");
        script.push("THETA_RESET");
        let mut link = connected(&script, 5);
        script.inner.lock().stop_on_line = Some(("RESET_THETA", link.control()));

        let first = link.stream(&coords(2)).unwrap();
        assert!(!first.stopped);
        assert_eq!(first.batches, 1);

        let second = link.stream(&coords(3)).unwrap();
        assert!(second.stopped);
        assert_eq!(second.batches, 0);
        assert_eq!(
            script.written(),
            vec!["0.000,0.500;1.000,0.500;", "RESET_THETA", "RESET_THETA"]
        );
    }

    #[test]
    fn clear_allows_streaming_again() {
        let script = Script::default();
        script.push("READY");
        script.push("THETA_RESET");
        let mut link = connected(&script, 5);
        let control = link.control();
        control.request_stop();
        control.pause();
        control.clear();

        assert!(!control.stop_requested());
        assert!(!control.is_paused());
        let report = link.stream(&coords(2)).unwrap();
        assert!(!report.stopped);
        assert_eq!(report.coordinates, 2);
    }

    #[test]
    fn empty_program_still_resets_theta() {
        let script = Script::default();
        script.push("THETA_RESET");
        let mut link = connected(&script, 5);
        let report = link.stream(&[]).unwrap();
        assert_eq!(report.batches, 0);
        assert_eq!(script.written(), vec!["RESET_THETA"]);
    }

    #[test]
    fn connection_loss_reports_resume_point() {
        let script = Script::default();
        script.push("READY");
        script.close();
        let mut link = connected(&script, 2);

        let failure = link.stream(&coords(5)).unwrap_err();
        assert!(matches!(
            failure.error,
            LinkError::ConnectionLost { expected: "READY" }
        ));
        assert_eq!(failure.resume_at, 2);
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(matches!(link.reset_theta(), Err(LinkError::NotConnected)));
    }

    #[test]
    fn write_failure_disconnects() {
        let script = Script::default();
        script.push("READY");
        script.inner.lock().fail_writes = true;
        let mut link = connected(&script, 2);

        let failure = link.stream(&coords(3)).unwrap_err();
        assert!(matches!(failure.error, LinkError::Io(_)));
        assert_eq!(failure.resume_at, 0);
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[test]
    fn silent_controller_times_out() {
        let script = Script::default();
        let mut link = connected(&script, 2);
        let failure = link.stream(&coords(1)).unwrap_err();
        assert!(matches!(
            failure.error,
            LinkError::AckTimeout { expected: "READY", .. }
        ));
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[test]
    fn homing_sequence_with_sensor() {
        let script = Script::default();
        script.push("DONE");
        script.push("THETA_RESET");
        let mut link = MotionLink::new(LinkSettings::default(), Box::new(FixedSensor(true)));
        link.attach(Box::new(script.clone()));

        let outcome = link.home().unwrap();
        assert!(outcome.sensor_confirmed);
        assert_eq!(script.written(), vec!["HOME", "RESET_THETA"]);
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[test]
    fn homing_without_sensor_is_unconfirmed() {
        let script = Script::default();
        script.push("DONE");
        script.push("THETA_RESET");
        let mut link = connected(&script, 5);
        assert!(!link.home().unwrap().sensor_confirmed);
    }

    #[test]
    fn pause_holds_until_resume() {
        let script = Script::default();
        for line in ["READY", "READY", "THETA_RESET"] {
            script.push(line);
        }
        let mut link = connected(&script, 1);
        let control = link.control();

        let worker = std::thread::spawn(move || {
            let report = link.stream(&coords(2));
            (link, report)
        });
        // Pause races with the first checkpoint; either way the stream must finish.
        control.pause();
        std::thread::sleep(Duration::from_millis(30));
        control.resume();
        let (_link, report) = worker.join().unwrap();
        assert_eq!(report.unwrap().batches, 2);
    }

    #[test]
    fn encodes_three_decimals() {
        let batch = [Coordinate::new(0.12345, 1.0), Coordinate::new(-2.0, 0.0006)];
        assert_eq!(encode_batch(&batch), "0.123,1.000;-2.000,0.001;");
        assert_eq!(encode_batch(&[]), "");
    }

    #[test]
    fn operations_require_connection() {
        let mut link = MotionLink::without_sensor(LinkSettings::default());
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(matches!(link.home(), Err(LinkError::NotConnected)));
        assert!(matches!(link.reset_theta(), Err(LinkError::NotConnected)));
        let failure = link.stream(&[Coordinate::new(0.0, 0.0)]).unwrap_err();
        assert!(matches!(failure.error, LinkError::NotConnected));
        assert_eq!(failure.resume_at, 0);
    }

    #[test]
    fn status_messages_are_explicit() {
        assert_eq!(LinkError::NotConnected.to_string(), "connection not established");
        assert_eq!(
            LinkError::InvalidState(LinkState::Homing).to_string(),
            "link busy: homing in progress"
        );
    }

    #[test]
    fn stop_wins_over_pause_at_checkpoint() {
        let control = RunControl::default();
        control.pause();
        control.request_stop();
        assert!(control.checkpoint());
    }

    #[test]
    fn settings_from_config() {
        let mut config = TableConfig::default();
        config.serial.ack_timeout_ms = 0;
        config.motion.batch_size = 7;
        let settings = LinkSettings::from_config(&config);
        assert_eq!(settings.batch_size, 7);
        assert!(settings.ack_timeout.is_none());
    }
}
