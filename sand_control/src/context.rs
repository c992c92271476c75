//! Process-wide registry built once at startup.
//!
//! Holds the shared diagnostics bus, the worker pool slot, the loaded
//! configuration and the host CPU count. Components receive it by
//! reference instead of reaching for globals.

use std::sync::Arc;

use sand_common::config::TableConfig;
use tracing::info;

use crate::diagnostics::DiagnosticsBus;
use crate::homing::{HomingSensor, open_sensor};
use crate::link::{LinkSettings, MotionLink};
use crate::pool::{PoolError, PoolRegistry, WorkerCommand, WorkerPool};
use crate::sched::{ApplyReport, SchedulingPolicy, TaskRef, WorkClass};

pub struct ControlContext {
    config: TableConfig,
    cpu_count: usize,
    diagnostics: Arc<DiagnosticsBus>,
    pool: PoolRegistry,
    policy: SchedulingPolicy,
}

impl ControlContext {
    pub fn new(
        config: TableConfig,
        diagnostics: Arc<DiagnosticsBus>,
        worker: WorkerCommand,
        cpu_count: usize,
    ) -> Self {
        let cpu_count = cpu_count.max(1);
        info!("Control context: {cpu_count} CPUs, service '{}'", config.shared.service_name);
        Self {
            policy: SchedulingPolicy::new(config.scheduling.clone()),
            pool: PoolRegistry::new(worker, cpu_count),
            config,
            cpu_count,
            diagnostics,
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_count
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticsBus> {
        &self.diagnostics
    }

    pub fn pool(&self) -> &PoolRegistry {
        &self.pool
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Start the worker pool with the configured ceiling.
    pub fn start_pool(&self) -> Result<Arc<WorkerPool>, PoolError> {
        self.pool.init(self.config.pool.max_workers)
    }

    /// Pin and elevate the calling thread for motion streaming.
    pub fn elevate_current_thread(&self) -> ApplyReport {
        let target = self.policy.target_for(WorkClass::RealTime, self.cpu_count);
        let report = self.policy.apply(&target, TaskRef::CurrentThread);
        info!(
            "Motion thread: priority {:?}, pinned={}",
            report.priority, report.pinned
        );
        report
    }

    /// Homing sensor for this host and configuration.
    pub fn open_sensor(&self) -> Box<dyn HomingSensor> {
        open_sensor(&self.config.homing)
    }

    /// Disconnected motion link with the configured settings and sensor.
    pub fn motion_link(&self) -> MotionLink {
        MotionLink::new(LinkSettings::from_config(&self.config), self.open_sensor())
    }

    /// Stop the pool if running. Idempotent.
    pub fn shutdown(&self) {
        if self.pool.is_initialized() {
            let _ = self.pool.shutdown(true, true);
        }
    }
}

impl Drop for ControlContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
