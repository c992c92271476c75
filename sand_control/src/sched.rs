//! Scheduling policy: priority and CPU affinity for the two work classes.
//!
//! ## Targets
//! - `RealTime`: `SCHED_RR` at a caller-chosen priority, pinned to the
//!   reserved core 0.
//! - `Background`: raised niceness, pinned to cores `1..cpu_count`.
//!
//! On single-core hosts neither class is pinned.
//!
//! ## Applying
//! Elevation is best-effort: `SCHED_RR` first, then a negative niceness,
//! then unprivileged. Affinity is applied independently. Nothing here ever
//! fails the caller; the outcome is reported as an [`ApplyReport`].
//! On non-Linux hosts both steps are reported as not applied.

use std::collections::BTreeSet;

use sand_common::config::SchedulingConfig;
use sand_common::consts::{RESERVED_CORE, RT_PRIORITY_MAX, RT_PRIORITY_MIN};

// ─── Targets ────────────────────────────────────────────────────────

/// Work classes with distinct scheduling treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkClass {
    /// Motion streaming and other latency-critical threads.
    RealTime,
    /// CPU-heavy offline work (pattern conversion, previews).
    Background,
}

/// Requested priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Real-time round-robin priority in `1..=99`.
    RealTime(u8),
    /// Niceness adjustment for the normal scheduler.
    Nice(i32),
}

/// Priority and CPU set for one thread or process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingTarget {
    pub priority: Priority,
    /// `None` leaves affinity untouched.
    pub cpu_set: Option<BTreeSet<usize>>,
}

/// Pure policy computing targets from the host CPU count.
#[derive(Debug, Clone, Default)]
pub struct SchedulingPolicy {
    config: SchedulingConfig,
}

impl SchedulingPolicy {
    pub fn new(config: SchedulingConfig) -> Self {
        Self { config }
    }

    /// Target for a work class using the configured motion priority.
    pub fn target_for(&self, class: WorkClass, cpu_count: usize) -> SchedulingTarget {
        match class {
            WorkClass::RealTime => self.realtime_target(self.config.motion_priority, cpu_count),
            WorkClass::Background => SchedulingTarget {
                priority: Priority::Nice(self.config.background_nice),
                cpu_set: background_cores(cpu_count),
            },
        }
    }

    /// Real-time target with an explicit priority (clamped to `1..=99`).
    ///
    /// Auxiliary real-time consumers use this with a priority below the
    /// motion thread's.
    pub fn realtime_target(&self, priority: u8, cpu_count: usize) -> SchedulingTarget {
        SchedulingTarget {
            priority: Priority::RealTime(priority.clamp(RT_PRIORITY_MIN, RT_PRIORITY_MAX)),
            cpu_set: realtime_cores(cpu_count),
        }
    }

    /// Target for auxiliary real-time consumers.
    pub fn auxiliary_target(&self, cpu_count: usize) -> SchedulingTarget {
        self.realtime_target(self.config.auxiliary_priority, cpu_count)
    }

    /// Apply a target to a thread or process.
    pub fn apply(&self, target: &SchedulingTarget, task: TaskRef) -> ApplyReport {
        let priority = match target.priority {
            Priority::RealTime(p) => os::elevate_realtime(task, p, self.config.fallback_nice),
            Priority::Nice(n) => os::set_nice(task, n),
        };
        let pinned = match &target.cpu_set {
            Some(cpus) => os::pin(task, cpus),
            None => false,
        };
        ApplyReport { priority, pinned }
    }
}

/// Target for a work class with default priorities.
pub fn target_for(class: WorkClass, cpu_count: usize) -> SchedulingTarget {
    SchedulingPolicy::default().target_for(class, cpu_count)
}

fn realtime_cores(cpu_count: usize) -> Option<BTreeSet<usize>> {
    (cpu_count > 1).then(|| BTreeSet::from([RESERVED_CORE]))
}

fn background_cores(cpu_count: usize) -> Option<BTreeSet<usize>> {
    (cpu_count > 1).then(|| (RESERVED_CORE + 1..cpu_count).collect())
}

/// Number of CPUs available to this process (at least 1).
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

// ─── Apply Results ──────────────────────────────────────────────────

/// Thread or process a target is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRef {
    /// The calling thread.
    CurrentThread,
    /// A thread or process by OS id.
    Id(u32),
}

/// What priority change actually took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityOutcome {
    /// `SCHED_RR` at this priority.
    RealTime(u8),
    /// Niceness set to this value.
    Niceness(i32),
    /// Every attempt was denied; running with inherited priority.
    Unprivileged,
    /// Platform has no support.
    NotApplied,
}

/// Outcome of [`SchedulingPolicy::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    pub priority: PriorityOutcome,
    pub pinned: bool,
}

impl ApplyReport {
    /// Whether any priority change took effect.
    pub fn priority_applied(&self) -> bool {
        matches!(
            self.priority,
            PriorityOutcome::RealTime(_) | PriorityOutcome::Niceness(_)
        )
    }
}

/// Name of the calling thread's scheduler policy, if known.
pub fn current_policy() -> Option<&'static str> {
    os::current_policy()
}

// ─── Platform ───────────────────────────────────────────────────────

#[cfg(target_os = "linux")]
mod os {
    use super::{PriorityOutcome, TaskRef};
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;
    use std::collections::BTreeSet;
    use tracing::{debug, warn};

    fn raw_id(task: TaskRef) -> libc::pid_t {
        match task {
            TaskRef::CurrentThread => 0,
            TaskRef::Id(id) => id as libc::pid_t,
        }
    }

    pub(super) fn elevate_realtime(
        task: TaskRef,
        priority: u8,
        fallback_nice: i32,
    ) -> PriorityOutcome {
        let param = libc::sched_param {
            sched_priority: i32::from(priority),
        };
        // SAFETY: `param` is a valid sched_param for the duration of the call.
        let ret = unsafe { libc::sched_setscheduler(raw_id(task), libc::SCHED_RR, &param) };
        if ret == 0 {
            debug!("SCHED_RR priority {priority} applied to {task:?}");
            return PriorityOutcome::RealTime(priority);
        }
        let err = std::io::Error::last_os_error();
        warn!(
            "sched_setscheduler(SCHED_RR, {priority}) denied for {task:?}: {err}; \
             trying nice {fallback_nice}"
        );

        match set_nice(task, fallback_nice) {
            PriorityOutcome::Niceness(n) => PriorityOutcome::Niceness(n),
            _ => {
                warn!("Priority elevation unavailable for {task:?}; continuing unprivileged");
                PriorityOutcome::Unprivileged
            }
        }
    }

    pub(super) fn set_nice(task: TaskRef, nice: i32) -> PriorityOutcome {
        // SAFETY: setpriority has no memory-safety preconditions.
        let ret =
            unsafe { libc::setpriority(libc::PRIO_PROCESS, raw_id(task) as libc::id_t, nice) };
        if ret == 0 {
            debug!("nice {nice} applied to {task:?}");
            PriorityOutcome::Niceness(nice)
        } else {
            let err = std::io::Error::last_os_error();
            warn!("setpriority({nice}) failed for {task:?}: {err}");
            PriorityOutcome::Unprivileged
        }
    }

    pub(super) fn pin(task: TaskRef, cpus: &BTreeSet<usize>) -> bool {
        let mut cpuset = CpuSet::new();
        for &cpu in cpus {
            if let Err(e) = cpuset.set(cpu) {
                warn!("CpuSet::set({cpu}) failed: {e}; affinity left unchanged");
                return false;
            }
        }
        match sched_setaffinity(Pid::from_raw(raw_id(task)), &cpuset) {
            Ok(()) => {
                debug!("{task:?} pinned to cores {cpus:?}");
                true
            }
            Err(e) => {
                warn!("sched_setaffinity({cpus:?}) failed for {task:?}: {e}");
                false
            }
        }
    }

    pub(super) fn current_policy() -> Option<&'static str> {
        // SAFETY: sched_getscheduler(0) queries the calling thread.
        let policy = unsafe { libc::sched_getscheduler(0) };
        match policy {
            libc::SCHED_FIFO => Some("SCHED_FIFO"),
            libc::SCHED_RR => Some("SCHED_RR"),
            libc::SCHED_OTHER => Some("SCHED_OTHER"),
            libc::SCHED_BATCH => Some("SCHED_BATCH"),
            libc::SCHED_IDLE => Some("SCHED_IDLE"),
            _ => None,
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod os {
    use super::{PriorityOutcome, TaskRef};
    use std::collections::BTreeSet;

    pub(super) fn elevate_realtime(
        _task: TaskRef,
        _priority: u8,
        _fallback_nice: i32,
    ) -> PriorityOutcome {
        PriorityOutcome::NotApplied
    }

    pub(super) fn set_nice(_task: TaskRef, _nice: i32) -> PriorityOutcome {
        PriorityOutcome::NotApplied
    }

    pub(super) fn pin(_task: TaskRef, _cpus: &BTreeSet<usize>) -> bool {
        false
    }

    pub(super) fn current_policy() -> Option<&'static str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_core_hosts_are_never_pinned() {
        for cpus in [0, 1] {
            assert_eq!(target_for(WorkClass::RealTime, cpus).cpu_set, None);
            assert_eq!(target_for(WorkClass::Background, cpus).cpu_set, None);
        }
    }

    #[test]
    fn quad_core_split() {
        let rt = target_for(WorkClass::RealTime, 4);
        let bg = target_for(WorkClass::Background, 4);
        assert_eq!(rt.cpu_set, Some(BTreeSet::from([0])));
        assert_eq!(bg.cpu_set, Some(BTreeSet::from([1, 2, 3])));
        assert_eq!(rt.priority, Priority::RealTime(60));
        assert_eq!(bg.priority, Priority::Nice(10));
    }

    #[test]
    fn auxiliary_ranks_below_motion() {
        let policy = SchedulingPolicy::default();
        let motion = policy.target_for(WorkClass::RealTime, 2);
        let aux = policy.auxiliary_target(2);
        match (motion.priority, aux.priority) {
            (Priority::RealTime(m), Priority::RealTime(a)) => assert!(m > a),
            other => panic!("unexpected priorities {other:?}"),
        }
    }

    #[test]
    fn explicit_priority_is_clamped() {
        let policy = SchedulingPolicy::default();
        assert_eq!(policy.realtime_target(0, 2).priority, Priority::RealTime(1));
        assert_eq!(policy.realtime_target(200, 2).priority, Priority::RealTime(99));
    }

    #[test]
    fn background_apply_never_fails() {
        // Raising niceness is always permitted; pinning may be refused by a
        // restricted cpuset, and either way the call returns a report.
        let policy = SchedulingPolicy::default();
        let handle = std::thread::spawn(move || {
            policy.apply(&target_for(WorkClass::Background, cpu_count()), TaskRef::CurrentThread)
        });
        let report = handle.join().unwrap();
        if cfg!(target_os = "linux") {
            assert!(matches!(
                report.priority,
                PriorityOutcome::Niceness(10) | PriorityOutcome::Unprivileged
            ));
        } else {
            assert_eq!(report.priority, PriorityOutcome::NotApplied);
            assert!(!report.pinned);
        }
    }

    #[test]
    fn realtime_apply_degrades_without_privileges() {
        let policy = SchedulingPolicy::default();
        let handle = std::thread::spawn(move || {
            policy.apply(&target_for(WorkClass::RealTime, 1), TaskRef::CurrentThread)
        });
        let report = handle.join().unwrap();
        assert!(!report.pinned);
        assert!(matches!(
            report.priority,
            PriorityOutcome::RealTime(60)
                | PriorityOutcome::Niceness(_)
                | PriorityOutcome::Unprivileged
                | PriorityOutcome::NotApplied
        ));
    }
}
