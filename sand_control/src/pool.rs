//! Worker pool: a fixed set of isolated worker processes for CPU-bound
//! offline tasks.
//!
//! ## Lifecycle
//!
//! ```text
//! PoolRegistry::init ──► WorkerPool (size workers) ──► shutdown ──► init ...
//! ```
//!
//! `init` is idempotent while a pool exists; `get` and `shutdown` on an
//! empty registry report [`PoolError::NotInitialized`].
//!
//! ## Dispatch
//! Each worker slot has one dispatcher thread that owns the child's pipes.
//! Jobs wait in a shared queue; a dispatcher takes one job at a time, sends
//! it, and blocks for the answer. A worker that dies fails its in-flight
//! task with [`PoolError::WorkerCrashed`] and is respawned for the next one.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, unbounded};
use parking_lot::Mutex;
use sand_common::consts::POOL_MAX_WORKERS;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub mod task;
pub mod worker;

pub use task::{Task, TaskError, TaskOutput, WorkerRequest, WorkerResponse};

// ─── Errors ─────────────────────────────────────────────────────────

/// Worker pool errors.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No pool exists; call `init` first.
    #[error("worker pool not initialized")]
    NotInitialized,

    #[error("failed to spawn worker {slot}: {reason}")]
    Spawn { slot: usize, reason: String },

    /// The worker process died while running the task.
    #[error("worker {slot} crashed")]
    WorkerCrashed { slot: usize },

    #[error("task cancelled")]
    Cancelled,

    #[error("task failed: {0}")]
    Task(#[from] TaskError),

    #[error("worker protocol error: {0}")]
    Protocol(String),

    #[error("worker pool is shutting down")]
    ShuttingDown,
}

// ─── Sizing ─────────────────────────────────────────────────────────

/// Worker count: one core stays reserved, at most three workers, at least one.
///
/// `max_workers` lowers the ceiling further.
pub fn pool_size(cpu_count: usize, max_workers: Option<usize>) -> usize {
    let size = cpu_count.saturating_sub(1).clamp(1, POOL_MAX_WORKERS);
    match max_workers {
        Some(max) => size.min(max.max(1)),
        None => size,
    }
}

// ─── Worker Process ─────────────────────────────────────────────────

/// How to start a worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// This executable with the `worker` subcommand.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: vec!["worker".to_string()],
        })
    }
}

struct WorkerPipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// One worker slot, driven by its dispatcher thread.
struct WorkerSlot {
    index: usize,
    command: Arc<WorkerCommand>,
    child: Arc<Mutex<Option<Child>>>,
    pipes: Option<WorkerPipes>,
}

impl WorkerSlot {
    fn spawn(&mut self) -> Result<(), PoolError> {
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| PoolError::Spawn {
                slot: self.index,
                reason: e.to_string(),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PoolError::Spawn {
                slot: self.index,
                reason: "worker pipes unavailable".to_string(),
            });
        };
        debug!("Worker {} started (pid {})", self.index, child.id());
        self.pipes = Some(WorkerPipes {
            stdin,
            stdout: BufReader::new(stdout),
        });
        *self.child.lock() = Some(child);
        Ok(())
    }

    /// Kill (if needed) and reap the current process.
    fn reap(&mut self) {
        self.pipes = None;
        let child = self.child.lock().take();
        if let Some(mut child) = child {
            let _ = child.kill();
            match child.wait() {
                Ok(status) => debug!("Worker {} reaped ({status})", self.index),
                Err(e) => warn!("Worker {} could not be reaped: {e}", self.index),
            }
        }
    }

    /// Close stdin and let the worker exit on its own.
    fn retire(&mut self) {
        self.pipes = None;
        let child = self.child.lock().take();
        if let Some(mut child) = child {
            match child.wait() {
                Ok(status) => debug!("Worker {} exited ({status})", self.index),
                Err(e) => warn!("Worker {} could not be reaped: {e}", self.index),
            }
        }
    }

    fn crashed(&mut self) -> PoolError {
        warn!("Worker {} crashed; it will be respawned", self.index);
        self.reap();
        PoolError::WorkerCrashed { slot: self.index }
    }

    fn run(&mut self, request: &WorkerRequest) -> Result<TaskOutput, PoolError> {
        if self.pipes.is_none() {
            self.spawn()?;
        }
        let encoded =
            serde_json::to_string(request).map_err(|e| PoolError::Protocol(e.to_string()))?;
        let Some(pipes) = self.pipes.as_mut() else {
            return Err(PoolError::WorkerCrashed { slot: self.index });
        };

        if writeln!(pipes.stdin, "{encoded}")
            .and_then(|()| pipes.stdin.flush())
            .is_err()
        {
            return Err(self.crashed());
        }

        let mut line = String::new();
        match pipes.stdout.read_line(&mut line) {
            Ok(0) | Err(_) => return Err(self.crashed()),
            Ok(_) => {}
        }

        let response: WorkerResponse = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                // The stream is out of sync; start over with a fresh process.
                self.reap();
                return Err(PoolError::Protocol(e.to_string()));
            }
        };
        if response.id != request.id {
            self.reap();
            return Err(PoolError::Protocol(format!(
                "expected response {}, got {}",
                request.id, response.id
            )));
        }
        response.result.map_err(PoolError::from)
    }
}

// ─── Pool ───────────────────────────────────────────────────────────

type Reply = Result<TaskOutput, PoolError>;

struct Job {
    request: WorkerRequest,
    reply: Sender<Reply>,
}

fn dispatch_loop(mut slot: WorkerSlot, jobs: Receiver<Job>, abort: Arc<AtomicBool>) {
    while let Ok(job) = jobs.recv() {
        let result = if abort.load(Ordering::Acquire) {
            Err(PoolError::Cancelled)
        } else {
            slot.run(&job.request)
        };
        if job.reply.send(result).is_err() {
            debug!("Task {} finished after its handle was dropped", job.request.id);
        }
    }
    slot.retire();
    debug!("Dispatcher {} stopped", slot.index);
}

/// Pending result of a submitted task.
pub struct TaskHandle {
    id: u64,
    reply: Receiver<Reply>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the task completes.
    pub fn wait(self) -> Reply {
        self.reply.recv().unwrap_or(Err(PoolError::Cancelled))
    }

    /// Block up to `timeout`. `None` if still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Reply> {
        match self.reply.recv_timeout(timeout) {
            Ok(r) => Some(r),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(PoolError::Cancelled)),
        }
    }

    /// Non-blocking poll.
    pub fn try_get(&self) -> Option<Reply> {
        match self.reply.try_recv() {
            Ok(r) => Some(r),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PoolError::Cancelled)),
        }
    }
}

/// Running pool of worker processes.
pub struct WorkerPool {
    size: usize,
    jobs: Mutex<Option<Sender<Job>>>,
    backlog: Receiver<Job>,
    dispatchers: Mutex<Vec<JoinHandle<()>>>,
    children: Vec<Arc<Mutex<Option<Child>>>>,
    abort: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl WorkerPool {
    /// Spawn `size` workers. Fails if any worker cannot be started.
    pub fn start(size: usize, command: WorkerCommand) -> Result<Self, PoolError> {
        let size = size.max(1);
        let command = Arc::new(command);
        let (tx, rx) = unbounded::<Job>();
        let abort = Arc::new(AtomicBool::new(false));

        let mut slots: Vec<WorkerSlot> = Vec::with_capacity(size);
        for index in 0..size {
            let mut slot = WorkerSlot {
                index,
                command: Arc::clone(&command),
                child: Arc::new(Mutex::new(None)),
                pipes: None,
            };
            if let Err(e) = slot.spawn() {
                error!("{e}");
                for started in &mut slots {
                    started.reap();
                }
                return Err(e);
            }
            slots.push(slot);
        }

        let children = slots.iter().map(|s| Arc::clone(&s.child)).collect();
        let mut dispatchers = Vec::with_capacity(size);
        for slot in slots {
            let jobs = rx.clone();
            let abort = Arc::clone(&abort);
            let name = format!("pool-dispatch-{}", slot.index);
            let handle = std::thread::Builder::new()
                .name(name)
                .spawn(move || dispatch_loop(slot, jobs, abort))
                .map_err(|e| PoolError::Spawn {
                    slot: dispatchers.len(),
                    reason: e.to_string(),
                })?;
            dispatchers.push(handle);
        }

        info!("Worker pool started with {size} workers");
        Ok(Self {
            size,
            jobs: Mutex::new(Some(tx)),
            backlog: rx,
            dispatchers: Mutex::new(dispatchers),
            children,
            abort,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a task for the next free worker.
    pub fn submit(&self, task: Task) -> Result<TaskHandle, PoolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = bounded(1);
        let job = Job {
            request: WorkerRequest { id, task },
            reply: reply_tx,
        };
        let jobs = self.jobs.lock();
        let sender = jobs.as_ref().ok_or(PoolError::ShuttingDown)?;
        sender.send(job).map_err(|_| PoolError::ShuttingDown)?;
        Ok(TaskHandle { id, reply: reply_rx })
    }

    /// Worker pids currently alive.
    pub fn worker_pids(&self) -> Vec<u32> {
        self.children
            .iter()
            .filter_map(|c| c.lock().as_ref().map(Child::id))
            .collect()
    }

    /// Tear down the pool.
    ///
    /// - `cancel_pending`: queued tasks fail with [`PoolError::Cancelled`].
    /// - `wait`: block until in-flight tasks finish and workers exit.
    /// - `!wait`: kill workers now; in-flight tasks fail.
    pub fn shutdown(&self, wait: bool, cancel_pending: bool) {
        let Some(sender) = self.jobs.lock().take() else {
            return;
        };
        drop(sender);

        if !wait {
            self.abort.store(true, Ordering::Release);
        }
        if cancel_pending || !wait {
            let mut cancelled = 0usize;
            while let Ok(job) = self.backlog.try_recv() {
                let _ = job.reply.send(Err(PoolError::Cancelled));
                cancelled += 1;
            }
            if cancelled > 0 {
                info!("Cancelled {cancelled} queued tasks");
            }
        }

        if wait {
            let handles: Vec<_> = self.dispatchers.lock().drain(..).collect();
            for handle in handles {
                if handle.join().is_err() {
                    error!("Pool dispatcher panicked");
                }
            }
            info!("Worker pool shut down");
        } else {
            for child in &self.children {
                if let Some(c) = child.lock().as_mut() {
                    let _ = c.kill();
                }
            }
            info!("Worker pool killed");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown(false, true);
    }
}

// ─── Registry ───────────────────────────────────────────────────────

/// Owner of the process-wide pool slot.
pub struct PoolRegistry {
    command: WorkerCommand,
    cpu_count: usize,
    pool: Mutex<Option<Arc<WorkerPool>>>,
}

impl PoolRegistry {
    pub fn new(command: WorkerCommand, cpu_count: usize) -> Self {
        Self {
            command,
            cpu_count,
            pool: Mutex::new(None),
        }
    }

    /// Start the pool, or return the running one.
    pub fn init(&self, max_workers: Option<usize>) -> Result<Arc<WorkerPool>, PoolError> {
        let mut slot = self.pool.lock();
        if let Some(pool) = slot.as_ref() {
            debug!("Worker pool already running");
            return Ok(Arc::clone(pool));
        }
        let size = pool_size(self.cpu_count, max_workers);
        let pool = Arc::new(WorkerPool::start(size, self.command.clone())?);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    pub fn get(&self) -> Result<Arc<WorkerPool>, PoolError> {
        self.pool.lock().clone().ok_or(PoolError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.lock().is_some()
    }

    /// Shut down and forget the pool.
    pub fn shutdown(&self, wait: bool, cancel_pending: bool) -> Result<(), PoolError> {
        let pool = self.pool.lock().take().ok_or(PoolError::NotInitialized)?;
        pool.shutdown(wait, cancel_pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bogus_command() -> WorkerCommand {
        WorkerCommand {
            program: PathBuf::from("/nonexistent/sand-worker"),
            args: Vec::new(),
        }
    }

    #[test]
    fn sizing_rule() {
        assert_eq!(pool_size(1, None), 1);
        assert_eq!(pool_size(2, None), 1);
        assert_eq!(pool_size(3, None), 2);
        assert_eq!(pool_size(4, None), 3);
        assert_eq!(pool_size(64, None), 3);
        assert_eq!(pool_size(64, Some(2)), 2);
        assert_eq!(pool_size(2, Some(3)), 1);
        assert_eq!(pool_size(8, Some(0)), 1);
    }

    #[test]
    fn empty_registry_reports_not_initialized() {
        let registry = PoolRegistry::new(bogus_command(), 4);
        assert!(matches!(registry.get(), Err(PoolError::NotInitialized)));
        assert!(matches!(
            registry.shutdown(true, true),
            Err(PoolError::NotInitialized)
        ));
    }

    #[test]
    fn spawn_failure_leaves_registry_empty() {
        let registry = PoolRegistry::new(bogus_command(), 4);
        assert!(matches!(registry.init(None), Err(PoolError::Spawn { slot: 0, .. })));
        assert!(!registry.is_initialized());
    }

    #[test]
    fn dropped_reply_channel_reads_as_cancelled() {
        let (tx, rx) = bounded::<Reply>(1);
        let handle = TaskHandle { id: 1, reply: rx };
        assert!(handle.try_get().is_none());
        drop(tx);
        assert!(matches!(handle.try_get(), Some(Err(PoolError::Cancelled))));
        assert!(matches!(handle.wait(), Err(PoolError::Cancelled)));
    }
}
