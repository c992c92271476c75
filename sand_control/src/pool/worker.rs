//! Worker process entry point.
//!
//! A worker is this same binary started with the `worker` subcommand. It
//! demotes itself to the background scheduling target, then answers
//! [`WorkerRequest`]s from stdin until stdin closes. Stdout carries only
//! protocol lines; logs go to stderr.

use std::io::{self, BufRead, Write};

use sand_common::config::SchedulingConfig;
use tracing::{debug, info, warn};

use super::task::{TaskError, WorkerRequest, WorkerResponse, execute};
use crate::sched::{SchedulingPolicy, TaskRef, WorkClass, cpu_count};

/// Run the worker loop on this process's stdin/stdout.
pub fn run_worker(config: &SchedulingConfig) -> io::Result<()> {
    let policy = SchedulingPolicy::new(config.clone());
    let target = policy.target_for(WorkClass::Background, cpu_count());
    let report = policy.apply(&target, TaskRef::CurrentThread);
    info!(
        "Worker {} ready (priority {:?}, pinned={})",
        std::process::id(),
        report.priority,
        report.pinned
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    let served = serve(stdin.lock(), stdout.lock())?;
    info!("Worker {} exiting after {served} tasks", std::process::id());
    Ok(())
}

/// Answer requests until `input` reaches EOF. Returns the number served.
pub fn serve<R: BufRead, W: Write>(input: R, mut output: W) -> io::Result<usize> {
    let mut served = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<WorkerRequest>(&line) {
            Ok(request) => {
                debug!("Task {}: {:?}", request.id, request.task);
                WorkerResponse {
                    id: request.id,
                    result: execute(&request.task),
                }
            }
            Err(e) => {
                warn!("Unparseable request: {e}");
                WorkerResponse {
                    id: 0,
                    result: Err(TaskError::BadRequest(e.to_string())),
                }
            }
        };
        let encoded = serde_json::to_string(&response).map_err(io::Error::other)?;
        writeln!(output, "{encoded}")?;
        output.flush()?;
        served += 1;
    }
    Ok(served)
}
