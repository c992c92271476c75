//! Task wire format shared by the pool and its worker processes.
//!
//! One JSON object per line in each direction:
//!
//! ```text
//! → {"id":7,"task":{"type":"extents","path":"/patterns/spiral.thr"}}
//! ← {"id":7,"result":{"Ok":{"type":"extents","count":812,...}}}
//! ```

use std::path::{Path, PathBuf};

use sand_common::pattern::{ParsedPattern, PatternExtents, load_thr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CPU-bound work a pool worker can execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    /// Parse a `.thr` file into coordinates.
    ParsePattern { path: PathBuf },
    /// Preview statistics for a `.thr` file.
    Extents { path: PathBuf },
    /// Liveness check; answered with the worker's pid.
    Ping,
}

/// Successful task output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskOutput {
    Pattern(ParsedPattern),
    Extents(PatternExtents),
    Pong { pid: u32 },
}

/// Failure reported by the worker for a single task.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TaskError {
    #[error("cannot read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("{path} contains no coordinates")]
    EmptyPattern { path: String },

    #[error("malformed request: {0}")]
    BadRequest(String),
}

/// Request envelope written to a worker's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: u64,
    pub task: Task,
}

/// Response envelope read from a worker's stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: u64,
    pub result: Result<TaskOutput, TaskError>,
}

fn read_pattern(path: &Path) -> Result<ParsedPattern, TaskError> {
    load_thr(path).map_err(|e| TaskError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Run a task in the current process.
pub fn execute(task: &Task) -> Result<TaskOutput, TaskError> {
    match task {
        Task::ParsePattern { path } => read_pattern(path).map(TaskOutput::Pattern),
        Task::Extents { path } => {
            let pattern = read_pattern(path)?;
            PatternExtents::of(&pattern.coordinates)
                .map(TaskOutput::Extents)
                .ok_or_else(|| TaskError::EmptyPattern {
                    path: path.display().to_string(),
                })
        }
        Task::Ping => Ok(TaskOutput::Pong {
            pid: std::process::id(),
        }),
    }
}
