//! Jobs and their immutable results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::resources::ResourceGrant;

/// How many trailing output lines a [`JobResult`] retains per stream.
pub const OUTPUT_TAIL_LINES: usize = 200;

/// One command to run on the cluster with its resource grant.
///
/// Submitted exactly once; terminates with a [`JobResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Command tokens: executable/script first, then its arguments.
    pub command: Vec<String>,
    pub grant: ResourceGrant,
    /// Run the GPU diagnostic probe instead of the command.
    pub test_mode: bool,
}

impl Job {
    pub fn new(command: Vec<String>, grant: ResourceGrant) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            grant,
            test_mode: false,
        }
    }

    pub fn test_probe(grant: ResourceGrant) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: Vec::new(),
            grant,
            test_mode: true,
        }
    }

    /// The command as a single display string.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// A failure recorded against one job. Never propagated: sibling jobs keep
/// running and the dispatcher still reports one outcome per submitted job.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum JobError {
    #[error("command exited with status {code}")]
    NonZeroExit { code: i32 },

    #[error("failed to spawn command: {message}")]
    Spawn { message: String },

    /// The GPU probe itself failed — distinct from a user-command failure so
    /// callers can tell probe infrastructure issues apart from job issues.
    #[error("diagnostic probe failed: {message}")]
    Probe { message: String },

    #[error("job task panicked: {message}")]
    Panicked { message: String },
}

/// One GPU reported by the diagnostic probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub memory_free_mb: u64,
    pub serial: String,
}

/// Immutable outcome of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: Uuid,
    /// The command line that ran (or "gpu-probe" in test mode).
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Trailing stdout lines, bounded by [`OUTPUT_TAIL_LINES`].
    pub stdout_tail: Vec<String>,
    /// Trailing stderr lines, bounded by [`OUTPUT_TAIL_LINES`].
    pub stderr_tail: Vec<String>,
    /// GPUs enumerated by the diagnostic probe (test-mode jobs only).
    pub gpu_probe: Vec<GpuInfo>,
    /// Best-effort count of accelerators visible to the job.
    pub detected_gpu_count: Option<u32>,
    pub error: Option<JobError>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// One-line human-readable outcome, printed per job in submission order.
    pub fn summary(&self) -> String {
        let gpus = match self.detected_gpu_count {
            Some(n) => n.to_string(),
            None => "unknown".to_string(),
        };
        let outcome = match &self.error {
            None => "ok".to_string(),
            Some(e) => format!("error: {e}"),
        };
        format!(
            "started at {}, completed at {} | # detected GPUs: {} | {}",
            self.started_at.format("%H:%M:%S%.6f"),
            self.finished_at.format("%H:%M:%S%.6f"),
            gpus,
            outcome
        )
    }
}
