//! Capability boundary to the execution substrate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use ht_types::{ClusterError, Job, JobResult, NodeResources};

/// Which stream a captured output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of live job output, streamed to the observer while the job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLine {
    pub job_id: Uuid,
    pub stream: OutputStream,
    pub line: String,
}

/// Cheap clone-able handle for streaming job output to an observer.
///
/// Emission is best-effort over a bounded channel: when the observer lags,
/// lines are dropped rather than blocking the job's own progress. The full
/// (bounded) tail is still retained in the final [`JobResult`].
#[derive(Debug, Clone)]
pub struct OutputSink {
    tx: mpsc::Sender<OutputLine>,
}

impl OutputSink {
    /// Create a sink with the given buffer capacity, returning the receiver
    /// for the observer side.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<OutputLine>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// A sink whose receiver has been dropped; all emissions are discarded.
    pub fn discard() -> Self {
        let (sink, _rx) = Self::bounded(1);
        sink
    }

    pub fn emit(&self, job_id: Uuid, stream: OutputStream, line: impl Into<String>) {
        // try_send: a slow or absent observer never blocks the job.
        let _ = self.tx.try_send(OutputLine {
            job_id,
            stream,
            line: line.into(),
        });
    }
}

/// The opaque external collaborator that owns the worker pool.
///
/// Implementations may talk to a real cluster scheduler or run commands
/// locally (see `ht-dispatch`'s `LocalProcessSubstrate`).
#[async_trait]
pub trait ExecutionSubstrate: Send + Sync {
    /// Query every reachable worker node for its advertised resources.
    async fn list_nodes(&self) -> Result<Vec<NodeResources>, ClusterError>;

    /// Run one job to completion, streaming output lines to `output`.
    ///
    /// Infallible by contract: command failures, probe failures, and spawn
    /// failures are recorded in the returned [`JobResult`], never raised.
    /// The job's grant is an advisory placement hint for the substrate.
    async fn run_job(&self, job: Job, output: OutputSink) -> JobResult;
}
