//! Submission and ordered collection of concurrent jobs.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use ht_cluster::{ExecutionSubstrate, OutputLine, OutputSink};
use ht_types::{Job, JobError, JobResult, ResourceGrant};

/// Buffered output lines before best-effort drop kicks in.
const OUTPUT_BUFFER_LINES: usize = 1024;

/// Handle to one submitted job. Holds enough identity to fabricate a failure
/// result if the job's task panics instead of returning.
pub struct JobHandle {
    pub job_id: Uuid,
    /// Zero-based submission index; results are collected in this order.
    pub index: usize,
    command: String,
    join: JoinHandle<JobResult>,
}

/// Submits jobs as detached asynchronous tasks and collects their results.
///
/// Scoped to one dispatch batch: the output channel and observer lifecycle
/// end with the dispatcher, not with the process.
pub struct JobDispatcher<S: ExecutionSubstrate> {
    substrate: Arc<S>,
    sink: OutputSink,
    output_rx: Option<mpsc::Receiver<OutputLine>>,
    submitted: usize,
}

impl<S: ExecutionSubstrate + 'static> JobDispatcher<S> {
    pub fn new(substrate: Arc<S>) -> Self {
        let (sink, output_rx) = OutputSink::bounded(OUTPUT_BUFFER_LINES);
        Self {
            substrate,
            sink,
            output_rx: Some(output_rx),
            submitted: 0,
        }
    }

    /// Take the live-output receiver. The first caller owns it; pass it to
    /// [`spawn_log_observer`] or consume it directly for progress display.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<OutputLine>> {
        self.output_rx.take()
    }

    /// Fire one job into the work queue. Returns immediately; the job runs
    /// to completion on its own and cannot be cancelled.
    pub fn submit(&mut self, job: Job) -> JobHandle {
        let index = self.submitted;
        self.submitted += 1;

        info!(
            job = index + 1,
            command = %job.command_line(),
            grant = %job.grant,
            test_mode = job.test_mode,
            "submitting job"
        );

        let job_id = job.id;
        let command = if job.test_mode {
            "gpu-probe".to_string()
        } else {
            job.command_line()
        };
        let substrate = Arc::clone(&self.substrate);
        let sink = self.sink.clone();
        let join = tokio::spawn(async move { substrate.run_job(job, sink).await });

        JobHandle {
            job_id,
            index,
            command,
            join,
        }
    }

    /// Join-all over the handles: blocks until every job has terminated and
    /// returns results in submission order regardless of completion order.
    ///
    /// A panicked job task is converted into a failed [`JobResult`] so the
    /// caller still sees one outcome per submitted job.
    pub async fn collect(&mut self, handles: Vec<JobHandle>) -> Vec<JobResult> {
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = match handle.join.await {
                Ok(result) => result,
                Err(join_error) => {
                    warn!(job = handle.index + 1, error = %join_error, "job task panicked");
                    let now = Utc::now();
                    JobResult {
                        job_id: handle.job_id,
                        command: handle.command,
                        started_at: now,
                        finished_at: now,
                        stdout_tail: Vec::new(),
                        stderr_tail: Vec::new(),
                        gpu_probe: Vec::new(),
                        detected_gpu_count: None,
                        error: Some(JobError::Panicked {
                            message: join_error.to_string(),
                        }),
                    }
                }
            };
            results.push(result);
        }

        for (i, result) in results.iter().enumerate() {
            info!(job = i + 1, "job {} result: {}", i + 1, result.summary());
        }
        results
    }

    /// Build, submit, and collect one batch: one job per command, all with
    /// the same grant. In test mode every command is replaced by the probe.
    pub async fn dispatch_batch(
        &mut self,
        commands: Vec<Vec<String>>,
        grant: ResourceGrant,
        test_mode: bool,
    ) -> Vec<JobResult> {
        let handles: Vec<JobHandle> = commands
            .into_iter()
            .map(|command| {
                let job = if test_mode {
                    Job::test_probe(grant)
                } else {
                    Job::new(command, grant)
                };
                self.submit(job)
            })
            .collect();
        self.collect(handles).await
    }
}

/// Forward live output lines to `tracing` until the channel closes.
pub fn spawn_log_observer(mut rx: mpsc::Receiver<OutputLine>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            info!(job_id = %line.job_id, stream = ?line.stream, "{}", line.line);
        }
    })
}
