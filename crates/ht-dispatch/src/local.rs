//! In-process execution substrate running commands on the local host.

use std::collections::VecDeque;
use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::System;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use ht_cluster::{ExecutionSubstrate, OutputSink, OutputStream};
use ht_types::{
    ClusterError, GpuInfo, Job, JobError, JobResult, NodeResources, BYTES_PER_GB,
    OUTPUT_TAIL_LINES,
};

const NVIDIA_SMI: &str = "nvidia-smi";

/// Single-node substrate: discovery reads the local host, jobs run as child
/// processes. Grants are recorded but not enforced — the host's scheduler is
/// the substrate here.
#[derive(Debug, Default)]
pub struct LocalProcessSubstrate;

impl LocalProcessSubstrate {
    pub fn new() -> Self {
        Self
    }

    /// Best-effort accelerator count via `nvidia-smi --list-gpus`.
    async fn detect_gpu_count() -> Option<u32> {
        let output = Command::new(NVIDIA_SMI)
            .arg("--list-gpus")
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let count = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count();
        Some(count as u32)
    }

    /// The fixed diagnostic probe: enumerate visible GPUs with name, free
    /// memory, and serial. A probe failure is recorded as [`JobError::Probe`]
    /// so callers can tell infrastructure issues apart from job failures.
    async fn run_probe(
        job_id: Uuid,
        sink: &OutputSink,
    ) -> (Vec<GpuInfo>, Vec<String>, Option<JobError>) {
        let output = Command::new(NVIDIA_SMI)
            .args([
                "--query-gpu=name,memory.free,serial",
                "--format=csv,noheader,nounits",
            ])
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return (
                    Vec::new(),
                    Vec::new(),
                    Some(JobError::Probe {
                        message: format!("failed to run {NVIDIA_SMI}: {e}"),
                    }),
                )
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return (
                Vec::new(),
                Vec::new(),
                Some(JobError::Probe { message: stderr }),
            );
        }

        let mut gpus = Vec::new();
        let mut tail = Vec::new();
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            sink.emit(job_id, OutputStream::Stdout, line);
            tail.push(line.to_string());
            if let Some(gpu) = parse_gpu_line(line) {
                gpus.push(gpu);
            }
        }
        (gpus, tail, None)
    }

    /// Spawn the user command with piped output, streaming both pipes while
    /// retaining bounded tails, and wait for exit.
    async fn run_command(
        job: &Job,
        sink: &OutputSink,
    ) -> (Vec<String>, Vec<String>, Option<JobError>) {
        let Some(program) = job.command.first() else {
            return (
                Vec::new(),
                Vec::new(),
                Some(JobError::Spawn {
                    message: "empty command".into(),
                }),
            );
        };

        let mut child = match Command::new(program)
            .args(&job.command[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return (
                    Vec::new(),
                    Vec::new(),
                    Some(JobError::Spawn {
                        message: e.to_string(),
                    }),
                )
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout_tail, stderr_tail, status) = tokio::join!(
            drain_stream(stdout, job.id, OutputStream::Stdout, sink.clone()),
            drain_stream(stderr, job.id, OutputStream::Stderr, sink.clone()),
            child.wait(),
        );

        let error = match status {
            Ok(status) if status.success() => None,
            Ok(status) => Some(JobError::NonZeroExit {
                code: status.code().unwrap_or(-1),
            }),
            Err(e) => Some(JobError::Spawn {
                message: format!("wait failed: {e}"),
            }),
        };
        (stdout_tail, stderr_tail, error)
    }
}

/// Read lines from a pipe until EOF, forwarding each to the sink and keeping
/// the last [`OUTPUT_TAIL_LINES`] for the result.
async fn drain_stream<R: AsyncRead + Unpin>(
    pipe: Option<R>,
    job_id: Uuid,
    stream: OutputStream,
    sink: OutputSink,
) -> Vec<String> {
    let Some(pipe) = pipe else {
        return Vec::new();
    };
    let mut lines = BufReader::new(pipe).lines();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        sink.emit(job_id, stream, line.clone());
        if tail.len() == OUTPUT_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into()
}

/// Parse one `name, memory.free, serial` CSV row from the probe.
fn parse_gpu_line(line: &str) -> Option<GpuInfo> {
    let mut parts = line.splitn(3, ", ");
    let name = parts.next()?.to_string();
    let memory_free_mb = parts.next()?.trim().parse().ok()?;
    let serial = parts.next()?.trim().to_string();
    Some(GpuInfo {
        name,
        memory_free_mb,
        serial,
    })
}

#[async_trait]
impl ExecutionSubstrate for LocalProcessSubstrate {
    async fn list_nodes(&self) -> Result<Vec<NodeResources>, ClusterError> {
        let sys = System::new_all();
        let cpu_count = sys.cpus().len() as f64;
        let ram_gb = sys.total_memory() as f64 / BYTES_PER_GB as f64;
        let gpu_count = Self::detect_gpu_count().await.unwrap_or(0) as f64;
        let node_id = System::host_name().unwrap_or_else(|| "localhost".to_string());

        debug!(node = %node_id, gpus = gpu_count, cpus = cpu_count, ram_gb, "local host capacity");
        Ok(vec![NodeResources::new(node_id, gpu_count, cpu_count, ram_gb)])
    }

    async fn run_job(&self, job: Job, output: OutputSink) -> JobResult {
        let started_at = Utc::now();

        let (gpu_probe, stdout_tail, stderr_tail, error) = if job.test_mode {
            let (gpus, tail, error) = Self::run_probe(job.id, &output).await;
            (gpus, tail, Vec::new(), error)
        } else {
            let (stdout_tail, stderr_tail, error) = Self::run_command(&job, &output).await;
            (Vec::new(), stdout_tail, stderr_tail, error)
        };

        let detected_gpu_count = if job.test_mode {
            error.is_none().then(|| gpu_probe.len() as u32)
        } else {
            Self::detect_gpu_count().await
        };

        JobResult {
            job_id: job.id,
            command: if job.test_mode {
                "gpu-probe".into()
            } else {
                job.command_line()
            },
            started_at,
            finished_at: Utc::now(),
            stdout_tail,
            stderr_tail,
            gpu_probe,
            detected_gpu_count,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ht_types::ResourceGrant;

    fn grant() -> ResourceGrant {
        ResourceGrant {
            gpus: 0.0,
            cpus: 1.0,
            ram_gb: 1.0,
        }
    }

    fn job(tokens: &[&str]) -> Job {
        Job::new(tokens.iter().map(|s| s.to_string()).collect(), grant())
    }

    #[test]
    fn parses_probe_csv_row() {
        let gpu = parse_gpu_line("NVIDIA L4, 22000, 1560921102345").unwrap();
        assert_eq!(gpu.name, "NVIDIA L4");
        assert_eq!(gpu.memory_free_mb, 22000);
        assert_eq!(gpu.serial, "1560921102345");

        assert!(parse_gpu_line("garbage").is_none());
    }

    #[tokio::test]
    async fn local_discovery_reports_one_node() {
        let nodes = LocalProcessSubstrate::new().list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].cpu_count >= 1.0);
        assert!(nodes[0].ram_gb > 0.0);
        assert!(!nodes[0].coordinator);
    }

    #[tokio::test]
    async fn captures_stdout_of_real_command() {
        let substrate = LocalProcessSubstrate::new();
        let result = substrate
            .run_job(job(&["echo", "hello world"]), OutputSink::discard())
            .await;
        assert!(result.is_success());
        assert_eq!(result.stdout_tail, vec!["hello world".to_string()]);
        assert!(result.finished_at >= result.started_at);
    }

    #[tokio::test]
    async fn nonzero_exit_is_recorded_not_raised() {
        let substrate = LocalProcessSubstrate::new();
        let result = substrate
            .run_job(job(&["sh", "-c", "echo out; exit 3"]), OutputSink::discard())
            .await;
        assert_eq!(result.error, Some(JobError::NonZeroExit { code: 3 }));
        assert_eq!(result.stdout_tail, vec!["out".to_string()]);
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let substrate = LocalProcessSubstrate::new();
        let result = substrate
            .run_job(job(&["definitely-not-a-real-binary-xyz"]), OutputSink::discard())
            .await;
        assert!(matches!(result.error, Some(JobError::Spawn { .. })));
    }

    #[tokio::test]
    async fn empty_command_is_a_spawn_error() {
        let substrate = LocalProcessSubstrate::new();
        let result = substrate
            .run_job(Job::new(Vec::new(), grant()), OutputSink::discard())
            .await;
        assert!(matches!(result.error, Some(JobError::Spawn { .. })));
    }

    #[tokio::test]
    async fn output_lines_stream_to_sink() {
        let (sink, mut rx) = OutputSink::bounded(16);
        let substrate = LocalProcessSubstrate::new();
        let result = substrate
            .run_job(job(&["sh", "-c", "echo a; echo b"]), sink)
            .await;
        assert!(result.is_success());
        assert_eq!(rx.recv().await.unwrap().line, "a");
        assert_eq!(rx.recv().await.unwrap().line, "b");
    }
}
