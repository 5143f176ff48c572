//! Thin service entry point: discover → allocate → dispatch → report.
//!
//! Command tokens are taken from the process arguments and split into jobs
//! at `.py` boundaries. Batch knobs come from the environment:
//!
//! - `HT_TEST_MODE=1`       run the GPU probe instead of the commands
//! - `HT_GPUS_PER_JOB` / `HT_CPUS_PER_JOB` / `HT_RAM_GB_PER_JOB`
//!                          per-job caps (used verbatim, never divided)
//! - `HT_CAP_PER_NODE=1`    cap-per-node allocation instead of even division

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use ht_cluster::{
    AllocationMode, AllocatorConfig, CatalogConfig, ResourceAllocator, ResourceCatalog,
    ResourceOverrides,
};
use ht_dispatch::{
    spawn_log_observer, split_commands, JobDispatcher, LocalProcessSubstrate,
    DEFAULT_JOB_MARKER_SUFFIX,
};

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

fn env_f64(name: &str) -> anyhow::Result<Option<f64>> {
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw
                .parse::<f64>()
                .with_context(|| format!("{name} must be a number, got {raw:?}"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let tokens: Vec<String> = std::env::args().skip(1).collect();
    let test_mode = env_flag("HT_TEST_MODE");

    let commands = split_commands(&tokens, DEFAULT_JOB_MARKER_SUFFIX);
    if commands.is_empty() && !test_mode {
        bail!("no job commands given: pass tokens with .py script boundaries");
    }
    let job_count = commands.len().max(1);

    let substrate = Arc::new(LocalProcessSubstrate::new());

    // Fail fast: every grant depends on the same capacity snapshot.
    let catalog = ResourceCatalog::new(Arc::clone(&substrate), CatalogConfig::default());
    let capacity = catalog.discover().await.context("capacity discovery failed")?;

    let mode = if env_flag("HT_CAP_PER_NODE") {
        AllocationMode::CapPerNode
    } else {
        AllocationMode::DivideTotal
    };
    let allocator = ResourceAllocator::new(AllocatorConfig {
        mode,
        overrides: ResourceOverrides {
            gpus: env_f64("HT_GPUS_PER_JOB")?,
            cpus: env_f64("HT_CPUS_PER_JOB")?,
            ram_gb: env_f64("HT_RAM_GB_PER_JOB")?,
        },
        require_gpus: false,
    });
    let grant = allocator
        .allocate(&capacity, job_count)
        .context("resource allocation failed")?;

    let mut dispatcher = JobDispatcher::new(substrate);
    let observer = dispatcher
        .take_output()
        .map(spawn_log_observer);

    let batch = if commands.is_empty() {
        vec![Vec::new()] // probe-only run
    } else {
        commands
    };
    let results = dispatcher.dispatch_batch(batch, grant, test_mode).await;

    drop(dispatcher);
    if let Some(observer) = observer {
        let _ = observer.await;
    }

    for (i, result) in results.iter().enumerate() {
        println!("Job {} result: {}", i + 1, result.summary());
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        bail!("{failed} of {} jobs failed", results.len());
    }
    Ok(())
}
