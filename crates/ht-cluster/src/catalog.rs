//! Read-only discovery of aggregate cluster capacity.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use ht_types::{ClusterCapacity, ClusterError, TopologyMode};

use crate::substrate::ExecutionSubstrate;

/// Configuration for one discovery pass.
#[derive(Debug, Clone, Copy)]
pub struct CatalogConfig {
    pub topology: TopologyMode,
    /// Discovery fails with `DiscoveryTimeout` rather than hanging.
    pub timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            topology: TopologyMode::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Queries the worker pool for per-node capacity and aggregates it into a
/// single logical envelope. Read-only: no side effects beyond the query.
pub struct ResourceCatalog<S: ExecutionSubstrate> {
    substrate: Arc<S>,
    config: CatalogConfig,
}

impl<S: ExecutionSubstrate> ResourceCatalog<S> {
    pub fn new(substrate: Arc<S>, config: CatalogConfig) -> Self {
        Self { substrate, config }
    }

    /// One-shot blocking discovery with a timeout.
    ///
    /// Fails with [`ClusterError::Unreachable`] when no nodes respond, or
    /// when topology exclusion leaves no worker nodes to run on.
    pub async fn discover(&self) -> Result<ClusterCapacity, ClusterError> {
        let nodes = tokio::time::timeout(self.config.timeout, self.substrate.list_nodes())
            .await
            .map_err(|_| ClusterError::DiscoveryTimeout {
                timeout_secs: self.config.timeout.as_secs(),
            })??;

        if nodes.is_empty() {
            return Err(ClusterError::Unreachable);
        }

        for node in &nodes {
            debug!(
                node = %node.node_id,
                gpus = node.gpu_count,
                cpus = node.cpu_count,
                ram_gb = node.ram_gb,
                coordinator = node.coordinator,
                "discovered node"
            );
        }

        let capacity = ClusterCapacity::aggregate(&nodes, self.config.topology);
        if capacity.is_empty() {
            // All responders were excluded by topology; nothing can run here.
            return Err(ClusterError::Unreachable);
        }

        info!(
            nodes = capacity.node_count,
            gpus = capacity.gpus,
            cpus = capacity.cpus,
            ram_gb = capacity.ram_gb,
            "cluster capacity discovered"
        );
        Ok(capacity)
    }
}
