//! Cluster capacity snapshots and per-job resource grants.

use serde::{Deserialize, Serialize};

/// Bytes in one gigabyte, used when normalizing substrate-reported memory.
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Resources advertised by a single worker node, captured at discovery time.
///
/// Counts are fractional because the execution substrate may grant partial
/// GPUs/CPUs to a job; placement is advisory rather than enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResources {
    /// Substrate-assigned node identifier.
    pub node_id: String,
    pub gpu_count: f64,
    pub cpu_count: f64,
    pub ram_gb: f64,
    /// Whether this is the coordinator/head node of the cluster.
    pub coordinator: bool,
}

impl NodeResources {
    pub fn new(node_id: impl Into<String>, gpu_count: f64, cpu_count: f64, ram_gb: f64) -> Self {
        Self {
            node_id: node_id.into(),
            gpu_count,
            cpu_count,
            ram_gb,
            coordinator: false,
        }
    }

    pub fn coordinator(mut self) -> Self {
        self.coordinator = true;
        self
    }
}

/// Whether the coordinator node counts toward aggregate capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyMode {
    /// Every responding node contributes capacity.
    AllNodes,
    /// The coordinator/head node is reserved and excluded from aggregation.
    ExcludeCoordinator,
}

impl Default for TopologyMode {
    fn default() -> Self {
        Self::ExcludeCoordinator
    }
}

/// Aggregate capacity envelope over the included worker nodes.
///
/// Alongside the summed totals this retains the per-dimension maximum over
/// any single included node, which cap-per-node allocation needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCapacity {
    pub gpus: f64,
    pub cpus: f64,
    pub ram_gb: f64,
    /// Largest GPU count on any single included node.
    pub max_node_gpus: f64,
    /// Largest CPU count on any single included node.
    pub max_node_cpus: f64,
    /// Largest RAM on any single included node.
    pub max_node_ram_gb: f64,
    /// Number of nodes included in the aggregate.
    pub node_count: usize,
}

impl ClusterCapacity {
    /// Sum capacity across `nodes`, honoring the topology mode.
    pub fn aggregate(nodes: &[NodeResources], topology: TopologyMode) -> Self {
        let mut capacity = Self::empty();
        for node in nodes {
            if topology == TopologyMode::ExcludeCoordinator && node.coordinator {
                continue;
            }
            capacity.gpus += node.gpu_count;
            capacity.cpus += node.cpu_count;
            capacity.ram_gb += node.ram_gb;
            capacity.max_node_gpus = capacity.max_node_gpus.max(node.gpu_count);
            capacity.max_node_cpus = capacity.max_node_cpus.max(node.cpu_count);
            capacity.max_node_ram_gb = capacity.max_node_ram_gb.max(node.ram_gb);
            capacity.node_count += 1;
        }
        capacity
    }

    pub fn empty() -> Self {
        Self {
            gpus: 0.0,
            cpus: 0.0,
            ram_gb: 0.0,
            max_node_gpus: 0.0,
            max_node_cpus: 0.0,
            max_node_ram_gb: 0.0,
            node_count: 0,
        }
    }

    /// True when no nodes contributed to the aggregate.
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }
}

/// The resource quota assigned to exactly one job for its execution lifetime.
///
/// Advisory: concurrent jobs sharing a node rely on the execution substrate
/// to honor the grant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceGrant {
    pub gpus: f64,
    pub cpus: f64,
    pub ram_gb: f64,
}

impl std::fmt::Display for ResourceGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} GPU / {} CPU / {} GB",
            self.gpus, self.cpus, self.ram_gb
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_nodes() -> Vec<NodeResources> {
        vec![
            NodeResources::new("head", 0.0, 16.0, 64.0).coordinator(),
            NodeResources::new("worker-0", 4.0, 32.0, 128.0),
            NodeResources::new("worker-1", 8.0, 16.0, 64.0),
        ]
    }

    #[test]
    fn aggregate_excludes_coordinator() {
        let capacity = ClusterCapacity::aggregate(&sample_nodes(), TopologyMode::ExcludeCoordinator);
        assert_eq!(capacity.node_count, 2);
        assert_eq!(capacity.gpus, 12.0);
        assert_eq!(capacity.cpus, 48.0);
        assert_eq!(capacity.ram_gb, 192.0);
    }

    #[test]
    fn aggregate_all_nodes_includes_head() {
        let capacity = ClusterCapacity::aggregate(&sample_nodes(), TopologyMode::AllNodes);
        assert_eq!(capacity.node_count, 3);
        assert_eq!(capacity.cpus, 64.0);
    }

    #[test]
    fn aggregate_tracks_single_node_maxima() {
        let capacity = ClusterCapacity::aggregate(&sample_nodes(), TopologyMode::ExcludeCoordinator);
        assert_eq!(capacity.max_node_gpus, 8.0);
        assert_eq!(capacity.max_node_cpus, 32.0);
        assert_eq!(capacity.max_node_ram_gb, 128.0);
    }

    #[test]
    fn aggregate_of_nothing_is_empty() {
        let head_only = vec![NodeResources::new("head", 0.0, 8.0, 32.0).coordinator()];
        let capacity = ClusterCapacity::aggregate(&head_only, TopologyMode::ExcludeCoordinator);
        assert!(capacity.is_empty());
    }

    #[test]
    fn grant_display() {
        let grant = ResourceGrant {
            gpus: 2.0,
            cpus: 8.0,
            ram_gb: 32.0,
        };
        assert_eq!(grant.to_string(), "2 GPU / 8 CPU / 32 GB");
    }
}
