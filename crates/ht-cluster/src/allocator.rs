//! Division of discovered capacity into per-job grants.

use serde::{Deserialize, Serialize};
use tracing::info;

use ht_types::{AllocationError, ClusterCapacity, ResourceGrant};

/// How unoverridden dimensions are derived from cluster capacity.
///
/// This is an explicit caller choice — the allocator never infers the mode
/// from which overrides happen to be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationMode {
    /// Divide summed cluster capacity evenly by the job count.
    DivideTotal,
    /// Grant each job the largest single-node capacity along each dimension.
    /// Used when jobs must fit on one node of a partially reserved cluster.
    CapPerNode,
}

/// User-specified per-job caps. When present, the value is the grant for
/// that dimension verbatim — it is never divided further.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceOverrides {
    pub gpus: Option<f64>,
    pub cpus: Option<f64>,
    pub ram_gb: Option<f64>,
}

/// Allocator configuration for one batch.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorConfig {
    pub mode: AllocationMode,
    pub overrides: ResourceOverrides,
    /// Whether a zero GPU grant is an error. CPU and RAM are always required.
    pub require_gpus: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            mode: AllocationMode::DivideTotal,
            overrides: ResourceOverrides::default(),
            require_gpus: false,
        }
    }
}

/// Computes the per-job [`ResourceGrant`] for a batch of `job_count` jobs.
pub struct ResourceAllocator {
    config: AllocatorConfig,
}

impl ResourceAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    /// Fails fast with `InsufficientResources` before any job is submitted:
    /// the whole batch shares one capacity snapshot, so a bad grant here
    /// would invalidate every job.
    pub fn allocate(
        &self,
        capacity: &ClusterCapacity,
        job_count: usize,
    ) -> Result<ResourceGrant, AllocationError> {
        if job_count == 0 {
            return Err(AllocationError::InsufficientResources {
                message: "job count must be positive, got 0".into(),
            });
        }

        let overrides = &self.config.overrides;
        let grant = ResourceGrant {
            gpus: overrides
                .gpus
                .unwrap_or_else(|| self.derive(capacity.gpus, capacity.max_node_gpus, job_count)),
            cpus: overrides
                .cpus
                .unwrap_or_else(|| self.derive(capacity.cpus, capacity.max_node_cpus, job_count)),
            ram_gb: overrides.ram_gb.unwrap_or_else(|| {
                self.derive(capacity.ram_gb, capacity.max_node_ram_gb, job_count)
            }),
        };

        if self.config.require_gpus && grant.gpus <= 0.0 {
            return Err(AllocationError::InsufficientResources {
                message: format!("GPU grant is {} but GPUs are required", grant.gpus),
            });
        }
        if grant.cpus <= 0.0 || grant.ram_gb <= 0.0 {
            return Err(AllocationError::InsufficientResources {
                message: format!(
                    "per-job grant has a non-positive dimension: {grant} across {job_count} jobs"
                ),
            });
        }

        info!(jobs = job_count, grant = %grant, mode = ?self.config.mode, "allocated per-job grant");
        Ok(grant)
    }

    fn derive(&self, total: f64, max_node: f64, job_count: usize) -> f64 {
        match self.config.mode {
            AllocationMode::DivideTotal => total / job_count as f64,
            AllocationMode::CapPerNode => max_node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ht_types::{NodeResources, TopologyMode};

    fn capacity_8_32_128() -> ClusterCapacity {
        let nodes = vec![
            NodeResources::new("worker-0", 4.0, 16.0, 64.0),
            NodeResources::new("worker-1", 4.0, 16.0, 64.0),
        ];
        ClusterCapacity::aggregate(&nodes, TopologyMode::AllNodes)
    }

    #[test]
    fn even_division_across_jobs() {
        let allocator = ResourceAllocator::new(AllocatorConfig::default());
        let grant = allocator.allocate(&capacity_8_32_128(), 4).unwrap();
        assert_eq!(grant.gpus, 2.0);
        assert_eq!(grant.cpus, 8.0);
        assert_eq!(grant.ram_gb, 32.0);
    }

    #[test]
    fn zero_jobs_is_insufficient() {
        let allocator = ResourceAllocator::new(AllocatorConfig::default());
        let result = allocator.allocate(&capacity_8_32_128(), 0);
        assert!(matches!(
            result,
            Err(AllocationError::InsufficientResources { .. })
        ));
    }

    #[test]
    fn overrides_are_per_job_caps_not_divided() {
        let config = AllocatorConfig {
            overrides: ResourceOverrides {
                gpus: Some(1.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let grant = ResourceAllocator::new(config)
            .allocate(&capacity_8_32_128(), 4)
            .unwrap();
        assert_eq!(grant.gpus, 1.0); // not 8/4 and not 1/4
        assert_eq!(grant.cpus, 8.0); // unoverridden dimensions still divided
    }

    #[test]
    fn cap_per_node_uses_single_node_maximum() {
        let nodes = vec![
            NodeResources::new("worker-0", 8.0, 32.0, 128.0),
            NodeResources::new("worker-1", 2.0, 64.0, 64.0),
        ];
        let capacity = ClusterCapacity::aggregate(&nodes, TopologyMode::AllNodes);
        let config = AllocatorConfig {
            mode: AllocationMode::CapPerNode,
            ..Default::default()
        };
        let grant = ResourceAllocator::new(config).allocate(&capacity, 3).unwrap();
        // Maximum along each dimension independently, never the sum.
        assert_eq!(grant.gpus, 8.0);
        assert_eq!(grant.cpus, 64.0);
        assert_eq!(grant.ram_gb, 128.0);
    }

    #[test]
    fn gpu_free_cluster_fails_only_when_gpus_required() {
        let nodes = vec![NodeResources::new("cpu-box", 0.0, 8.0, 32.0)];
        let capacity = ClusterCapacity::aggregate(&nodes, TopologyMode::AllNodes);

        let lenient = ResourceAllocator::new(AllocatorConfig::default());
        assert!(lenient.allocate(&capacity, 2).is_ok());

        let strict = ResourceAllocator::new(AllocatorConfig {
            require_gpus: true,
            ..Default::default()
        });
        assert!(matches!(
            strict.allocate(&capacity, 2),
            Err(AllocationError::InsufficientResources { .. })
        ));
    }

    #[test]
    fn empty_capacity_fails() {
        let allocator = ResourceAllocator::new(AllocatorConfig::default());
        let result = allocator.allocate(&ClusterCapacity::empty(), 2);
        assert!(matches!(
            result,
            Err(AllocationError::InsufficientResources { .. })
        ));
    }
}
