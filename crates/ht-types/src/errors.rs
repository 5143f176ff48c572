use thiserror::Error;

/// Main error type for the Hivetune system
#[derive(Error, Debug)]
pub enum HtError {
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Search space error: {0}")]
    SearchSpace(#[from] SearchSpaceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while discovering cluster capacity.
///
/// These are fail-fast: they abort the whole batch before any job is
/// submitted, since every grant depends on the same capacity snapshot.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("no worker nodes responded to discovery")]
    Unreachable,

    #[error("discovery timed out after {timeout_secs} seconds")]
    DiscoveryTimeout { timeout_secs: u64 },

    #[error("execution substrate error: {message}")]
    Substrate { message: String },
}

/// Errors raised while computing per-job resource grants.
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("insufficient resources: {message}")]
    InsufficientResources { message: String },
}

/// Errors raised while building or resolving a configuration tree.
#[derive(Error, Debug)]
pub enum SearchSpaceError {
    #[error("dependent field {field} references unknown key {input}")]
    UnknownInput { field: String, input: String },

    #[error("dependent field {field} references {input}, which resolves after it")]
    ForwardReference { field: String, input: String },

    #[error("field {field} resolved to an unexpected type: {message}")]
    TypeMismatch { field: String, message: String },
}

/// Result type alias for Hivetune operations
pub type HtResult<T> = Result<T, HtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ClusterError::DiscoveryTimeout { timeout_secs: 30 };
        assert!(error.to_string().contains("30 seconds"));

        let error = AllocationError::InsufficientResources {
            message: "job count must be positive, got 0".into(),
        };
        assert!(error.to_string().contains("insufficient resources"));
    }

    #[test]
    fn test_error_conversion() {
        let cluster_error = ClusterError::Unreachable;
        let ht_error: HtError = cluster_error.into();

        match ht_error {
            HtError::Cluster(_) => (),
            _ => panic!("Expected Cluster error"),
        }
    }
}
