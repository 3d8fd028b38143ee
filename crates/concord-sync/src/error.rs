use thiserror::Error;

use concord_backend::BackendError;
use concord_cluster::ClusterError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("cluster document error: {0}")]
    Cluster(#[from] ClusterError),
}
