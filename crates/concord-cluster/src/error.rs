use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("malformed cluster view document: {0}")]
    Malformed(#[from] serde_json::Error),
}
