use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("unknown local state label: {0}")]
    UnknownLocalState(String),

    #[error("unknown cluster state label: {0}")]
    UnknownClusterState(String),
}
