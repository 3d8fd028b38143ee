pub mod error;
pub mod types;

pub use error::TypesError;
pub use types::{ClusterState, ClusterView, Identity, LocalState};
