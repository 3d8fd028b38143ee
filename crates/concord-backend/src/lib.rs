pub mod backend;
pub mod consul_backend;
pub mod error;
pub mod etcd_backend;
pub mod memory;

pub use backend::{Backend, CancellationToken, Cas, Version};
pub use consul_backend::ConsulBackend;
pub use error::BackendError;
pub use etcd_backend::EtcdBackend;
pub use memory::InMemoryBackend;
