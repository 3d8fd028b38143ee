pub mod audit;
pub mod backoff;
pub mod error;
pub mod synchronizer;

pub use audit::{AuditEvent, AuditLog};
pub use error::SyncError;
pub use synchronizer::{Synchronizer, SynchronizerHandle};
