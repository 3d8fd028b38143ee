use thiserror::Error;

/// Error taxonomy for the backend abstraction (spec §4.1, §7).
#[derive(Debug, Error)]
pub enum BackendError {
    /// The key does not exist. Benign — callers create-if-absent or back off.
    #[error("key missing")]
    KeyMissing,

    /// A write's CAS precondition did not hold. Expected under concurrency.
    #[error("write contended: expected version did not match")]
    Contended,

    /// Network, timeout, or 5xx-class failure. Callers back off and retry.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// The watch was cancelled cooperatively, not due to a change.
    #[error("watch cancelled")]
    Cancelled,

    /// Anything else the backend can't classify into the above.
    #[error("backend error: {0}")]
    Other(String),
}
