use std::time::Duration;

/// Backoff after a transient backend failure (network, timeout, 5xx), per the
/// original synchronizer's exception-handling pause.
pub const PAUSE_ON_EXCEPTION: Duration = Duration::from_secs(30);

/// Brief backoff after observing that the coordinated key does not exist yet.
pub const PAUSE_ON_MISSING_KEY: Duration = Duration::from_secs(5);
