use std::sync::Mutex;

use chrono::{DateTime, Utc};
use concord_types::{Identity, LocalState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An observation recorded by a [`crate::Synchronizer`] as it runs. Purely
/// observability — nothing here is read back by the loop itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AuditEvent {
    /// A CAS write advancing `self` to a new state succeeded.
    TransitionApplied {
        id: Uuid,
        at: DateTime<Utc>,
        self_id: Identity,
        to: LocalState,
    },
    /// A CAS write lost the race; the synchronizer will re-read and retry.
    TransitionContended {
        id: Uuid,
        at: DateTime<Utc>,
        self_id: Identity,
    },
    /// `self` was removed from the view (`DELETE_ME` applied).
    LeftCluster {
        id: Uuid,
        at: DateTime<Utc>,
        self_id: Identity,
    },
}

/// Append-only, in-memory log of [`AuditEvent`]s. No mandated persistence —
/// an embedder who wants durability drains `events()` into its own sink.
#[derive(Debug, Default)]
pub struct AuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }

    /// Snapshot of every event recorded so far, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}
