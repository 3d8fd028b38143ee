use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

// ── Identity ─────────────────────────────────────────────────────────────────

/// A peer's stable identity in the cluster view (IP-address-sized string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(s: impl Into<String>) -> Self {
        Identity(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity::new(s)
    }
}

// ── Local state alphabet (spec §4.3) ──────────────────────────────────────────

/// One peer's position in the clustering lifecycle.
///
/// `Absent` never appears on the wire — it's the sentinel returned by
/// [`crate::LocalState::from_label`]-consuming callers when `self` has no
/// entry in the view. `DeleteMe` never appears on the wire either — it's an
/// FSM-internal instruction to remove `self` from the view, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalState {
    Absent,
    WaitingToJoin,
    JoiningAcknowledgedChange,
    JoiningConfigChanged,
    NormalAcknowledgedChange,
    NormalConfigChanged,
    Normal,
    WaitingToLeave,
    LeavingAcknowledgedChange,
    LeavingConfigChanged,
    Finished,
    Error,
    DeleteMe,
}

impl LocalState {
    /// The canonical wire label, or `None` for the two states that must never
    /// be serialized (`Absent`, `DeleteMe`).
    pub fn label(&self) -> Option<&'static str> {
        match self {
            LocalState::Absent | LocalState::DeleteMe => None,
            LocalState::WaitingToJoin => Some("WAITING_TO_JOIN"),
            LocalState::JoiningAcknowledgedChange => Some("JOINING_ACKNOWLEDGED_CHANGE"),
            LocalState::JoiningConfigChanged => Some("JOINING_CONFIG_CHANGED"),
            LocalState::NormalAcknowledgedChange => Some("NORMAL_ACKNOWLEDGED_CHANGE"),
            LocalState::NormalConfigChanged => Some("NORMAL_CONFIG_CHANGED"),
            LocalState::Normal => Some("NORMAL"),
            LocalState::WaitingToLeave => Some("WAITING_TO_LEAVE"),
            LocalState::LeavingAcknowledgedChange => Some("LEAVING_ACKNOWLEDGED_CHANGE"),
            LocalState::LeavingConfigChanged => Some("LEAVING_CONFIG_CHANGED"),
            LocalState::Finished => Some("FINISHED"),
            LocalState::Error => Some("ERROR"),
        }
    }

    pub fn is_joining(&self) -> bool {
        matches!(
            self,
            LocalState::WaitingToJoin
                | LocalState::JoiningAcknowledgedChange
                | LocalState::JoiningConfigChanged
        )
    }

    pub fn is_leaving(&self) -> bool {
        matches!(
            self,
            LocalState::WaitingToLeave
                | LocalState::LeavingAcknowledgedChange
                | LocalState::LeavingConfigChanged
                | LocalState::Finished
        )
    }
}

impl FromStr for LocalState {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "WAITING_TO_JOIN" => LocalState::WaitingToJoin,
            "JOINING_ACKNOWLEDGED_CHANGE" => LocalState::JoiningAcknowledgedChange,
            "JOINING_CONFIG_CHANGED" => LocalState::JoiningConfigChanged,
            "NORMAL_ACKNOWLEDGED_CHANGE" => LocalState::NormalAcknowledgedChange,
            "NORMAL_CONFIG_CHANGED" => LocalState::NormalConfigChanged,
            "NORMAL" => LocalState::Normal,
            "WAITING_TO_LEAVE" => LocalState::WaitingToLeave,
            "LEAVING_ACKNOWLEDGED_CHANGE" => LocalState::LeavingAcknowledgedChange,
            "LEAVING_CONFIG_CHANGED" => LocalState::LeavingConfigChanged,
            "FINISHED" => LocalState::Finished,
            "ERROR" => LocalState::Error,
            other => return Err(TypesError::UnknownLocalState(other.to_string())),
        })
    }
}

impl std::fmt::Display for LocalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.label() {
            Some(label) => write!(f, "{label}"),
            None => write!(f, "{self:?}"),
        }
    }
}

impl Serialize for LocalState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.label() {
            Some(label) => serializer.serialize_str(label),
            None => Err(serde::ser::Error::custom(format!(
                "{self:?} must never be serialized onto the wire"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for LocalState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        LocalState::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ── Cluster state (derived, spec §4.2) ────────────────────────────────────────

/// Summary label over the whole view, computed by [`crate::cluster_state`]-style
/// rules. Never stored — always re-derived from the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterState {
    Stable,
    UnstableError,
    Joining,
    Leaving,
    Reconfiguring,
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ClusterState::Stable => "STABLE",
            ClusterState::UnstableError => "UNSTABLE_ERROR",
            ClusterState::Joining => "JOINING",
            ClusterState::Leaving => "LEAVING",
            ClusterState::Reconfiguring => "RECONFIGURING",
        };
        write!(f, "{label}")
    }
}

/// The cluster view: a mapping from peer identity to that peer's local state.
/// A `BTreeMap` (not `HashMap`) so serialization is byte-stable, matching the
/// data model's "stable JSON object" requirement (spec §3).
pub type ClusterView = BTreeMap<Identity, LocalState>;

#[cfg(test)]
mod roundtrip_tests {
    use super::*;

    #[test]
    fn local_state_label_roundtrips() {
        for label in [
            "WAITING_TO_JOIN",
            "JOINING_ACKNOWLEDGED_CHANGE",
            "JOINING_CONFIG_CHANGED",
            "NORMAL_ACKNOWLEDGED_CHANGE",
            "NORMAL_CONFIG_CHANGED",
            "NORMAL",
            "WAITING_TO_LEAVE",
            "LEAVING_ACKNOWLEDGED_CHANGE",
            "LEAVING_CONFIG_CHANGED",
            "FINISHED",
            "ERROR",
        ] {
            let state: LocalState = label.parse().unwrap();
            assert_eq!(state.label(), Some(label));
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!("BOGUS".parse::<LocalState>().is_err());
    }

    #[test]
    fn absent_and_delete_me_never_serialize() {
        assert!(serde_json::to_string(&LocalState::Absent).is_err());
        assert!(serde_json::to_string(&LocalState::DeleteMe).is_err());
    }
}
