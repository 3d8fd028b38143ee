use concord_types::{ClusterState, ClusterView, Identity, LocalState};
use tracing::warn;

use crate::error::ClusterError;

/// A decoded cluster view plus its derived summary state.
///
/// Constructed from whatever the backend returned for the plugin's key.
/// Tolerant by design: an empty/absent document, a malformed document, or an
/// unrecognized state label are all `ProtocolError`s at the taxonomy level
/// (spec §7) but never abort decoding here — they decode to an empty view so
/// the next successful write can heal the key.
#[derive(Debug, Clone, Default)]
pub struct ClusterInfo {
    view: ClusterView,
}

impl ClusterInfo {
    /// Decode a raw JSON document (or `None`/empty for an absent key) into a
    /// `ClusterInfo`. Never fails: a malformed document or unrecognized label
    /// is logged and treated as `{}` (spec §4.2, §7).
    pub fn from_document(raw: Option<&str>) -> Self {
        let raw = match raw {
            None => return Self::default(),
            Some(s) if s.trim().is_empty() => return Self::default(),
            Some(s) => s,
        };

        let parsed: Result<std::collections::BTreeMap<String, String>, _> =
            serde_json::from_str(raw);
        let labels = match parsed {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "malformed cluster view document, treating as empty");
                return Self::default();
            }
        };

        let mut view = ClusterView::new();
        for (id, label) in labels {
            match label.parse::<LocalState>() {
                Ok(state) => {
                    view.insert(Identity::new(id), state);
                }
                Err(e) => {
                    warn!(identity = %id, error = %e, "unknown state label, treating view as empty");
                    return Self::default();
                }
            }
        }
        Self { view }
    }

    pub fn view(&self) -> &ClusterView {
        &self.view
    }

    /// The state of `self` in the view, or `LocalState::Absent` if not present.
    pub fn local_state(&self, id: &Identity) -> LocalState {
        self.view.get(id).copied().unwrap_or(LocalState::Absent)
    }

    /// Derived summary label over the whole view (spec §4.2), evaluated
    /// top-to-bottom, first match wins.
    pub fn cluster_state(&self) -> ClusterState {
        if self.view.values().all(|s| matches!(s, LocalState::Normal)) && !self.view.is_empty() {
            return ClusterState::Stable;
        }
        if self.view.values().any(|s| matches!(s, LocalState::Error)) {
            return ClusterState::UnstableError;
        }
        if self.view.values().any(LocalState::is_joining) {
            return ClusterState::Joining;
        }
        if self.view.values().any(LocalState::is_leaving) {
            return ClusterState::Leaving;
        }
        if self.view.values().any(|s| {
            matches!(
                s,
                LocalState::NormalAcknowledgedChange | LocalState::NormalConfigChanged
            )
        }) {
            return ClusterState::Reconfiguring;
        }
        ClusterState::Stable
    }

    /// Whether a node is permitted to start leaving right now (spec §4.2):
    /// true iff the cluster is `Stable` or `UnstableError`, or `force` is set.
    pub fn can_leave(&self, force: bool) -> bool {
        force || matches!(
            self.cluster_state(),
            ClusterState::Stable | ClusterState::UnstableError
        )
    }

    /// Serialize the view back to the canonical JSON document form.
    /// `DELETE_ME` never reaches here — callers replace it with a view
    /// mutation before serializing.
    pub fn to_document(&self) -> Result<String, ClusterError> {
        Ok(serde_json::to_string(&self.view)?)
    }
}

impl From<ClusterView> for ClusterInfo {
    fn from(view: ClusterView) -> Self {
        Self { view }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::new(s)
    }

    #[test]
    fn absent_document_is_empty_view() {
        let info = ClusterInfo::from_document(None);
        assert!(info.view().is_empty());
        assert_eq!(info.local_state(&id("a")), LocalState::Absent);
    }

    #[test]
    fn malformed_document_treated_as_empty() {
        let info = ClusterInfo::from_document(Some("not json"));
        assert!(info.view().is_empty());
    }

    #[test]
    fn unknown_label_treated_as_empty() {
        let info = ClusterInfo::from_document(Some(r#"{"a": "BOGUS"}"#));
        assert!(info.view().is_empty());
    }

    #[test]
    fn all_normal_is_stable() {
        let info = ClusterInfo::from_document(Some(r#"{"a": "NORMAL", "b": "NORMAL"}"#));
        assert_eq!(info.cluster_state(), ClusterState::Stable);
    }

    #[test]
    fn empty_view_is_stable() {
        let info = ClusterInfo::from_document(Some("{}"));
        assert_eq!(info.cluster_state(), ClusterState::Stable);
    }

    #[test]
    fn any_error_is_unstable_error_even_with_joining() {
        let info = ClusterInfo::from_document(Some(
            r#"{"a": "ERROR", "b": "WAITING_TO_JOIN"}"#,
        ));
        assert_eq!(info.cluster_state(), ClusterState::UnstableError);
    }

    #[test]
    fn joining_beats_leaving_and_reconfiguring() {
        let info = ClusterInfo::from_document(Some(
            r#"{"a": "WAITING_TO_JOIN", "b": "WAITING_TO_LEAVE", "c": "NORMAL_CONFIG_CHANGED"}"#,
        ));
        assert_eq!(info.cluster_state(), ClusterState::Joining);
    }

    #[test]
    fn leaving_beats_reconfiguring() {
        let info = ClusterInfo::from_document(Some(
            r#"{"a": "WAITING_TO_LEAVE", "b": "NORMAL_CONFIG_CHANGED"}"#,
        ));
        assert_eq!(info.cluster_state(), ClusterState::Leaving);
    }

    #[test]
    fn reconfiguring_when_only_ack_or_config_changed() {
        let info = ClusterInfo::from_document(Some(
            r#"{"a": "NORMAL", "b": "NORMAL_ACKNOWLEDGED_CHANGE"}"#,
        ));
        assert_eq!(info.cluster_state(), ClusterState::Reconfiguring);
    }

    #[test]
    fn can_leave_gated_by_stability() {
        let stable = ClusterInfo::from_document(Some(r#"{"a": "NORMAL"}"#));
        assert!(stable.can_leave(false));

        let joining = ClusterInfo::from_document(Some(r#"{"a": "WAITING_TO_JOIN"}"#));
        assert!(!joining.can_leave(false));
        assert!(joining.can_leave(true));

        let error_state = ClusterInfo::from_document(Some(r#"{"a": "ERROR"}"#));
        assert!(error_state.can_leave(false));
    }

    #[test]
    fn to_document_round_trips() {
        let info = ClusterInfo::from_document(Some(r#"{"a": "NORMAL"}"#));
        let doc = info.to_document().unwrap();
        let reparsed = ClusterInfo::from_document(Some(&doc));
        assert_eq!(reparsed.local_state(&id("a")), LocalState::Normal);
    }
}
