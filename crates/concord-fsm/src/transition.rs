use concord_types::LocalState;

/// A plugin hook due as a side effect of a transition. The FSM only names
/// which hook is due; invoking it (and tolerating its failure) is the
/// synchronizer's job, keeping `next` a pure function with no reference back
/// into the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    OnJoiningCluster,
    OnNewClusterConfigReady,
    OnStableCluster,
    OnLeavingCluster,
}

/// Result of consulting the FSM for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No peer has reached the acknowledgement level this state is waiting
    /// on; the synchronizer should loop back to watching.
    NoChange,
    /// Advance `self` to `to`, invoking `hook` (if any) before the write.
    Advance {
        to: LocalState,
        hook: Option<Hook>,
    },
}

impl Transition {
    /// Whether this transition is the terminal instruction to remove `self`
    /// from the view (spec §4.3, "From `FINISHED`: emit `DELETE_ME`").
    pub fn is_delete_me(&self) -> bool {
        matches!(
            self,
            Transition::Advance {
                to: LocalState::DeleteMe,
                ..
            }
        )
    }
}
