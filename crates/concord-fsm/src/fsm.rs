use concord_types::{ClusterState, ClusterView, LocalState};

use crate::transition::{Hook, Transition};

/// Pure decision function: given `self`'s current state, the derived cluster
/// state, and the whole observed view, decide the next local state (spec
/// §4.3).
///
/// Every transition is conditioned on the whole cluster having reached a
/// matching acknowledgement level — every step waits for all peers to catch
/// up before the initiator moves on. Never skips a state: the returned `to`
/// is always the state immediately following `local` in the lifecycle.
pub fn next(local: LocalState, cluster: ClusterState, view: &ClusterView) -> Transition {
    next_with_intent(local, cluster, view, false)
}

/// As [`next`], but also considers whether the plugin wishes to join at all
/// (only consulted from `Absent`).
pub fn next_with_intent(
    local: LocalState,
    cluster: ClusterState,
    view: &ClusterView,
    wants_to_join: bool,
) -> Transition {
    if local == LocalState::Normal && cluster == ClusterState::Stable {
        return Transition::NoChange;
    }

    match local {
        LocalState::Absent => {
            if wants_to_join {
                advance(LocalState::WaitingToJoin, None)
            } else {
                Transition::NoChange
            }
        }

        LocalState::WaitingToJoin => {
            if any_peer_is(view, LocalState::JoiningAcknowledgedChange) {
                Transition::NoChange
            } else {
                advance(LocalState::JoiningAcknowledgedChange, None)
            }
        }

        LocalState::JoiningAcknowledgedChange => {
            // `WaitingToJoin` belongs in the allowed set too: a concurrent
            // joiner can still be waiting its turn behind `self` (the
            // serialization rule at `WaitingToJoin` guarantees it only
            // reaches `JoiningAcknowledgedChange` after `self` has moved on),
            // so excluding it would deadlock simultaneous joins (S2).
            if all_peers_in(
                view,
                &[
                    LocalState::WaitingToJoin,
                    LocalState::JoiningAcknowledgedChange,
                    LocalState::JoiningConfigChanged,
                    LocalState::NormalAcknowledgedChange,
                    LocalState::NormalConfigChanged,
                    LocalState::Normal,
                ],
            ) {
                advance(LocalState::JoiningConfigChanged, Some(Hook::OnJoiningCluster))
            } else {
                Transition::NoChange
            }
        }

        LocalState::JoiningConfigChanged => {
            if all_peers_in(
                view,
                &[
                    LocalState::JoiningConfigChanged,
                    LocalState::NormalAcknowledgedChange,
                    LocalState::NormalConfigChanged,
                    LocalState::Normal,
                ],
            ) {
                advance(
                    LocalState::NormalConfigChanged,
                    Some(Hook::OnNewClusterConfigReady),
                )
            } else {
                Transition::NoChange
            }
        }

        LocalState::NormalConfigChanged => {
            if all_peers_in(view, &[LocalState::NormalConfigChanged, LocalState::Normal]) {
                advance(LocalState::Normal, Some(Hook::OnStableCluster))
            } else {
                Transition::NoChange
            }
        }

        LocalState::Normal => {
            if any_peer_is(view, LocalState::WaitingToJoin) || any_peer_is(view, LocalState::WaitingToLeave) {
                advance(LocalState::NormalAcknowledgedChange, None)
            } else {
                Transition::NoChange
            }
        }

        LocalState::NormalAcknowledgedChange => {
            let no_one_waiting = view.values().all(|s| {
                !matches!(s, LocalState::WaitingToJoin | LocalState::WaitingToLeave)
            });
            if no_one_waiting {
                advance(
                    LocalState::NormalConfigChanged,
                    Some(Hook::OnNewClusterConfigReady),
                )
            } else {
                Transition::NoChange
            }
        }

        LocalState::WaitingToLeave => {
            if any_peer_is(view, LocalState::LeavingAcknowledgedChange) {
                Transition::NoChange
            } else {
                advance(LocalState::LeavingAcknowledgedChange, None)
            }
        }

        LocalState::LeavingAcknowledgedChange => {
            // Symmetric with `JoiningAcknowledgedChange`: `WaitingToLeave`
            // must be allowed or two concurrent leaves deadlock the same way.
            if all_peers_in(
                view,
                &[
                    LocalState::WaitingToLeave,
                    LocalState::LeavingAcknowledgedChange,
                    LocalState::LeavingConfigChanged,
                    LocalState::NormalAcknowledgedChange,
                    LocalState::NormalConfigChanged,
                    LocalState::Normal,
                ],
            ) {
                advance(LocalState::LeavingConfigChanged, None)
            } else {
                Transition::NoChange
            }
        }

        LocalState::LeavingConfigChanged => {
            if all_peers_in(
                view,
                &[
                    LocalState::LeavingConfigChanged,
                    LocalState::NormalAcknowledgedChange,
                    LocalState::NormalConfigChanged,
                    LocalState::Normal,
                ],
            ) {
                advance(LocalState::Finished, Some(Hook::OnLeavingCluster))
            } else {
                Transition::NoChange
            }
        }

        LocalState::Finished => advance(LocalState::DeleteMe, None),

        // Terminal: the synchronizer CASes `self -> Error` directly and stops
        // consulting the FSM; `next` never moves a node out of `Error`.
        LocalState::Error => Transition::NoChange,

        // Never observed as `local` — `DeleteMe` is an instruction, not a
        // state a peer can be read back as.
        LocalState::DeleteMe => Transition::NoChange,
    }
}

fn advance(to: LocalState, hook: Option<Hook>) -> Transition {
    Transition::Advance { to, hook }
}

fn any_peer_is(view: &ClusterView, state: LocalState) -> bool {
    view.values().any(|s| *s == state)
}

fn all_peers_in(view: &ClusterView, allowed: &[LocalState]) -> bool {
    view.values().all(|s| allowed.contains(s))
}

#[cfg(test)]
mod tests {
    use concord_types::Identity;

    use super::*;

    fn view(pairs: &[(&str, LocalState)]) -> ClusterView {
        pairs
            .iter()
            .map(|(id, s)| (Identity::new(*id), *s))
            .collect()
    }

    #[test]
    fn absent_joins_only_if_plugin_wants_it() {
        let v = view(&[]);
        assert_eq!(
            next_with_intent(LocalState::Absent, ClusterState::Stable, &v, false),
            Transition::NoChange
        );
        assert_eq!(
            next_with_intent(LocalState::Absent, ClusterState::Stable, &v, true),
            advance(LocalState::WaitingToJoin, None)
        );
    }

    #[test]
    fn waiting_to_join_serializes_against_concurrent_joiner() {
        let v = view(&[("b", LocalState::JoiningAcknowledgedChange)]);
        assert_eq!(
            next(LocalState::WaitingToJoin, ClusterState::Joining, &v),
            Transition::NoChange
        );

        let v2 = view(&[("b", LocalState::Normal)]);
        assert_eq!(
            next(LocalState::WaitingToJoin, ClusterState::Joining, &v2),
            advance(LocalState::JoiningAcknowledgedChange, None)
        );
    }

    #[test]
    fn joining_acknowledged_change_waits_for_all_peers_then_fires_hook() {
        // A peer stuck in `Error` is outside the allowed set and blocks
        // advancement — unlike a concurrently joining `WaitingToJoin` peer,
        // which is allowed (see `concurrent_joiners_do_not_deadlock`).
        let v = view(&[
            ("a", LocalState::JoiningAcknowledgedChange),
            ("b", LocalState::Error),
        ]);
        assert_eq!(
            next(LocalState::JoiningAcknowledgedChange, ClusterState::UnstableError, &v),
            Transition::NoChange
        );

        let v2 = view(&[
            ("a", LocalState::JoiningAcknowledgedChange),
            ("b", LocalState::Normal),
        ]);
        assert_eq!(
            next(LocalState::JoiningAcknowledgedChange, ClusterState::Joining, &v2),
            advance(LocalState::JoiningConfigChanged, Some(Hook::OnJoiningCluster))
        );
    }

    #[test]
    fn single_node_join_reaches_normal_with_s1_hook_sequence() {
        let mut v = view(&[("a", LocalState::JoiningAcknowledgedChange)]);

        let t1 = next(LocalState::JoiningAcknowledgedChange, ClusterState::Joining, &v);
        assert_eq!(t1, advance(LocalState::JoiningConfigChanged, Some(Hook::OnJoiningCluster)));
        v.insert(Identity::new("a"), LocalState::JoiningConfigChanged);

        let t2 = next(LocalState::JoiningConfigChanged, ClusterState::Joining, &v);
        assert_eq!(
            t2,
            advance(LocalState::NormalConfigChanged, Some(Hook::OnNewClusterConfigReady))
        );
        v.insert(Identity::new("a"), LocalState::NormalConfigChanged);

        let t3 = next(LocalState::NormalConfigChanged, ClusterState::Reconfiguring, &v);
        assert_eq!(t3, advance(LocalState::Normal, Some(Hook::OnStableCluster)));
    }

    /// S2 (§8): two nodes joining simultaneously must not deadlock once one
    /// of them reaches `JoiningAcknowledgedChange` while the other is still
    /// `WaitingToJoin`.
    #[test]
    fn concurrent_joiners_do_not_deadlock() {
        let v = view(&[
            ("a", LocalState::JoiningAcknowledgedChange),
            ("b", LocalState::WaitingToJoin),
        ]);
        assert_eq!(
            next(LocalState::JoiningAcknowledgedChange, ClusterState::Joining, &v),
            advance(LocalState::JoiningConfigChanged, Some(Hook::OnJoiningCluster))
        );
    }

    /// Symmetric case for concurrent leaves.
    #[test]
    fn concurrent_leavers_do_not_deadlock() {
        let v = view(&[
            ("a", LocalState::LeavingAcknowledgedChange),
            ("b", LocalState::WaitingToLeave),
        ]);
        assert_eq!(
            next(LocalState::LeavingAcknowledgedChange, ClusterState::Leaving, &v),
            advance(LocalState::LeavingConfigChanged, None)
        );
    }

    #[test]
    fn normal_acknowledges_waiting_peer_then_converges() {
        let v = view(&[
            ("a", LocalState::Normal),
            ("b", LocalState::WaitingToJoin),
        ]);
        assert_eq!(
            next(LocalState::Normal, ClusterState::Joining, &v),
            advance(LocalState::NormalAcknowledgedChange, None)
        );

        let v2 = view(&[
            ("a", LocalState::NormalAcknowledgedChange),
            ("b", LocalState::JoiningAcknowledgedChange),
        ]);
        assert_eq!(
            next(LocalState::NormalAcknowledgedChange, ClusterState::Joining, &v2),
            Transition::NoChange
        );

        let v3 = view(&[
            ("a", LocalState::NormalAcknowledgedChange),
            ("b", LocalState::Normal),
        ]);
        assert_eq!(
            next(LocalState::NormalAcknowledgedChange, ClusterState::Stable, &v3),
            advance(LocalState::NormalConfigChanged, Some(Hook::OnNewClusterConfigReady))
        );
    }

    #[test]
    fn stable_cluster_is_a_fast_path_no_change() {
        let v = view(&[("a", LocalState::Normal), ("b", LocalState::Normal)]);
        assert_eq!(
            next(LocalState::Normal, ClusterState::Stable, &v),
            Transition::NoChange
        );
    }

    #[test]
    fn leaving_mirrors_joining_serialization_and_hook() {
        let v = view(&[("b", LocalState::LeavingAcknowledgedChange)]);
        assert_eq!(
            next(LocalState::WaitingToLeave, ClusterState::Leaving, &v),
            Transition::NoChange
        );

        let v2 = view(&[("b", LocalState::Normal)]);
        assert_eq!(
            next(LocalState::WaitingToLeave, ClusterState::Leaving, &v2),
            advance(LocalState::LeavingAcknowledgedChange, None)
        );

        let v3 = view(&[
            ("a", LocalState::LeavingConfigChanged),
            ("b", LocalState::Normal),
        ]);
        assert_eq!(
            next(LocalState::LeavingConfigChanged, ClusterState::Leaving, &v3),
            advance(LocalState::Finished, Some(Hook::OnLeavingCluster))
        );
    }

    #[test]
    fn finished_emits_delete_me() {
        let v = view(&[]);
        let t = next(LocalState::Finished, ClusterState::Leaving, &v);
        assert!(t.is_delete_me());
    }

    #[test]
    fn error_is_terminal_within_the_fsm() {
        let v = view(&[]);
        assert_eq!(
            next(LocalState::Error, ClusterState::UnstableError, &v),
            Transition::NoChange
        );
    }

    /// Property 2 (§8): no skipping. Every `Advance` target is the immediate
    /// successor of `local` in the lifecycle, never further.
    #[test]
    fn no_skipping_property_over_every_local_state() {
        let all_joined = view(&[
            ("a", LocalState::Normal),
            ("b", LocalState::Normal),
            ("c", LocalState::Normal),
        ]);
        let cases = [
            (LocalState::WaitingToJoin, LocalState::JoiningAcknowledgedChange),
            (LocalState::JoiningAcknowledgedChange, LocalState::JoiningConfigChanged),
            (LocalState::JoiningConfigChanged, LocalState::NormalConfigChanged),
            (LocalState::NormalConfigChanged, LocalState::Normal),
            (LocalState::WaitingToLeave, LocalState::LeavingAcknowledgedChange),
            (LocalState::LeavingAcknowledgedChange, LocalState::LeavingConfigChanged),
            (LocalState::LeavingConfigChanged, LocalState::Finished),
            (LocalState::Finished, LocalState::DeleteMe),
        ];
        for (from, expected_to) in cases {
            match next(from, ClusterState::Reconfiguring, &all_joined) {
                Transition::Advance { to, .. } => assert_eq!(to, expected_to, "from {from:?}"),
                Transition::NoChange => panic!("expected advance from {from:?}"),
            }
        }
    }
}
