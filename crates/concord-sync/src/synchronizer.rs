use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use concord_backend::{Backend, CancellationToken, Cas, Version};
use concord_cluster::ClusterInfo;
use concord_fsm::{next_with_intent, Hook, Transition};
use concord_plugin::Plugin;
use concord_types::{ClusterView, Identity, LocalState};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog};
use crate::backoff::{PAUSE_ON_EXCEPTION, PAUSE_ON_MISSING_KEY};
use crate::error::SyncError;
use concord_backend::BackendError;

const MAX_CONTENDED_RETRIES: usize = 3;

/// Outcome of one write attempt: either the loop keeps running — carrying the
/// view and CAS cursor it now knows to be current, or `None` to force a full
/// re-read next cycle after a transient failure — or `self` has left the view
/// and the loop should exit.
enum ApplyOutcome {
    Continue(Option<(ClusterView, Version)>),
    Exited,
}

/// One plugin's long-running membership loop: watch, decide, CAS-write,
/// invoke plugin hooks, repeat (spec §4.4).
///
/// Owns no mutable state beyond the CAS cursor (`last_version`) and the flags
/// shared with its [`SynchronizerHandle`]. Runs until the FSM emits
/// `DELETE_ME` (after it has been applied) or `terminate()` is called.
pub struct Synchronizer {
    backend: Arc<dyn Backend>,
    plugin: Arc<dyn Plugin>,
    self_id: Identity,
    force_leave: bool,
    leaving_requested: Arc<AtomicBool>,
    terminate: Arc<AtomicBool>,
    cancel: CancellationToken,
    audit: AuditLog,
}

/// Lightweight, cloneable handle used to deliver external commands
/// (`leave_cluster`, `mark_node_failed`, `terminate`) from another task
/// without sharing the loop's mutable state directly (spec §5).
#[derive(Clone)]
pub struct SynchronizerHandle {
    backend: Arc<dyn Backend>,
    key: String,
    self_id: Identity,
    force_leave: bool,
    should_be_in_cluster: bool,
    leaving_requested: Arc<AtomicBool>,
    terminate: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Synchronizer {
    pub fn new(
        backend: Arc<dyn Backend>,
        plugin: Arc<dyn Plugin>,
        self_id: Identity,
        force_leave: bool,
    ) -> (Self, SynchronizerHandle) {
        let leaving_requested = Arc::new(AtomicBool::new(false));
        let terminate = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let handle = SynchronizerHandle {
            backend: backend.clone(),
            key: plugin.key().to_string(),
            self_id: self_id.clone(),
            force_leave,
            should_be_in_cluster: plugin.should_be_in_cluster(),
            leaving_requested: leaving_requested.clone(),
            terminate: terminate.clone(),
            cancel: cancel.clone(),
        };

        let sync = Self {
            backend,
            plugin,
            self_id,
            force_leave,
            leaving_requested,
            terminate,
            cancel,
            audit: AuditLog::new(),
        };

        (sync, handle)
    }

    fn key(&self) -> &str {
        self.plugin.key()
    }

    /// Observability log of transitions this loop has applied. No mandated
    /// persistence; an embedder drains it into its own sink.
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Runs the main cycle until `DELETE_ME` has been applied or
    /// `terminate()` fires. Never returns an error for conditions the loop
    /// can recover from internally — only document-codec bugs surface.
    pub async fn run(&self) -> Result<(), SyncError> {
        // `None` means "go fetch a fresh view"; `Some` means "we already know
        // this view is current, decide against it without a network round
        // trip". A successful write moves straight back into `Some` with the
        // view it just produced, since our own write can unblock our own next
        // transition (a lone node converging to NORMAL never hears from a
        // peer) — only a `NoChange` decision falls back to `watch`.
        let mut current: Option<(ClusterInfo, Version)> = None;

        loop {
            if self.terminate.load(Ordering::Relaxed) {
                info!(key = %self.key(), "terminate requested, exiting synchronizer loop");
                return Ok(());
            }

            let (info, version) = match current.take() {
                Some(pair) => pair,
                None => match self.backend.read(self.key()).await {
                    Ok((raw, version)) => (ClusterInfo::from_document(Some(&raw)), version),
                    Err(BackendError::KeyMissing) => {
                        self.bootstrap_if_absent().await?;
                        tokio::time::sleep(PAUSE_ON_MISSING_KEY).await;
                        continue;
                    }
                    Err(BackendError::Transient(e)) => {
                        warn!(key = %self.key(), error = %e, "transient backend error, backing off");
                        tokio::time::sleep(PAUSE_ON_EXCEPTION).await;
                        continue;
                    }
                    Err(e) => {
                        warn!(key = %self.key(), error = %e, "unexpected backend error, backing off");
                        tokio::time::sleep(PAUSE_ON_EXCEPTION).await;
                        continue;
                    }
                },
            };

            if self.terminate.load(Ordering::Relaxed) {
                return Ok(());
            }

            let local = info.local_state(&self.self_id);

            let Some(transition) = self.decide(&info, local) else {
                match self.backend.watch(self.key(), version, &self.cancel).await {
                    Ok((raw, new_version)) => {
                        current = Some((ClusterInfo::from_document(Some(&raw)), new_version));
                    }
                    Err(BackendError::Cancelled) => {}
                    Err(BackendError::KeyMissing) => {
                        self.bootstrap_if_absent().await?;
                        tokio::time::sleep(PAUSE_ON_MISSING_KEY).await;
                    }
                    Err(BackendError::Transient(e)) => {
                        warn!(key = %self.key(), error = %e, "transient backend error watching, backing off");
                        tokio::time::sleep(PAUSE_ON_EXCEPTION).await;
                    }
                    Err(e) => {
                        warn!(key = %self.key(), error = %e, "unexpected backend error watching, backing off");
                        tokio::time::sleep(PAUSE_ON_EXCEPTION).await;
                    }
                }
                continue;
            };

            match self.apply(&info, local, transition, version).await? {
                ApplyOutcome::Continue(Some((view, version))) => {
                    current = Some((ClusterInfo::from(view), version));
                }
                ApplyOutcome::Continue(None) => current = None,
                ApplyOutcome::Exited => return Ok(()),
            }
        }
    }

    fn decide(&self, info: &ClusterInfo, local: LocalState) -> Option<Transition> {
        if self.leaving_requested.load(Ordering::Relaxed)
            && local != LocalState::WaitingToLeave
            && info.can_leave(self.force_leave)
        {
            return Some(Transition::Advance {
                to: LocalState::WaitingToLeave,
                hook: None,
            });
        }

        let wants_to_join = self.plugin.should_be_in_cluster();
        let cluster = info.cluster_state();
        match next_with_intent(local, cluster, info.view(), wants_to_join) {
            Transition::NoChange => None,
            advance => Some(advance),
        }
    }

    /// Apply `transition` with CAS precondition `version`, invoking the due
    /// hook first.
    async fn apply(
        &self,
        info: &ClusterInfo,
        local: LocalState,
        transition: Transition,
        version: Version,
    ) -> Result<ApplyOutcome, SyncError> {
        if let Transition::Advance { hook: Some(hook), .. } = transition {
            self.invoke_hook(hook, info.view()).await;
        }

        let target_view = Self::apply_transition(info.view(), &self.self_id, transition);
        let doc = ClusterInfo::from(target_view.clone()).to_document()?;

        match self.backend.write(self.key(), &doc, Cas::Version(version)).await {
            Ok(new_version) => {
                if matches!(
                    transition,
                    Transition::Advance { to: LocalState::WaitingToLeave, .. }
                ) {
                    self.leaving_requested.store(false, Ordering::Relaxed);
                }
                if transition.is_delete_me() {
                    self.plugin
                        .on_leaving_cluster_finished(&target_view)
                        .await
                        .unwrap_or_else(|e| warn!(key = %self.key(), error = %e, "on_leaving_cluster_finished failed"));
                    self.audit.record(AuditEvent::LeftCluster {
                        id: Uuid::new_v4(),
                        at: chrono::Utc::now(),
                        self_id: self.self_id.clone(),
                    });
                    return Ok(ApplyOutcome::Exited);
                }
                if let Transition::Advance { to, .. } = transition {
                    self.audit.record(AuditEvent::TransitionApplied {
                        id: Uuid::new_v4(),
                        at: chrono::Utc::now(),
                        self_id: self.self_id.clone(),
                        to,
                    });
                }
                Ok(ApplyOutcome::Continue(Some((target_view, new_version))))
            }
            Err(BackendError::Contended) => {
                self.audit.record(AuditEvent::TransitionContended {
                    id: Uuid::new_v4(),
                    at: chrono::Utc::now(),
                    self_id: self.self_id.clone(),
                });
                self.retry_on_contention(local, transition).await
            }
            Err(BackendError::Transient(e)) => {
                warn!(key = %self.key(), error = %e, "transient error writing CAS, backing off");
                tokio::time::sleep(PAUSE_ON_EXCEPTION).await;
                Ok(ApplyOutcome::Continue(None))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Narrow CAS-contention retry (spec §4.4 step 7). Re-reads and
    /// re-validates the *full* view against the FSM rather than trusting
    /// that only unrelated peers changed — see the design notes on why the
    /// original's narrower check is unsafe.
    async fn retry_on_contention(
        &self,
        local: LocalState,
        transition: Transition,
    ) -> Result<ApplyOutcome, SyncError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let (raw, version) = match self.backend.read(self.key()).await {
                Ok(pair) => pair,
                Err(_) => return Ok(ApplyOutcome::Continue(None)),
            };
            let info = ClusterInfo::from_document(Some(&raw));
            let fresh_local = info.local_state(&self.self_id);

            if fresh_local != local {
                // Someone else already moved `self`'s own entry; our decision
                // no longer applies. Abandon this iteration, handing the
                // freshly read view back so the loop decides again with no
                // extra round trip.
                return Ok(ApplyOutcome::Continue(Some((info.view().clone(), version))));
            }

            let recomputed = self.decide(&info, fresh_local);
            if recomputed != Some(transition) {
                return Ok(ApplyOutcome::Continue(Some((info.view().clone(), version))));
            }

            if let Transition::Advance { hook: Some(hook), .. } = transition {
                self.invoke_hook(hook, info.view()).await;
            }
            let target_view = Self::apply_transition(info.view(), &self.self_id, transition);
            let doc = ClusterInfo::from(target_view.clone()).to_document()?;

            match self.backend.write(self.key(), &doc, Cas::Version(version)).await {
                Ok(new_version) => {
                    if transition.is_delete_me() {
                        self.plugin
                            .on_leaving_cluster_finished(&target_view)
                            .await
                            .unwrap_or_else(|e| warn!(error = %e, "on_leaving_cluster_finished failed"));
                        self.audit.record(AuditEvent::LeftCluster {
                            id: Uuid::new_v4(),
                            at: chrono::Utc::now(),
                            self_id: self.self_id.clone(),
                        });
                        return Ok(ApplyOutcome::Exited);
                    }
                    if let Transition::Advance { to, .. } = transition {
                        self.audit.record(AuditEvent::TransitionApplied {
                            id: Uuid::new_v4(),
                            at: chrono::Utc::now(),
                            self_id: self.self_id.clone(),
                            to,
                        });
                    }
                    return Ok(ApplyOutcome::Continue(Some((target_view, new_version))));
                }
                Err(BackendError::Contended) if attempts < MAX_CONTENDED_RETRIES => continue,
                Err(_) => return Ok(ApplyOutcome::Continue(None)),
            }
        }
    }

    fn apply_transition(view: &ClusterView, self_id: &Identity, transition: Transition) -> ClusterView {
        let mut view = view.clone();
        match transition {
            Transition::Advance { to: LocalState::DeleteMe, .. } => {
                view.remove(self_id);
            }
            Transition::Advance { to, .. } => {
                view.insert(self_id.clone(), to);
            }
            Transition::NoChange => {}
        }
        view
    }

    async fn invoke_hook(&self, hook: Hook, view: &ClusterView) {
        let result = match hook {
            Hook::OnJoiningCluster => self.plugin.on_joining_cluster(view).await,
            Hook::OnNewClusterConfigReady => self.plugin.on_new_cluster_config_ready(view).await,
            Hook::OnStableCluster => self.plugin.on_stable_cluster(view).await,
            Hook::OnLeavingCluster => self.plugin.on_leaving_cluster(view).await,
        };
        if let Err(e) = result {
            warn!(key = %self.key(), hook = ?hook, error = %e, "plugin hook failed, continuing");
        }
    }

    /// If the key genuinely doesn't exist and this plugin wants to join,
    /// create it with `self -> WAITING_TO_JOIN`. A losing race (someone else
    /// created it first) is reported as `Contended` and ignored; the next
    /// read picks up the real document.
    async fn bootstrap_if_absent(&self) -> Result<(), SyncError> {
        if !self.plugin.should_be_in_cluster() {
            return Ok(());
        }
        let mut view = ClusterView::new();
        view.insert(self.self_id.clone(), LocalState::WaitingToJoin);
        let doc = ClusterInfo::from(view).to_document()?;
        match self.backend.write(self.key(), &doc, Cas::CreateOnly).await {
            Ok(_) | Err(BackendError::Contended) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SynchronizerHandle {
    /// Request this node leave the cluster (spec §4.4 "External commands").
    /// Monitor-only plugins (`should_be_in_cluster() == false`) just stop.
    pub async fn leave_cluster(&self) -> Result<(), SyncError> {
        if !self.should_be_in_cluster {
            self.terminate.store(true, Ordering::Relaxed);
            self.cancel.cancel();
            return Ok(());
        }

        self.leaving_requested.store(true, Ordering::Relaxed);

        let (raw, version) = match self.backend.read(&self.key).await {
            Ok(pair) => pair,
            Err(BackendError::KeyMissing) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let info = ClusterInfo::from_document(Some(&raw));
        if !info.can_leave(self.force_leave) {
            return Ok(());
        }

        let mut view = info.view().clone();
        view.insert(self.self_id.clone(), LocalState::WaitingToLeave);
        let doc = ClusterInfo::from(view).to_document()?;

        match self.backend.write(&self.key, &doc, Cas::Version(version)).await {
            Ok(_) => {
                self.leaving_requested.store(false, Ordering::Relaxed);
                Ok(())
            }
            Err(BackendError::Contended) => Ok(()), // main loop will act on the flag
            Err(e) => Err(e.into()),
        }
    }

    /// Mark this node as failed (spec §4.4 "External commands").
    pub async fn mark_node_failed(&self) -> Result<(), SyncError> {
        let (raw, version) = match self.backend.read(&self.key).await {
            Ok(pair) => pair,
            Err(BackendError::KeyMissing) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let info = ClusterInfo::from_document(Some(&raw));
        let mut view = info.view().clone();
        view.insert(self.self_id.clone(), LocalState::Error);
        let doc = ClusterInfo::from(view).to_document()?;

        match self.backend.write(&self.key, &doc, Cas::Version(version)).await {
            Ok(_) => Ok(()),
            Err(BackendError::Contended) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Signal the loop to exit and wake any in-flight watch.
    pub fn terminate(&self) {
        self.terminate.store(true, Ordering::Relaxed);
        self.cancel.cancel();
    }
}
