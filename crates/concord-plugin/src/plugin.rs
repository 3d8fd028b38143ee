use std::collections::BTreeSet;

use async_trait::async_trait;
use concord_types::ClusterView;

use crate::error::PluginError;

/// External, data-plane-specific collaborator invoked by the synchronizer at
/// well-defined FSM edges (spec §4.5).
///
/// Hooks are best-effort: a failing hook is logged by the caller and never
/// aborts the FSM. Hooks must be idempotent, since a contended retry can
/// re-enter the same edge.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// The backend key this plugin coordinates on.
    fn key(&self) -> &str;

    /// Whether this node should join the cluster at all. A monitor-only
    /// plugin returns `false` and never transitions out of `Absent`.
    fn should_be_in_cluster(&self) -> bool;

    /// Paths this plugin owns, used by discovery to deduplicate overlapping
    /// plugin instances (spec §4.5, §6).
    fn files(&self) -> BTreeSet<String>;

    /// Invoked when every peer has acknowledged this node joining (edge
    /// `JoiningAcknowledgedChange -> JoiningConfigChanged`).
    async fn on_joining_cluster(&self, view: &ClusterView) -> Result<(), PluginError>;

    /// Invoked when every peer has acknowledged a configuration change (edge
    /// `NormalAcknowledgedChange -> NormalConfigChanged`).
    async fn on_new_cluster_config_ready(&self, view: &ClusterView) -> Result<(), PluginError>;

    /// Invoked once the node reaches `Normal` from `NormalConfigChanged` or
    /// `JoiningConfigChanged`.
    async fn on_stable_cluster(&self, view: &ClusterView) -> Result<(), PluginError>;

    /// Invoked when every peer has acknowledged this node leaving (edge
    /// `LeavingConfigChanged -> Finished`).
    async fn on_leaving_cluster(&self, view: &ClusterView) -> Result<(), PluginError>;

    /// Invoked after `self` has been removed from the view (edge `Finished
    /// -> DeleteMe` applied).
    async fn on_leaving_cluster_finished(&self, view: &ClusterView) -> Result<(), PluginError>;
}
