use std::collections::BTreeSet;

use async_trait::async_trait;
use concord_types::ClusterView;
use tracing::debug;

use crate::error::PluginError;
use crate::plugin::Plugin;

/// A plugin that performs no data-plane I/O. Logs each hook invocation and
/// reports success.
///
/// Used by the CLI when no concrete plugin is configured, and in tests where
/// only FSM/synchronizer behavior is under test.
#[derive(Debug, Clone)]
pub struct NullPlugin {
    key: String,
    should_join: bool,
}

impl NullPlugin {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            should_join: true,
        }
    }

    pub fn monitor_only(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            should_join: false,
        }
    }
}

#[async_trait]
impl Plugin for NullPlugin {
    fn key(&self) -> &str {
        &self.key
    }

    fn should_be_in_cluster(&self) -> bool {
        self.should_join
    }

    fn files(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    async fn on_joining_cluster(&self, _view: &ClusterView) -> Result<(), PluginError> {
        debug!(key = %self.key, "NullPlugin: on_joining_cluster");
        Ok(())
    }

    async fn on_new_cluster_config_ready(&self, _view: &ClusterView) -> Result<(), PluginError> {
        debug!(key = %self.key, "NullPlugin: on_new_cluster_config_ready");
        Ok(())
    }

    async fn on_stable_cluster(&self, _view: &ClusterView) -> Result<(), PluginError> {
        debug!(key = %self.key, "NullPlugin: on_stable_cluster");
        Ok(())
    }

    async fn on_leaving_cluster(&self, _view: &ClusterView) -> Result<(), PluginError> {
        debug!(key = %self.key, "NullPlugin: on_leaving_cluster");
        Ok(())
    }

    async fn on_leaving_cluster_finished(&self, _view: &ClusterView) -> Result<(), PluginError> {
        debug!(key = %self.key, "NullPlugin: on_leaving_cluster_finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hooks_are_infallible_no_ops() {
        let plugin = NullPlugin::new("svc/a");
        let view = ClusterView::new();
        assert!(plugin.on_joining_cluster(&view).await.is_ok());
        assert!(plugin.on_new_cluster_config_ready(&view).await.is_ok());
        assert!(plugin.on_stable_cluster(&view).await.is_ok());
        assert!(plugin.on_leaving_cluster(&view).await.is_ok());
        assert!(plugin.on_leaving_cluster_finished(&view).await.is_ok());
    }

    #[test]
    fn monitor_only_should_not_join() {
        let plugin = NullPlugin::monitor_only("svc/b");
        assert!(!plugin.should_be_in_cluster());
    }
}
