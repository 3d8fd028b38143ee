use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use crate::plugin::Plugin;

/// Resolve a set of discovered plugins into the subset that should actually
/// run: sorted lexically by `key()`, with later plugins skipped when their
/// `files()` overlap an already-accepted plugin's (spec §4.5, §6).
pub fn resolve_plugins(mut plugins: Vec<Arc<dyn Plugin>>) -> Vec<Arc<dyn Plugin>> {
    plugins.sort_by(|a, b| a.key().cmp(b.key()));

    let mut claimed: BTreeSet<String> = BTreeSet::new();
    let mut accepted = Vec::with_capacity(plugins.len());

    for plugin in plugins {
        let files = plugin.files();
        if files.iter().any(|f| claimed.contains(f)) {
            warn!(key = %plugin.key(), "skipping plugin: files() overlap an already-accepted plugin");
            continue;
        }
        claimed.extend(files);
        accepted.push(plugin);
    }

    accepted
}
