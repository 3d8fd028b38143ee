use std::path::Path;

use tracing::debug;

use crate::config::{self, Config};
use crate::error::ConfigError;
use crate::raw::RawConfig;

/// Load a coordinator config file (spec §6's "Configuration knobs").
///
/// Expected layout is a single YAML document:
/// ```yaml
/// self_identity: 10.0.0.12
/// backend_choice: etcd
/// backend_endpoint: http://etcd.internal:2379
/// force_leave: false
/// ```
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let raw: RawConfig = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;

    debug!(path = %path.display(), "loaded coordinator config");
    config::convert(raw, &path.display().to_string())
}
