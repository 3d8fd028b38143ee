use serde::{Deserialize, Serialize};

/// Raw YAML representation of a coordinator config file.
#[derive(Debug, Deserialize, Serialize)]
pub struct RawConfig {
    pub self_identity: String,
    #[serde(default = "default_backend_choice")]
    pub backend_choice: String,
    pub backend_endpoint: String,
    #[serde(default)]
    pub force_leave: bool,
}

fn default_backend_choice() -> String {
    "etcd".to_string()
}
