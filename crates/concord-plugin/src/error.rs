use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin hook failed: {0}")]
    HookFailed(String),

    #[error("plugin fatally reported: {0}")]
    Fatal(String),
}
