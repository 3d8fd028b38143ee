pub mod discovery;
pub mod error;
pub mod null;
pub mod plugin;

pub use discovery::resolve_plugins;
pub use error::PluginError;
pub use null::NullPlugin;
pub use plugin::Plugin;
