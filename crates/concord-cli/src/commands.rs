use std::sync::Arc;

use anyhow::{Context, Result};
use concord_backend::{Backend, ConsulBackend, EtcdBackend};
use concord_config::{BackendChoice, Config};
use concord_plugin::NullPlugin;
use concord_sync::Synchronizer;
use tracing::info;

use crate::cli::Cli;

/// Load config, wire up a backend and the built-in no-op plugin, and run the
/// synchronizer loop until it exits (spec §4.4) or the process is killed.
///
/// Signal wiring (SIGTERM/SIGQUIT -> `terminate`/`leave_cluster`) is an
/// external collaborator's job, not the CLI's — an embedder that wants
/// graceful shutdown holds on to the `SynchronizerHandle` this function
/// discards and wires its own signal handler around it.
pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => concord_config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?
            .apply_env_overrides()
            .context("applying CONCORD_* environment overrides")?,
        None => Config::from_env()
            .context("no --config given and CONCORD_* environment variables are incomplete")?,
    };

    let backend: Arc<dyn Backend> = match config.backend_choice {
        BackendChoice::Etcd => Arc::new(EtcdBackend::new(config.backend_endpoint.clone())),
        BackendChoice::Consul => Arc::new(ConsulBackend::new(config.backend_endpoint.clone())),
    };

    let plugin: Arc<dyn concord_plugin::Plugin> = Arc::new(NullPlugin::new(cli.key.clone()));

    info!(
        key = %cli.key,
        identity = %config.self_identity,
        backend = ?config.backend_choice,
        "starting coordinator"
    );

    let (synchronizer, _handle) = Synchronizer::new(
        backend,
        plugin,
        config.self_identity.clone(),
        config.force_leave,
    );

    synchronizer
        .run()
        .await
        .context("synchronizer loop exited with an error")
}
