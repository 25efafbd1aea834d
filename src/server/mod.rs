pub mod api;

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::HubConfig;
use crate::hub::BroadcastHub;
use crate::watcher::ScriptWatcher;

/// Build the hub from `config`, start the script watcher if configured, and
/// serve HTTP until the listener fails.
pub async fn start(config: HubConfig) -> Result<()> {
    let hub = BroadcastHub::from_config(&config);

    let _watcher = match &config.scripts_dir {
        Some(dir) => Some(ScriptWatcher::start(
            dir,
            hub.clone(),
            Duration::from_millis(config.watch_debounce_ms),
        )?),
        None => None,
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    api::serve(listener, hub).await
}
