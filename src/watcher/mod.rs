//! Script directory watcher.
//!
//! Turns changes to persisted scripts into `reload` events on the push
//! channel. The topic is the file stem: `scripts/demo.md` → `demo`.

use anyhow::{Context as _, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use crate::hub::BroadcastHub;

/// Watches a scripts directory for as long as it is alive.
pub struct ScriptWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl ScriptWatcher {
    pub fn start(root: impl AsRef<Path>, hub: BroadcastHub, debounce: Duration) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let topics: BTreeSet<String> = events
                        .iter()
                        .filter(|e| matches!(e.kind, EventKind::Create(_) | EventKind::Modify(_)))
                        .flat_map(|e| e.paths.iter())
                        .filter_map(|p| topic_for_path(p))
                        .collect();

                    for topic in topics {
                        match hub.reload(&topic) {
                            Ok(report) => tracing::info!(
                                topic = %topic,
                                viewers = report.delivered,
                                "script changed, reload published"
                            ),
                            Err(err) => tracing::warn!(topic = %topic, error = %err, "reload failed"),
                        }
                    }
                }
                Err(errors) => {
                    for err in errors {
                        tracing::warn!(error = %err, "script watcher error");
                    }
                }
            }
        })
        .context("failed to create script watcher")?;

        debouncer
            .watch(&root, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;

        tracing::info!(dir = %root.display(), "watching scripts");

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

/// Topic for a changed script file, or `None` for hidden and temp files.
pub fn topic_for_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    if name.starts_with('.') || name.contains('~') || name.ends_with(".tmp") || name.ends_with(".swp") {
        return None;
    }

    let stem = path.file_stem()?.to_string_lossy();
    (!stem.is_empty()).then(|| stem.into_owned())
}
