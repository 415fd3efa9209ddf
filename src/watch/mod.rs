//! Watch mode
//!
//! File events are debounced, then each batch that touches a relevant file
//! triggers one rebuild. Rebuilds never overlap: the next batch is only read
//! after the previous rebuild finished.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Quiet period before a batch of events is reported
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Directories whose changes never trigger a rebuild
const IGNORED_DIRS: &[&str] = &["node_modules", ".git"];

/// Watch `root` and call `rebuild` after relevant changes, until ctrl-c
pub async fn run<F, Fut>(root: &Path, ignored: &[PathBuf], mut rebuild: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
        // The receiver is gone once the loop below has stopped
        let _ = tx.send(result);
    })
    .context("Failed to start file watcher")?;

    debouncer
        .watcher()
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watcher");
                break;
            }
            batch = rx.recv() => match batch {
                Some(Ok(events)) => {
                    let changed: Vec<PathBuf> = events
                        .into_iter()
                        .map(|event| event.path)
                        .filter(|path| should_rebuild(path, ignored))
                        .collect();
                    if changed.is_empty() {
                        continue;
                    }

                    for path in &changed {
                        debug!("Changed: {}", path.display());
                    }
                    eprintln!(
                        "  {} {} changed, rebuilding",
                        "↻".yellow(),
                        changed[0].display().to_string().dimmed()
                    );
                    rebuild().await;
                }
                Some(Err(err)) => error!("Watch error: {:?}", err),
                None => break,
            }
        }
    }

    Ok(())
}

/// Whether a change to `path` should trigger a rebuild
pub fn should_rebuild(path: &Path, ignored: &[PathBuf]) -> bool {
    if ignored.iter().any(|dir| path.starts_with(dir)) {
        return false;
    }
    !path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|name| IGNORED_DIRS.contains(&name))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_directory_is_ignored() {
        let ignored = vec![PathBuf::from("/project/build")];

        assert!(should_rebuild(Path::new("/project/source/index.ts"), &ignored));
        assert!(should_rebuild(Path::new("/project/umdpack.toml"), &ignored));
        assert!(!should_rebuild(Path::new("/project/build/beam.js"), &ignored));
        assert!(!should_rebuild(Path::new("/project/.git/index"), &ignored));
        assert!(!should_rebuild(
            Path::new("/project/node_modules/dep/index.js"),
            &ignored
        ));
    }
}
