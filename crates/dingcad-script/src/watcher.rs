//! File watcher for scene dependencies
//!
//! Notifies when any file read by the last load changes. The set of watched
//! files is replaced after every load, so imports added or removed by an
//! edit are picked up.

use anyhow::{Result, anyhow};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, Debouncer, new_debouncer};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;

use crate::imports::normalize_path;

/// Event emitted when a watched file changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A dependency was written, created or removed
    Changed(PathBuf),
    /// An error occurred while watching
    Error(String),
}

/// Watches the exact files of a dependency set
pub struct DependencyWatcher {
    debouncer: Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<WatchEvent>,
    /// Files that produce events
    files: Arc<Mutex<BTreeSet<PathBuf>>>,
    /// Directories registered with the OS watcher
    directories: BTreeSet<PathBuf>,
}

impl DependencyWatcher {
    /// Create a watcher
    ///
    /// # Arguments
    ///
    /// * `debounce_ms` - Debounce duration in milliseconds (default: 100)
    pub fn new(debounce_ms: Option<u64>) -> Result<Self> {
        let (tx, rx) = channel();
        let files = Arc::new(Mutex::new(BTreeSet::new()));
        let files_clone = files.clone();

        let debounce_duration = Duration::from_millis(debounce_ms.unwrap_or(100));

        let debouncer = new_debouncer(
            debounce_duration,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    let watched = files_clone.lock();
                    for event in events {
                        let path = normalize_path(&event.path);
                        if watched.contains(&path) {
                            let _ = tx.send(WatchEvent::Changed(path));
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(format!("Watch error: {:?}", e)));
                }
            },
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {:?}", e))?;

        Ok(Self {
            debouncer,
            receiver: rx,
            files,
            directories: BTreeSet::new(),
        })
    }

    /// Replace the watched set with `paths`
    ///
    /// Parent directories are watched rather than the files themselves, so
    /// a file that is deleted and recreated by an editor keeps reporting.
    /// A missing file is still tracked as long as its directory exists.
    pub fn watch_all(&mut self, paths: &[PathBuf]) -> Result<()> {
        let files: BTreeSet<PathBuf> = paths.iter().map(|p| normalize_path(p)).collect();
        let directories: BTreeSet<PathBuf> = files
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .filter(|d| d.is_dir())
            .collect();

        for stale in self.directories.difference(&directories) {
            if let Err(e) = self.debouncer.watcher().unwatch(stale) {
                tracing::debug!("Failed to unwatch {}: {}", stale.display(), e);
            }
        }
        for fresh in directories.difference(&self.directories) {
            self.debouncer
                .watcher()
                .watch(fresh, RecursiveMode::NonRecursive)
                .map_err(|e| anyhow!("Failed to watch path {}: {}", fresh.display(), e))?;
            tracing::debug!("Watching directory: {}", fresh.display());
        }

        tracing::info!("Watching {} file(s)", files.len());
        *self.files.lock() = files;
        self.directories = directories;
        Ok(())
    }

    /// Files currently producing events
    pub fn watched(&self) -> Vec<PathBuf> {
        self.files.lock().iter().cloned().collect()
    }

    /// Try to receive a watch event (non-blocking)
    pub fn try_recv(&self) -> Option<WatchEvent> {
        self.receiver.try_recv().ok()
    }

    /// Receive a watch event with timeout
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WatchEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Get all pending events
    pub fn drain_events(&self) -> Vec<WatchEvent> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_watcher_creation() {
        let watcher = DependencyWatcher::new(None);
        assert!(watcher.is_ok());
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let mut watcher = DependencyWatcher::new(None).unwrap();
        watcher
            .watch_all(&[PathBuf::from("/nonexistent/path/test.rhai")])
            .unwrap();
        assert_eq!(watcher.watched(), vec![PathBuf::from("/nonexistent/path/test.rhai")]);
        assert!(watcher.directories.is_empty());
    }

    #[test]
    fn test_watch_set_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.rhai");
        let b = dir.path().join("b.rhai");
        std::fs::write(&a, "1").unwrap();
        std::fs::write(&b, "2").unwrap();

        let mut watcher = DependencyWatcher::new(Some(20)).unwrap();
        watcher.watch_all(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(watcher.watched().len(), 2);
        watcher.watch_all(std::slice::from_ref(&b)).unwrap();
        assert_eq!(watcher.watched(), vec![normalize_path(&b)]);
        assert_eq!(watcher.directories.len(), 1);
    }
}
