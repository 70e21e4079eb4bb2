//! Dependency polling for hot reload
//!
//! [`DependencyWatch`] remembers the modification time of every file read by
//! the last load attempt and reports which ones differ on the next poll.
//! It works without any OS notification support; the notify-based watcher
//! from dingcad-script can be layered on top to wake a caller early.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[cfg(feature = "file-watcher")]
pub use dingcad_script::{DependencyWatcher, WatchEvent};

/// How a dependency differs from the last observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    Removed,
    Appeared,
}

/// A dependency that changed since the last poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Last-observed modification time per dependency; `None` means missing
#[derive(Debug, Clone, Default)]
pub struct DependencyWatch {
    stamps: BTreeMap<PathBuf, Option<SystemTime>>,
}

fn stamp(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl DependencyWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe `paths` as they are now
    pub fn from_paths(paths: &[PathBuf]) -> Self {
        let mut watch = Self::new();
        watch.rebuild(paths);
        watch
    }

    /// Replace the watched set, observing every path afresh
    pub fn rebuild(&mut self, paths: &[PathBuf]) {
        self.stamps = paths.iter().map(|p| (p.clone(), stamp(p))).collect();
        tracing::debug!(files = self.stamps.len(), "dependency map rebuilt");
    }

    /// Report every path whose state differs from the last observation.
    /// Observations are updated, so the same change is reported once.
    pub fn poll(&mut self) -> Vec<Change> {
        let mut changes = Vec::new();
        for (path, last) in &mut self.stamps {
            let now = stamp(path);
            let kind = match (*last, now) {
                (Some(before), Some(after)) if before != after => ChangeKind::Modified,
                (Some(_), None) => ChangeKind::Removed,
                (None, Some(_)) => ChangeKind::Appeared,
                _ => continue,
            };
            *last = now;
            changes.push(Change {
                path: path.clone(),
                kind,
            });
        }
        changes
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.stamps.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

/// Create a notify-based watcher over `paths`
#[cfg(feature = "file-watcher")]
pub fn create_watcher(paths: &[PathBuf], debounce_ms: u64) -> anyhow::Result<DependencyWatcher> {
    let mut watcher = DependencyWatcher::new(Some(debounce_ms))?;
    watcher.watch_all(paths)?;
    Ok(watcher)
}
