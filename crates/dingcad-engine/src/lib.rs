//! dingcad Engine - scene loading, hot reload, and export
//!
//! The Engine is a thin orchestration layer over dingcad-script and
//! dingcad-kernel. It owns the script runtime, the current scene and the
//! dependency map used for caller-driven reloads.
//!
//! ## Example
//!
//! ```ignore
//! use dingcad_engine::{Engine, ExportOptions};
//!
//! let mut engine = Engine::new();
//! engine.load_scene(Path::new("scene.rhai"))?;
//!
//! loop {
//!     if let Some(reload) = engine.poll()? {
//!         println!("{}", reload.outcome);
//!     }
//!     std::thread::sleep(engine.poll_interval());
//! }
//! ```

pub mod config;
pub mod export;
pub mod scene;
pub mod watch;

use anyhow::Result;
use dingcad_script::{LoadOutcome, ScriptRuntime, SolidHandle};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Re-export commonly used types from dependencies
pub use dingcad_kernel::{BoundingBox, Solid, Status};
pub use dingcad_script::{LoadError, LoadPhase, LoadResult};

// Re-export our own types
pub use config::{Settings, load_settings, save_settings};
pub use export::{ExportOptions, ExportResult};
pub use scene::{Scene, SceneError};
pub use watch::{Change, ChangeKind, DependencyWatch};

#[cfg(feature = "file-watcher")]
pub use watch::{DependencyWatcher, WatchEvent};

/// What a reload produced
#[derive(Debug, Clone)]
pub enum ReloadOutcome {
    /// The new scene replaced the old one
    Reloaded { message: String, triangles: usize },
    /// The load failed; any previous scene is still current
    Failed { message: String },
}

impl fmt::Display for ReloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadOutcome::Reloaded { message, triangles } => write!(f, "{message} ({triangles} triangles)"),
            ReloadOutcome::Failed { message } => write!(f, "Reload failed: {message}"),
        }
    }
}

/// A reload triggered by [`Engine::poll`]
#[derive(Debug, Clone)]
pub struct Reload {
    /// Dependencies that changed
    pub changed: Vec<Change>,
    pub outcome: ReloadOutcome,
}

/// The main dingcad engine
///
/// Provides a unified interface for:
/// - Scene loading from an entry file
/// - Caller-driven polling with full reload on change
/// - STL export of the current scene
pub struct Engine {
    /// The Rhai runtime carrying every geometry binding
    runtime: ScriptRuntime,

    settings: Settings,

    /// The last successfully loaded scene
    current_scene: Option<Scene>,

    /// Entry file of the last load attempt, successful or not
    entry: Option<PathBuf>,

    /// Dependencies of the last load attempt
    dependencies: DependencyWatch,

    /// Message of the last failed load, cleared by a success
    last_error: Option<String>,

    /// OS notifications for the dependency set
    #[cfg(feature = "file-watcher")]
    watcher: Option<DependencyWatcher>,
}

impl Engine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            runtime: ScriptRuntime::with_limits(settings.limits()),
            settings,
            current_scene: None,
            entry: None,
            dependencies: DependencyWatch::new(),
            last_error: None,
            #[cfg(feature = "file-watcher")]
            watcher: None,
        }
    }

    // ========================================================================
    // Scene Loading
    // ========================================================================

    /// Load a scene file and make it current
    ///
    /// On failure the previous scene stays current, and the dependency map
    /// still follows the files the failed attempt read.
    pub fn load_scene(&mut self, path: &Path) -> Result<&Scene> {
        let result = self.runtime.load_scene(path);
        self.entry = Some(
            result
                .dependencies
                .first()
                .cloned()
                .unwrap_or_else(|| path.to_path_buf()),
        );
        self.track(&result.dependencies);

        match result.outcome {
            LoadOutcome::Success { solid, message } => {
                tracing::debug!("{message}");
                self.last_error = None;
                let source = self.entry.clone().unwrap_or_else(|| path.to_path_buf());
                let scene = self.current_scene.insert(Scene::with_source(solid, source, result.dependencies));
                Ok(scene)
            }
            LoadOutcome::Failure { message, .. } => {
                self.last_error = Some(message.clone());
                Err(SceneError::LoadFailed(message).into())
            }
        }
    }

    /// Load the given scene, or discover the default one
    pub fn load_scene_or_default(&mut self, path: Option<&Path>) -> Result<&Scene> {
        let path = self.resolve_scene_path(path)?;
        self.load_scene(&path)
    }

    /// The given path, or the first default scene that exists
    pub fn resolve_scene_path(&self, path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = path {
            return Ok(path.to_path_buf());
        }
        self.settings
            .find_default_scene()
            .ok_or_else(|| SceneError::NoDefaultScene(self.settings.scene_candidates()).into())
    }

    /// Re-run the last load attempt
    pub fn reload(&mut self) -> Result<ReloadOutcome> {
        let entry = self.entry.clone().ok_or(SceneError::NoScene)?;
        Ok(match self.load_scene(&entry) {
            Ok(scene) => ReloadOutcome::Reloaded {
                message: format!("Loaded {}", entry.display()),
                triangles: scene.solid.num_tri(),
            },
            Err(e) => {
                tracing::warn!("Reload failed, keeping previous scene: {e}");
                ReloadOutcome::Failed { message: e.to_string() }
            }
        })
    }

    /// Check the dependency set and reload if anything changed
    ///
    /// Returns `Ok(None)` when nothing changed or nothing was ever loaded.
    pub fn poll(&mut self) -> Result<Option<Reload>> {
        if self.entry.is_none() {
            return Ok(None);
        }
        let changed = self.dependencies.poll();
        if changed.is_empty() {
            return Ok(None);
        }
        for change in &changed {
            tracing::info!(path = %change.path.display(), kind = ?change.kind, "scene reload triggered");
        }
        let outcome = self.reload()?;
        Ok(Some(Reload { changed, outcome }))
    }

    fn track(&mut self, dependencies: &[PathBuf]) {
        self.dependencies.rebuild(dependencies);
        #[cfg(feature = "file-watcher")]
        {
            if let Some(watcher) = &mut self.watcher
                && let Err(e) = watcher.watch_all(dependencies)
            {
                tracing::warn!("Failed to update file watcher: {e}");
            }
        }
    }

    // ========================================================================
    // Scene Access
    // ========================================================================

    /// Get the currently loaded scene (if any)
    pub fn scene(&self) -> Option<&Scene> {
        self.current_scene.as_ref()
    }

    /// Get the current solid (if a scene is loaded)
    pub fn solid(&self) -> Option<&SolidHandle> {
        self.current_scene.as_ref().map(|s| &s.solid)
    }

    /// Check if a scene is currently loaded
    pub fn has_scene(&self) -> bool {
        self.current_scene.is_some()
    }

    /// Clear the current scene and stop tracking its files
    pub fn clear_scene(&mut self) {
        self.current_scene = None;
        self.entry = None;
        self.last_error = None;
        self.track(&[]);
    }

    /// Files read by the last load attempt
    pub fn dependencies(&self) -> Vec<PathBuf> {
        self.dependencies.paths().map(Path::to_path_buf).collect()
    }

    /// Message of the last failed load, if the latest attempt failed
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Export the current scene as binary STL
    pub fn export(&self, options: &ExportOptions) -> Result<ExportResult> {
        let solid = self.solid().ok_or(SceneError::NoScene)?;
        export::export_solid(solid, options)
    }

    /// Export the current scene to `path`, or to the configured default
    pub fn export_to(&self, path: Option<&Path>) -> Result<ExportResult> {
        let path = path.map_or_else(|| self.settings.default_export_path(), Path::to_path_buf);
        self.export(&ExportOptions::new(path))
    }

    // ========================================================================
    // File Watching (only with file-watcher feature)
    // ========================================================================

    /// Start OS notifications for the current dependency set
    #[cfg(feature = "file-watcher")]
    pub fn watch_dependencies(&mut self) -> Result<()> {
        let paths = self.dependencies();
        self.watcher = Some(watch::create_watcher(&paths, self.settings.debounce_ms)?);
        Ok(())
    }

    /// Block until a dependency event arrives or `timeout` passes.
    /// Without a watcher this just sleeps.
    pub fn wait_for_change(&self, timeout: Duration) {
        #[cfg(feature = "file-watcher")]
        {
            if let Some(watcher) = &self.watcher {
                if let Some(WatchEvent::Error(e)) = watcher.recv_timeout(timeout) {
                    tracing::warn!("{e}");
                }
                // Coalesce the burst an editor save produces
                watcher.drain_events();
                return;
            }
        }
        std::thread::sleep(timeout);
    }

    // ========================================================================
    // Access to underlying components (for advanced use)
    // ========================================================================

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.poll_interval_ms)
    }

    /// Get a reference to the underlying script runtime
    pub fn runtime(&self) -> &ScriptRuntime {
        &self.runtime
    }

    /// Get a mutable reference to the underlying script runtime
    pub fn runtime_mut(&mut self) -> &mut ScriptRuntime {
        &mut self.runtime
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
