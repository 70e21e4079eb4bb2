//! Scene representation for the dingcad engine
//!
//! A Scene is the solid exported by the last successful load, together with
//! the files that load read.

use dingcad_script::SolidHandle;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when working with scenes
#[derive(Error, Debug)]
pub enum SceneError {
    /// No scene is currently loaded
    #[error("No scene loaded")]
    NoScene,

    /// No scene path was given and none was found
    #[error("No scene file given and none found (looked for {})", render_paths(.0))]
    NoDefaultScene(Vec<PathBuf>),

    /// The scene failed to load; the message is the loader's
    #[error("{0}")]
    LoadFailed(String),
}

fn render_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

/// A loaded scene
#[derive(Debug, Clone)]
pub struct Scene {
    /// The exported solid
    pub solid: SolidHandle,

    /// Entry file (None for scenes evaluated from a string)
    pub source_path: Option<PathBuf>,

    /// Every file read by the load, entry first
    pub dependencies: Vec<PathBuf>,
}

impl Scene {
    /// A scene with no backing file
    pub fn new(solid: SolidHandle) -> Self {
        Self {
            solid,
            source_path: None,
            dependencies: Vec::new(),
        }
    }

    /// A scene produced by loading `path`
    pub fn with_source(solid: SolidHandle, path: PathBuf, dependencies: Vec<PathBuf>) -> Self {
        Self {
            solid,
            source_path: Some(path),
            dependencies,
        }
    }

    /// Check if this scene was loaded from a file
    pub fn has_source(&self) -> bool {
        self.source_path.is_some()
    }

    /// Get the source file name (without path)
    pub fn source_name(&self) -> Option<String> {
        self.source_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string())
    }
}
