//! Mesh file import
//!
//! Missing files are soft failures: the script gets an empty solid and the
//! host logs a warning, so a scene with a broken asset still loads.

use std::path::{Path, PathBuf};

use dingcad_kernel::Solid;
use rhai::{Dynamic, Engine, ImmutableString};
use tracing::{debug, warn};

use crate::bridge::{BindResult, BindingError, ScriptResult, wrap_solid};

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_fn("loadMesh", |path: ImmutableString| load_mesh(&path, false))
        .register_fn("loadMesh", |path: ImmutableString, force_cleanup: bool| {
            load_mesh(&path, force_cleanup)
        });
}

/// Expand `~` to the home directory and anchor relative paths at the
/// current directory
pub fn resolve_mesh_path(path: &str) -> BindResult<PathBuf> {
    let expanded = if path == "~" || path.starts_with("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            BindingError::Internal(format!("loadMesh: unable to resolve home directory for '{path}'"))
        })?;
        home.join(path.trim_start_matches('~').trim_start_matches('/'))
    } else {
        PathBuf::from(path)
    };
    if expanded.is_absolute() {
        return Ok(expanded);
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&expanded))
        .map_err(|_| BindingError::Internal(format!("loadMesh: unable to resolve path '{path}'")))
}

fn load_mesh(path: &str, force_cleanup: bool) -> ScriptResult<Dynamic> {
    let resolved = resolve_mesh_path(path)?;
    match std::fs::metadata(&resolved) {
        Err(_) => {
            warn!(path = %resolved.display(), "loadMesh: file not found '{}'", path);
            return Ok(wrap_solid(Solid::empty()));
        }
        Ok(meta) if !meta.is_file() => {
            warn!(path = %resolved.display(), "loadMesh: not a regular file '{}'", path);
            return Ok(wrap_solid(Solid::empty()));
        }
        Ok(_) => {}
    }
    import(&resolved, force_cleanup)
}

fn import(path: &Path, force_cleanup: bool) -> ScriptResult<Dynamic> {
    let solid = Solid::import_mesh(path, force_cleanup).map_err(|e| {
        warn!(path = %path.display(), error = %e, "loadMesh failed");
        BindingError::Internal(format!("loadMesh failed: {e}"))
    })?;
    if solid.is_empty() && solid.status().is_ok() {
        warn!(path = %path.display(), "loadMesh: imported mesh is empty");
        return Err(BindingError::Internal("loadMesh: imported mesh is empty".into()).into());
    }
    debug!(path = %path.display(), triangles = solid.num_tri(), status = %solid.status(), "mesh imported");
    Ok(wrap_solid(solid))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::thrown_message;
    use crate::handle::SolidHandle;
    use approx::assert_relative_eq;
    use dingcad_kernel::prelude::DVec3;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.register_type_with_name::<SolidHandle>("Solid");
        register(&mut engine);
        engine
    }

    #[test]
    fn test_resolve_paths() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(resolve_mesh_path("~/parts/a.stl").unwrap(), home.join("parts/a.stl"));
        assert_eq!(resolve_mesh_path("~").unwrap(), home);
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(resolve_mesh_path("a.stl").unwrap(), cwd.join("a.stl"));
        assert_eq!(resolve_mesh_path("/tmp/a.stl").unwrap(), PathBuf::from("/tmp/a.stl"));
    }

    #[test]
    fn test_missing_file_is_empty_solid() {
        let s = engine().eval::<SolidHandle>("loadMesh(\"~/nonexistent.stl\")").unwrap();
        assert!(s.is_empty());
        assert!(s.status().is_ok());
        assert_relative_eq!(s.volume(), 0.0);
    }

    #[test]
    fn test_directory_is_empty_solid() {
        let dir = tempfile::tempdir().unwrap();
        let script = format!("loadMesh({:?})", dir.path().display().to_string());
        assert!(engine().eval::<SolidHandle>(&script).unwrap().is_empty());
    }

    #[test]
    fn test_load_exported_stl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        Solid::cube(DVec3::splat(2.0), false).export_stl(&path).unwrap();
        let script = format!("loadMesh({:?}, true)", path.display().to_string());
        let s = engine().eval::<SolidHandle>(&script).unwrap();
        assert_relative_eq!(s.volume(), 8.0, epsilon = 1e-5);
    }

    #[test]
    fn test_garbage_file_throws() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.obj");
        std::fs::write(&path, "v 0 0 0\nf 1 2 3\n").unwrap();
        let script = format!("loadMesh({:?})", path.display().to_string());
        let err = engine().eval::<SolidHandle>(&script).unwrap_err();
        assert!(thrown_message(&err).starts_with("InternalError: loadMesh failed:"));
    }
}
