//! Module resolution for scene imports
//!
//! One [`ImportTracker`] lives for exactly one load. It resolves `import`
//! paths relative to the importing module, records every file it touches
//! as a dependency, compiles each distinct module once, and refuses cycles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use rhai::{Engine, EvalAltResult, Module, ModuleResolver, Position, Scope, Shared};
use thiserror::Error;
use tracing::{debug, trace};

/// Extension appended to import paths that have none
pub const SCRIPT_EXTENSION: &str = "rhai";

/// Import failures, reported by name once Rhai has unwound
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("cyclic import: {}", render_chain(.chain))]
    Cycle { chain: Vec<PathBuf> },

    #[error("Unable to load module '{}'", .path.display())]
    NotFound { path: PathBuf },

    #[error("Unable to read module {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("Unable to resolve home directory for import '{0}'")]
    NoHome(String),
}

fn render_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.file_name().map_or_else(|| p.display().to_string(), |n| n.to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Lexically normalize an absolute path, then canonicalize it if it exists
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.canonicalize().unwrap_or(out)
}

/// Make `path` absolute against `base`, expanding a leading `~`
pub fn absolutize(path: &str, base: &Path) -> Option<PathBuf> {
    let expanded = if path == "~" || path.starts_with("~/") {
        dirs::home_dir()?.join(path.trim_start_matches('~').trim_start_matches('/'))
    } else {
        PathBuf::from(path)
    };
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    Some(normalize_path(&absolute))
}

#[derive(Default)]
struct TrackerState {
    dependencies: Vec<PathBuf>,
    cache: HashMap<PathBuf, Shared<Module>>,
    /// Modules currently being evaluated, outermost first
    chain: Vec<PathBuf>,
    fault: Option<ImportError>,
}

/// Per-load module resolver and dependency recorder
#[derive(Clone)]
pub struct ImportTracker {
    state: Rc<RefCell<TrackerState>>,
    base_dir: PathBuf,
}

impl ImportTracker {
    /// Tracker for a load starting at `entry`, an absolute normalized path
    pub fn new(entry: &Path) -> Self {
        let state = TrackerState {
            dependencies: vec![entry.to_path_buf()],
            chain: vec![entry.to_path_buf()],
            ..TrackerState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            base_dir: entry.parent().map(Path::to_path_buf).unwrap_or_default(),
        }
    }

    /// Every file read so far: the entry first, then imports in resolution order
    pub fn dependencies(&self) -> Vec<PathBuf> {
        self.state.borrow().dependencies.clone()
    }

    /// The first resolution fault, if any
    pub fn take_fault(&self) -> Option<ImportError> {
        self.state.borrow_mut().fault.take()
    }

    /// Resolve an import path as written in the module `source`
    pub fn resolve_path(&self, source: Option<&str>, path: &str) -> Result<PathBuf, ImportError> {
        let base = source
            .map(Path::new)
            .and_then(Path::parent)
            .unwrap_or(&self.base_dir);
        let mut target = PathBuf::from(path);
        if target.extension().is_none() {
            target.set_extension(SCRIPT_EXTENSION);
        }
        let target = target.to_string_lossy();
        absolutize(&target, base).ok_or_else(|| ImportError::NoHome(path.to_string()))
    }

    fn record(&self, path: &Path) {
        let mut state = self.state.borrow_mut();
        if !state.dependencies.iter().any(|p| p == path) {
            state.dependencies.push(path.to_path_buf());
        }
    }

    fn fail(&self, err: ImportError, pos: Position) -> Box<EvalAltResult> {
        let message = err.to_string();
        let not_found = matches!(err, ImportError::NotFound { .. });
        let path = match &err {
            ImportError::NotFound { path } => path.display().to_string(),
            _ => String::new(),
        };
        self.state.borrow_mut().fault.get_or_insert(err);
        if not_found {
            Box::new(EvalAltResult::ErrorModuleNotFound(path, pos))
        } else {
            Box::new(EvalAltResult::ErrorRuntime(message.into(), pos))
        }
    }

    fn load(&self, engine: &Engine, path: &Path, pos: Position) -> Result<Shared<Module>, Box<EvalAltResult>> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            self.fail(
                ImportError::Read {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                },
                pos,
            )
        })?;

        self.state.borrow_mut().chain.push(path.to_path_buf());
        // No borrow is held here: evaluation re-enters `resolve` for nested imports
        let module = engine
            .compile(&text)
            .map_err(Into::into)
            .and_then(|mut ast| {
                ast.set_source(path.to_string_lossy().as_ref());
                Module::eval_ast_as_new(Scope::new(), &ast, engine)
            });
        self.state.borrow_mut().chain.pop();

        let module: Shared<Module> = module
            .map_err(|e| Box::new(EvalAltResult::ErrorInModule(path.display().to_string(), e, pos)))?
            .into();
        self.state
            .borrow_mut()
            .cache
            .insert(path.to_path_buf(), module.clone());
        Ok(module)
    }
}

impl ModuleResolver for ImportTracker {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        let resolved = self.resolve_path(source, path).map_err(|e| self.fail(e, pos))?;
        debug!(import = path, resolved = %resolved.display(), "resolving module");
        self.record(&resolved);

        let cycle = {
            let state = self.state.borrow();
            if let Some(module) = state.cache.get(&resolved) {
                trace!(path = %resolved.display(), "module cache hit");
                return Ok(module.clone());
            }
            state.chain.iter().position(|p| *p == resolved).map(|start| {
                let mut chain = state.chain[start..].to_vec();
                chain.push(resolved.clone());
                chain
            })
        };
        if let Some(chain) = cycle {
            return Err(self.fail(ImportError::Cycle { chain }, pos));
        }
        if !resolved.is_file() {
            return Err(self.fail(ImportError::NotFound { path: resolved }, pos));
        }
        self.load(engine, &resolved, pos)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rhai::INT;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        normalize_path(&path)
    }

    fn run(entry: &Path) -> (Result<INT, Box<EvalAltResult>>, ImportTracker) {
        let mut engine = Engine::new();
        let tracker = ImportTracker::new(entry);
        engine.set_module_resolver(tracker.clone());
        let mut ast = engine.compile(fs::read_to_string(entry).unwrap()).unwrap();
        ast.set_source(entry.to_string_lossy().as_ref());
        (engine.eval_ast::<INT>(&ast), tracker)
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/no/such/./dir/../file.rhai")), PathBuf::from("/no/such/file.rhai"));
    }

    #[test]
    fn test_chain_rendering() {
        let err = ImportError::Cycle {
            chain: vec!["/x/a.rhai".into(), "/x/b.rhai".into(), "/x/a.rhai".into()],
        };
        assert_eq!(err.to_string(), "cyclic import: a.rhai -> b.rhai -> a.rhai");
    }

    #[test]
    fn test_nested_relative_imports() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(dir.path(), "main.rhai", "import \"lib/outer\" as o; o::value");
        let outer = write(dir.path(), "lib/outer.rhai", "import \"inner\" as i; export const value = i::base * 2;");
        let inner = write(dir.path(), "lib/inner.rhai", "export const base = 21;");
        let (result, tracker) = run(&entry);
        assert_eq!(result.unwrap(), 42);
        assert_eq!(tracker.dependencies(), vec![entry, outer, inner]);
    }

    #[test]
    fn test_modules_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(
            dir.path(),
            "main.rhai",
            "import \"a\" as a; import \"b\" as b; a::n + b::n",
        );
        write(dir.path(), "a.rhai", "import \"shared\" as s; export const n = s::n;");
        write(dir.path(), "b.rhai", "import \"shared\" as s; export const n = s::n;");
        write(dir.path(), "shared.rhai", "export const n = 5;");
        let (result, tracker) = run(&entry);
        assert_eq!(result.unwrap(), 10);
        assert_eq!(tracker.dependencies().len(), 4);
        assert_eq!(tracker.state.borrow().cache.len(), 3);
    }

    #[test]
    fn test_cycle_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(dir.path(), "a.rhai", "import \"b\" as b; 1");
        write(dir.path(), "b.rhai", "import \"a\" as a; export const x = 1;");
        let (result, tracker) = run(&entry);
        assert!(result.is_err());
        let fault = tracker.take_fault().unwrap();
        assert_eq!(fault.to_string(), "cyclic import: a.rhai -> b.rhai -> a.rhai");
    }

    #[test]
    fn test_missing_module_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(dir.path(), "main.rhai", "import \"missing\" as m; 1");
        let (result, tracker) = run(&entry);
        assert!(result.is_err());
        let missing = normalize_path(dir.path()).join("missing.rhai");
        assert_eq!(
            tracker.take_fault(),
            Some(ImportError::NotFound { path: missing.clone() })
        );
        assert_eq!(tracker.dependencies(), vec![entry, missing]);
    }
}
