//! Scene loading: entry file to exported solid
//!
//! A load runs `Resolving -> Compiling -> ResolvingImports -> Evaluating ->
//! ExtractingExport -> Done`. Rhai resolves `import` statements as it
//! executes them, so import resolution and evaluation interleave; a failure
//! raised by the resolver is attributed to `ResolvingImports`.
//!
//! Every load gets a fresh scope and a fresh [`ImportTracker`]. The result
//! always carries the dependency set gathered so far, so a caller can keep
//! watching files after a failed load.

use std::fmt;
use std::path::{Path, PathBuf};

use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FnPtr, Position, Scope, AST};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::bridge::thrown_message;
use crate::handle::SolidHandle;
use crate::imports::{ImportError, ImportTracker, normalize_path};

/// Name of the value a scene module must provide
pub const SCENE_EXPORT: &str = "scene";

/// Load state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Resolving,
    Compiling,
    ResolvingImports,
    Evaluating,
    ExtractingExport,
    Done,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadPhase::Resolving => "resolving",
            LoadPhase::Compiling => "compiling",
            LoadPhase::ResolvingImports => "resolving imports",
            LoadPhase::Evaluating => "evaluating",
            LoadPhase::ExtractingExport => "extracting export",
            LoadPhase::Done => "done",
        })
    }
}

/// Why a load failed
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Scene file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unable to read scene file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("{0}")]
    Script(String),

    #[error("Scene module must export '{SCENE_EXPORT}'")]
    MissingExport,

    #[error("Exported '{SCENE_EXPORT}' is not a solid (found {0})")]
    NotASolid(String),
}

impl LoadError {
    /// Phase in which the load stopped
    pub fn phase(&self) -> LoadPhase {
        match self {
            LoadError::NotFound(_) => LoadPhase::Resolving,
            LoadError::Read { .. } | LoadError::Parse { .. } => LoadPhase::Compiling,
            LoadError::Import(_) => LoadPhase::ResolvingImports,
            LoadError::Script(_) => LoadPhase::Evaluating,
            LoadError::MissingExport | LoadError::NotASolid(_) => LoadPhase::ExtractingExport,
        }
    }
}

/// Outcome of one load attempt
#[derive(Debug)]
pub enum LoadOutcome {
    Success { solid: SolidHandle, message: String },
    Failure { message: String, error: LoadError },
}

/// Outcome plus every file read during the attempt
#[derive(Debug)]
pub struct LoadResult {
    pub outcome: LoadOutcome,
    pub dependencies: Vec<PathBuf>,
}

impl LoadResult {
    fn failure(error: LoadError, dependencies: Vec<PathBuf>) -> Self {
        debug!(phase = %error.phase(), %error, "scene load failed");
        Self {
            outcome: LoadOutcome::Failure {
                message: error.to_string(),
                error,
            },
            dependencies,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, LoadOutcome::Success { .. })
    }

    pub fn solid(&self) -> Option<&SolidHandle> {
        match &self.outcome {
            LoadOutcome::Success { solid, .. } => Some(solid),
            LoadOutcome::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match &self.outcome {
            LoadOutcome::Success { message, .. } | LoadOutcome::Failure { message, .. } => message,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match &self.outcome {
            LoadOutcome::Failure { error, .. } => Some(error),
            LoadOutcome::Success { .. } => None,
        }
    }
}

fn enter(phase: LoadPhase, path: &Path) {
    trace!(%phase, path = %path.display(), "scene load phase");
}

/// Load the scene at `path` with `engine`, which must already carry the
/// geometry bindings. The engine's module resolver is replaced.
pub fn load_scene(engine: &mut Engine, path: &Path) -> LoadResult {
    enter(LoadPhase::Resolving, path);
    let entry = match std::path::absolute(path) {
        Ok(absolute) => normalize_path(&absolute),
        Err(_) => path.to_path_buf(),
    };
    if !entry.is_file() {
        return LoadResult::failure(LoadError::NotFound(entry.clone()), vec![entry]);
    }

    enter(LoadPhase::Compiling, &entry);
    let text = match std::fs::read_to_string(&entry) {
        Ok(text) => text,
        Err(source) => {
            let error = LoadError::Read {
                path: entry.clone(),
                source,
            };
            return LoadResult::failure(error, vec![entry]);
        }
    };
    let tracker = ImportTracker::new(&entry);
    engine.set_module_resolver(tracker.clone());
    let mut ast = match engine.compile(&text) {
        Ok(ast) => ast,
        Err(err) => {
            let error = LoadError::Parse {
                path: entry.clone(),
                message: err.to_string(),
            };
            return LoadResult::failure(error, tracker.dependencies());
        }
    };
    ast.set_source(entry.to_string_lossy().as_ref());

    enter(LoadPhase::Evaluating, &entry);
    let mut scope = Scope::new();
    let defines_scene_fn = ast
        .iter_functions()
        .any(|f| f.name == SCENE_EXPORT && f.params.is_empty());
    // With a `scene()` function, run the body and the call in one pass so
    // the function sees the module's imports
    let called = if defines_scene_fn {
        let options = CallFnOptions::new().eval_ast(true).rewind_scope(false);
        engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, &ast, SCENE_EXPORT, ())
            .map(Some)
    } else {
        engine.run_ast_with_scope(&mut scope, &ast).map(|()| None)
    };
    let called = match called {
        Ok(value) => value,
        Err(err) => {
            let error = match tracker.take_fault() {
                Some(fault) => LoadError::Import(fault),
                None => LoadError::Script(render_error(&err)),
            };
            return LoadResult::failure(error, tracker.dependencies());
        }
    };

    enter(LoadPhase::ExtractingExport, &entry);
    let exported = match extract_export(engine, &ast, &scope, called) {
        Ok(value) => value,
        Err(error) => return LoadResult::failure(error, tracker.dependencies()),
    };
    let Some(solid) = exported.clone().try_cast::<SolidHandle>() else {
        let found = engine.map_type_name(exported.type_name()).to_string();
        return LoadResult::failure(LoadError::NotASolid(found), tracker.dependencies());
    };

    enter(LoadPhase::Done, &entry);
    let dependencies = tracker.dependencies();
    info!(
        path = %entry.display(),
        triangles = solid.num_tri(),
        dependencies = dependencies.len(),
        "scene loaded"
    );
    LoadResult {
        outcome: LoadOutcome::Success {
            solid,
            message: format!("Loaded {}", entry.display()),
        },
        dependencies,
    }
}

/// The `scene` value: a global variable, a function pointer stored in it,
/// or the result of an already-called `scene()` function
fn extract_export(engine: &Engine, ast: &AST, scope: &Scope, called: Option<Dynamic>) -> Result<Dynamic, LoadError> {
    match scope.get_value::<Dynamic>(SCENE_EXPORT) {
        Some(value) if value.is_fnptr() => match value.try_cast::<FnPtr>() {
            Some(function) => function
                .call::<Dynamic>(engine, ast, ())
                .map_err(|err| LoadError::Script(render_error(&err))),
            None => Err(LoadError::MissingExport),
        },
        Some(value) => Ok(value),
        None => called.ok_or(LoadError::MissingExport),
    }
}

/// Render a script error with its call chain, innermost frame first
pub fn render_error(err: &EvalAltResult) -> String {
    let mut frames = Vec::new();
    let mut current = err;
    loop {
        match current {
            EvalAltResult::ErrorInFunctionCall(name, source, inner, pos) => {
                let location = if source.is_empty() {
                    location(pos)
                } else {
                    format!("{source}, {}", location(pos))
                };
                frames.push(format!("at {name} ({location})"));
                current = inner;
            }
            EvalAltResult::ErrorInModule(path, inner, pos) => {
                frames.push(format!("in module {path} ({})", location(pos)));
                current = inner;
            }
            _ => break,
        }
    }
    let mut rendered = thrown_message(current);
    if matches!(current, EvalAltResult::ErrorRuntime(..)) && !current.position().is_none() {
        rendered.push_str(&format!(" ({})", location(&current.position())));
    }
    for frame in frames.iter().rev() {
        rendered.push_str("\n    ");
        rendered.push_str(frame);
    }
    rendered
}

fn location(pos: &Position) -> String {
    match (pos.line(), pos.position()) {
        (Some(line), Some(col)) => format!("line {line}, position {col}"),
        (Some(line), None) => format!("line {line}"),
        _ => "unknown position".to_string(),
    }
}
