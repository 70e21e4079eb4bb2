//! Script runtime: a Rhai engine carrying the geometry bindings

use std::cell::OnceCell;
use std::path::Path;

use anyhow::{Result, anyhow};
use rhai::{Dynamic, Engine, Scope};
use tracing::{debug, info};

use crate::dispatcher;
use crate::handle::{SolidClass, SolidHandle};
use crate::loader::{LoadResult, load_scene, render_error};

/// Evaluation limits applied to every runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub max_expr_depth: usize,
    pub max_call_levels: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_expr_depth: 64,
            max_call_levels: 64,
        }
    }
}

/// Rhai engine with the Solid class and every geometry operation registered
pub struct ScriptRuntime {
    engine: Engine,
    class: OnceCell<()>,
}

impl ScriptRuntime {
    /// Create a runtime with default limits
    pub fn new() -> Self {
        Self::with_limits(ScriptLimits::default())
    }

    pub fn with_limits(limits: ScriptLimits) -> Self {
        let mut engine = Engine::new();
        let class = OnceCell::new();

        SolidClass::ensure(&mut engine, &class);
        dispatcher::register(&mut engine);

        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_call_levels(limits.max_call_levels);

        // Script output goes to the log, never straight to stdout
        engine.on_print(|text| info!(target: "dingcad::script", "{text}"));
        engine.on_debug(|text, source, pos| {
            debug!(target: "dingcad::script", source = source.unwrap_or(""), %pos, "{text}");
        });

        Self { engine, class }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        // Re-registration is a no-op once the class is installed
        SolidClass::ensure(&mut self.engine, &self.class);
        &mut self.engine
    }

    /// Load a scene file; see [`load_scene`]
    pub fn load_scene(&mut self, path: &Path) -> LoadResult {
        load_scene(&mut self.engine, path)
    }

    /// Evaluate a snippet and return its value
    pub fn eval(&self, script: &str) -> Result<Dynamic> {
        self.engine
            .eval::<Dynamic>(script)
            .map_err(|e| anyhow!("Failed to evaluate script: {}", render_error(&e)))
    }

    /// Evaluate a snippet against a persistent scope, as the REPL does
    pub fn eval_with_scope(&self, scope: &mut Scope, script: &str) -> Result<Dynamic> {
        self.engine
            .eval_with_scope::<Dynamic>(scope, script)
            .map_err(|e| anyhow!("{}", render_error(&e)))
    }

    /// Evaluate a snippet that must produce a solid
    ///
    /// # Example
    ///
    /// ```ignore
    /// let runtime = ScriptRuntime::new();
    /// let part = runtime.eval_solid("cube(#{ size: [2, 2, 2] })")?;
    /// ```
    pub fn eval_solid(&self, script: &str) -> Result<SolidHandle> {
        let result = self.eval(script)?;
        result.try_cast::<SolidHandle>().ok_or_else(|| {
            if script.trim().ends_with(';') {
                anyhow!(
                    "Script did not return a solid.\n\n\
                    HINT: Your script ends with ';' which returns nothing.\n\
                    Add the variable name at the end:\n\n\
                      let part = cube();\n\
                      part  // <- return it!"
                )
            } else {
                anyhow!("Script did not return a solid. The last expression must be a shape.")
            }
        })
    }
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new()
    }
}
