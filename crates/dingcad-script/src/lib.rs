//! dingcad Script - Rhai bindings for solid modeling
//!
//! Scenes are Rhai modules that build solids through the functions
//! registered here and hand one back under the name `scene`.
//!
//! ## Example Scene
//!
//! ```rhai
//! import "parts/bracket" as bracket;
//!
//! let plate = cube(#{ size: [40, 20, 4], center: true });
//! let hole = cylinder(#{ height: 10, radius: 3, center: true });
//!
//! let scene = difference(plate, hole).union(bracket::arm());
//! ```
//!
//! A module may instead define `fn scene()`, or bind `scene` to a
//! closure; either is called once after the module body has run.
//!
//! ## Errors
//!
//! Bad arguments throw script exceptions named by class (`TypeError:`,
//! `RangeError:`, `InternalError:`) that scripts can catch with
//! `try`/`catch`. Geometry that is merely degenerate is not an error: the
//! result is a solid whose `status()` explains what went wrong.
//!
//! ## Implicit Surfaces
//!
//! `levelSet` samples a script function on a grid. Script callbacks run on
//! the evaluating thread, so `canParallel` must be `false`.

pub mod bridge;
pub mod dispatcher;
pub mod handle;
pub mod imports;
pub mod loader;
pub mod runtime;
pub mod sampler;

#[cfg(feature = "file-watcher")]
pub mod watcher;

pub use bridge::{BindingError, ScriptResult, thrown_message};
pub use handle::{SolidClass, SolidHandle};
pub use imports::{ImportError, ImportTracker, normalize_path};
pub use loader::{LoadError, LoadOutcome, LoadPhase, LoadResult, load_scene, render_error};
pub use runtime::{ScriptLimits, ScriptRuntime};
pub use sampler::{SamplerState, ScriptSampler};

#[cfg(feature = "file-watcher")]
pub use watcher::{DependencyWatcher, WatchEvent};

// Re-export for convenience
pub use dingcad_kernel::{OpType, Solid, Status};
