//! The opaque solid handle scripts pass around

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use dingcad_kernel::Solid;
use rhai::{Dynamic, Engine};

/// Script-visible reference to an immutable kernel solid.
///
/// Every copy a script holds is one `Arc` reference; the solid is freed
/// when the last `Dynamic` holding it is dropped.
#[derive(Clone)]
pub struct SolidHandle(Arc<Solid>);

impl SolidHandle {
    pub fn new(solid: Solid) -> Self {
        Self(Arc::new(solid))
    }

    pub fn solid(&self) -> &Solid {
        &self.0
    }

    pub fn arc(&self) -> &Arc<Solid> {
        &self.0
    }

    /// Whether two handles refer to the same kernel object
    pub fn ptr_eq(&self, other: &SolidHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Arc<Solid>> for SolidHandle {
    fn from(solid: Arc<Solid>) -> Self {
        Self(solid)
    }
}

impl std::ops::Deref for SolidHandle {
    type Target = Solid;

    fn deref(&self) -> &Solid {
        &self.0
    }
}

impl fmt::Debug for SolidHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solid")
            .field("triangles", &self.0.num_tri())
            .field("vertices", &self.0.num_vert())
            .field("status", &self.0.status())
            .finish()
    }
}

impl fmt::Display for SolidHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Solid({} triangles, status {})",
            self.0.num_tri(),
            self.0.status()
        )
    }
}

/// Registration of the `Solid` custom type
pub struct SolidClass;

impl SolidClass {
    /// Register the type, its printers and `isSolid` once per engine.
    pub fn ensure(engine: &mut Engine, installed: &OnceCell<()>) {
        if installed.get().is_some() {
            return;
        }
        engine
            .register_type_with_name::<SolidHandle>("Solid")
            .register_fn("to_string", |s: &mut SolidHandle| s.to_string())
            .register_fn("to_debug", |s: &mut SolidHandle| format!("{s:?}"))
            .register_fn("isSolid", |v: Dynamic| v.is::<SolidHandle>());
        let _ = installed.set(());
    }
}
