//! Script-visible geometry operations
//!
//! Every binding has the same shape: decode the Rhai arguments through the
//! bridge, call one kernel operation, wrap the result. A solid's [`Status`]
//! is returned as data and never thrown.
//!
//! [`Status`]: dingcad_kernel::Status

mod booleans;
mod composite;
mod identity;
mod implicit;
mod measure;
mod mesh_io;
mod primitives;
mod properties;
mod refine;
mod sections;
mod transforms;

use std::any::TypeId;

use rhai::{Array, Dynamic, Engine, NativeCallContext};

use crate::bridge::{BindResult, BindingError, ScriptResult, expect_solid, unwrap_solid};
use crate::handle::SolidHandle;

pub use booleans::parse_op;
pub use mesh_io::resolve_mesh_path;

/// Highest arity registered for functions taking a list of solids
pub const MAX_VARIADIC_ARGS: usize = 16;

/// Register every geometry operation into `engine`
pub fn register(engine: &mut Engine) {
    primitives::register(engine);
    booleans::register(engine);
    transforms::register(engine);
    refine::register(engine);
    composite::register(engine);
    measure::register(engine);
    properties::register(engine);
    sections::register(engine);
    mesh_io::register(engine);
    implicit::register(engine);
    identity::register(engine);
}

/// Register `name` for every arity from `min` to [`MAX_VARIADIC_ARGS`]
#[allow(deprecated)] // register_raw_fn is marked volatile, not removed
pub(crate) fn register_variadic<F>(engine: &mut Engine, name: &'static str, min: usize, f: F)
where
    F: Fn(&NativeCallContext, &[Dynamic]) -> ScriptResult<Dynamic> + Clone + 'static,
{
    for arity in min..=MAX_VARIADIC_ARGS {
        let f = f.clone();
        engine.register_raw_fn(
            name,
            vec![TypeId::of::<Dynamic>(); arity],
            move |ctx: NativeCallContext, args: &mut [&mut Dynamic]| {
                let values: Vec<Dynamic> = args.iter().map(|a| (**a).clone()).collect();
                f(&ctx, &values)
            },
        );
    }
}

/// Register a one-solid query under `name`
pub(crate) fn register_query<F>(engine: &mut Engine, name: &'static str, f: F)
where
    F: Fn(&SolidHandle) -> Dynamic + Clone + 'static,
{
    let usage = format!("{name} expects a solid");
    engine.register_fn(name, move |s: Dynamic| -> ScriptResult<Dynamic> {
        let solid = expect_solid(&s, &usage)?;
        Ok(f(&solid))
    });
}

/// Solid arguments as passed: spread across the call, or packed in one array.
///
/// The shape is decided once from the raw arguments, before any element is
/// decoded.
pub(crate) enum SolidArgs<'a> {
    Spread(&'a [Dynamic]),
    Packed(Array),
}

impl<'a> SolidArgs<'a> {
    pub fn classify(args: &'a [Dynamic]) -> Self {
        match args {
            [single] if single.is_array() => match single.clone().try_cast::<Array>() {
                Some(array) => SolidArgs::Packed(array),
                None => SolidArgs::Spread(args),
            },
            _ => SolidArgs::Spread(args),
        }
    }

    fn values(&self) -> &[Dynamic] {
        match self {
            SolidArgs::Spread(values) => values,
            SolidArgs::Packed(array) => array,
        }
    }
}

/// Decode a list of solids in either calling convention
pub(crate) fn collect_solids(args: &[Dynamic], op: &str) -> BindResult<Vec<SolidHandle>> {
    SolidArgs::classify(args)
        .values()
        .iter()
        .enumerate()
        .map(|(i, v)| {
            unwrap_solid(v).ok_or_else(|| {
                BindingError::type_error(format!("{op} argument {i} is not a solid (found {})", v.type_name()))
            })
        })
        .collect()
}
