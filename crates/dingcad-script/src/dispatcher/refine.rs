//! Tolerance, simplification and refinement

use rhai::{Dynamic, Engine};

use crate::bridge::{BindingError, ScriptResult, decode_number, expect_solid, wrap_solid};

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_fn("setTolerance", |s: Dynamic, t: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "setTolerance expects (solid, tolerance)")?;
            let tolerance = decode_number(&t, "setTolerance tolerance")?;
            Ok(wrap_solid(solid.set_tolerance(tolerance)))
        })
        .register_fn("simplify", |s: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "simplify expects (solid, tolerance?)")?;
            Ok(wrap_solid(solid.simplify(0.0)))
        })
        .register_fn("simplify", |s: Dynamic, t: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "simplify expects (solid, tolerance?)")?;
            let tolerance = decode_number(&t, "simplify tolerance")?;
            Ok(wrap_solid(solid.simplify(tolerance)))
        })
        .register_fn("refine", |s: Dynamic, n: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "refine expects (solid, iterations)")?;
            let n = decode_number(&n, "refine iterations")?;
            if !(1.0..=f64::from(u32::MAX)).contains(&n) {
                return Err(BindingError::range_error("refine iterations must be >= 1").into());
            }
            Ok(wrap_solid(solid.refine(n as usize)))
        })
        .register_fn("refineToLength", |s: Dynamic, len: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "refineToLength expects (solid, length)")?;
            let length = decode_number(&len, "refineToLength length")?;
            Ok(wrap_solid(solid.refine_to_length(length)))
        })
        .register_fn("refineToTolerance", |s: Dynamic, t: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "refineToTolerance expects (solid, tolerance)")?;
            let tolerance = decode_number(&t, "refineToTolerance tolerance")?;
            Ok(wrap_solid(solid.refine_to_tolerance(tolerance)))
        });
}
