//! Affine operations

use dingcad_kernel::{affine_from_rows, prelude::*};
use rhai::{Dynamic, Engine};

use crate::bridge::{ScriptResult, as_number, decode_mat3x4, decode_vec3, expect_solid, to_dvec3, wrap_solid};

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_fn("translate", |s: Dynamic, v: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "translate expects (solid, [x,y,z])")?;
            let offset = to_dvec3(decode_vec3(&v)?);
            Ok(wrap_solid(solid.translate(offset)))
        })
        .register_fn("scale", |s: Dynamic, v: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "scale expects (solid, factor)")?;
            // A single number scales uniformly
            let factors = match as_number(&v) {
                Some(f) => DVec3::splat(f),
                None => to_dvec3(decode_vec3(&v)?),
            };
            Ok(wrap_solid(solid.scale(factors)))
        })
        .register_fn("rotate", |s: Dynamic, v: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "rotate expects (solid, [x,y,z] degrees)")?;
            let degrees = to_dvec3(decode_vec3(&v)?);
            Ok(wrap_solid(solid.rotate(degrees)))
        })
        .register_fn("mirror", |s: Dynamic, v: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "mirror expects (solid, [x,y,z])")?;
            let normal = to_dvec3(decode_vec3(&v)?);
            Ok(wrap_solid(solid.mirror(normal)))
        })
        .register_fn("transform", |s: Dynamic, m: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "transform expects (solid, mat3x4)")?;
            let rows = decode_mat3x4(&m)?;
            Ok(wrap_solid(solid.transform(&affine_from_rows(&rows))))
        });
}
