//! Compose, decompose, hulls and plane trimming

use dingcad_kernel::prelude::*;
use rhai::{Dynamic, Engine};

use super::{collect_solids, register_variadic};
use crate::bridge::{
    BindingError, ScriptResult, decode_number, decode_points3, decode_vec3, expect_solid, to_dvec3, wrap_solid,
};
use crate::handle::SolidHandle;

pub(super) fn register(engine: &mut Engine) {
    register_variadic(engine, "compose", 0, |_, args| {
        let solids = collect_solids(args, "compose")?;
        if solids.is_empty() {
            return Err(BindingError::type_error("compose requires at least one solid").into());
        }
        let refs: Vec<&Solid> = solids.iter().map(SolidHandle::solid).collect();
        Ok(wrap_solid(Solid::compose(&refs)))
    });

    register_variadic(engine, "hull", 0, |_, args| {
        let solids = collect_solids(args, "hull")?;
        if solids.is_empty() {
            return Err(BindingError::type_error("hull requires at least one solid").into());
        }
        let refs: Vec<&Solid> = solids.iter().map(SolidHandle::solid).collect();
        Ok(wrap_solid(Solid::hull(&refs)))
    });

    engine
        .register_fn("decompose", |s: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "decompose expects a solid")?;
            let parts = solid.decompose().into_iter().map(wrap_solid).collect();
            Ok(Dynamic::from_array(parts))
        })
        .register_fn("hullPoints", |points: Dynamic| -> ScriptResult<Dynamic> {
            let points = decode_points3(&points)
                .map_err(|_| BindingError::type_error("hullPoints expects array of [x,y,z]"))?;
            Ok(wrap_solid(Solid::hull_points(&points)))
        })
        .register_fn(
            "trimByPlane",
            |s: Dynamic, normal: Dynamic, offset: Dynamic| -> ScriptResult<Dynamic> {
                const USAGE: &str = "trimByPlane expects (solid, [nx,ny,nz], offset)";
                let solid = expect_solid(&s, USAGE)?;
                let normal = decode_vec3(&normal).map_err(|_| BindingError::type_error(USAGE))?;
                let offset = decode_number(&offset, "trimByPlane offset")?;
                Ok(wrap_solid(solid.trim_by_plane(to_dvec3(normal), offset)))
            },
        );
}
