//! Primitive constructors: cube, sphere, cylinder, tetrahedron

use dingcad_kernel::prelude::*;
use rhai::{Dynamic, Engine};

use crate::bridge::{Options, ScriptResult, wrap_solid};

pub(super) fn register(engine: &mut Engine) {
    for name in ["cube", "box"] {
        engine
            .register_fn(name, || cube(None))
            .register_fn(name, |opts: Dynamic| cube(Some(&opts)));
    }
    engine
        .register_fn("sphere", || sphere(None))
        .register_fn("sphere", |opts: Dynamic| sphere(Some(&opts)))
        .register_fn("cylinder", || cylinder(None))
        .register_fn("cylinder", |opts: Dynamic| cylinder(Some(&opts)))
        .register_fn("tetrahedron", || wrap_solid(Solid::tetrahedron()));
}

fn cube(opts: Option<&Dynamic>) -> ScriptResult<Dynamic> {
    let opts = Options::lenient("cube", opts);
    let size = opts.vec3("size", [1.0, 1.0, 1.0])?;
    let center = opts.flag("center", false)?;
    Ok(wrap_solid(Solid::cube(DVec3::from_array(size), center)))
}

fn sphere(opts: Option<&Dynamic>) -> ScriptResult<Dynamic> {
    let opts = Options::lenient("sphere", opts);
    let radius = opts.number("radius", 1.0)?;
    let segments = opts.count("segments", 0)?;
    Ok(wrap_solid(Solid::sphere(radius, segments)))
}

fn cylinder(opts: Option<&Dynamic>) -> ScriptResult<Dynamic> {
    let opts = Options::lenient("cylinder", opts);
    let height = opts.number("height", 1.0)?;
    let radius = opts.number("radius", 0.5)?;
    let radius_top = opts.opt_number("radiusTop")?.unwrap_or(radius);
    let segments = opts.count("segments", 0)?;
    let center = opts.flag("center", false)?;
    Ok(wrap_solid(Solid::cylinder(height, radius, radius_top, segments, center)))
}
