//! Conversions between solids and planar polygon sets

use dingcad_kernel::prelude::*;
use rhai::{Dynamic, Engine};

use crate::bridge::{
    BindingError, Options, ScriptResult, as_number, decode_number, decode_polygons, decode_vec2, encode_polygons,
    expect_solid, wrap_solid,
};

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_fn("slice", |s: Dynamic| slice(&s, None))
        .register_fn("slice", |s: Dynamic, h: Dynamic| slice(&s, Some(&h)))
        .register_fn("project", |s: Dynamic| -> ScriptResult<Dynamic> {
            let solid = expect_solid(&s, "project expects a solid")?;
            Ok(encode_polygons(&solid.project()))
        })
        .register_fn("extrude", |polys: Dynamic, opts: Dynamic| extrude(&polys, &opts))
        .register_fn("revolve", |polys: Dynamic| revolve(&polys, None))
        .register_fn("revolve", |polys: Dynamic, opts: Dynamic| revolve(&polys, Some(&opts)));
}

fn slice(s: &Dynamic, height: Option<&Dynamic>) -> ScriptResult<Dynamic> {
    const USAGE: &str = "slice expects (solid, height?)";
    let solid = expect_solid(s, USAGE)?;
    let height = height.map_or(Ok(0.0), |h| decode_number(h, "slice height"))?;
    Ok(encode_polygons(&solid.slice(height)))
}

fn extrude(polys: &Dynamic, opts: &Dynamic) -> ScriptResult<Dynamic> {
    let polygons = decode_polygons(polys)?;
    let opts = Options::required("extrude", opts)
        .map_err(|_| BindingError::type_error("extrude options must be an object"))?;
    let height = opts.number("height", 1.0)?;
    let divisions = opts.count("divisions", 0)?;
    let twist = opts.number("twistDegrees", 0.0)?;
    let scale_top = match opts.get("scaleTop") {
        None => DVec2::ONE,
        Some(v) => match as_number(v) {
            Some(s) => DVec2::splat(s),
            None => DVec2::from_array(decode_vec2(v)?),
        },
    };
    Ok(wrap_solid(Solid::extrude(&polygons, height, divisions, twist, scale_top)))
}

fn revolve(polys: &Dynamic, opts: Option<&Dynamic>) -> ScriptResult<Dynamic> {
    let polygons = decode_polygons(polys)?;
    let opts = Options::lenient("revolve", opts);
    let segments = opts.count("segments", 0)?;
    let degrees = opts.number("degrees", 360.0)?;
    Ok(wrap_solid(Solid::revolve(&polygons, segments, degrees)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::thrown_message;
    use crate::handle::SolidHandle;
    use approx::assert_relative_eq;
    use rhai::Array;

    const SQUARE: &str = "[[[0,0],[10,0],[10,10],[0,10]]]";

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.register_type_with_name::<SolidHandle>("Solid");
        engine.register_fn("block", || wrap_solid(Solid::cube(DVec3::splat(2.0), true)));
        register(&mut engine);
        engine
    }

    #[test]
    fn test_extrude_square() {
        let s = engine()
            .eval::<SolidHandle>(&format!("extrude({SQUARE}, #{{ height: 10 }})"))
            .unwrap();
        assert_relative_eq!(s.volume(), 1000.0, epsilon = 1e-9);
        let tapered = engine()
            .eval::<SolidHandle>(&format!("extrude({SQUARE}, #{{ height: 3, scaleTop: 0 }})"))
            .unwrap();
        assert_relative_eq!(tapered.volume(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extrude_needs_options_object() {
        let err = engine()
            .eval::<SolidHandle>(&format!("extrude({SQUARE}, 5)"))
            .unwrap_err();
        assert!(thrown_message(&err).starts_with("TypeError: extrude options must be an object"));
    }

    #[test]
    fn test_slice_and_project_cube() {
        let engine = engine();
        let loops = engine.eval::<Array>("slice(block())").unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].clone().into_array().unwrap().len(), 4);
        let shadow = engine.eval::<Array>("project(block())").unwrap();
        assert_eq!(shadow.len(), 1);
        assert_eq!(shadow[0].clone().into_array().unwrap().len(), 4);
        assert!(engine.eval::<Array>("slice(block(), 5)").unwrap().is_empty());
    }

    #[test]
    fn test_revolve_profile() {
        let torus = engine()
            .eval::<SolidHandle>("revolve([[[2,0],[3,0],[3,1],[2,1]]], #{ segments: 128 })")
            .unwrap();
        let exact = std::f64::consts::PI * (9.0 - 4.0);
        assert_relative_eq!(torus.volume(), exact, max_relative = 0.01);
        assert_eq!(torus.genus(), 1);
    }
}
