//! Level sets sampled from script functions

use dingcad_kernel::Solid;
use rhai::{Dynamic, Engine, FnPtr, NativeCallContext};
use tracing::debug;

use crate::bridge::{BindingError, Options, ScriptResult, decode_bounds, wrap_solid};
use crate::sampler::ScriptSampler;

pub(super) fn register(engine: &mut Engine) {
    engine.register_fn("levelSet", level_set);
}

fn level_set(ctx: NativeCallContext, opts: Dynamic) -> ScriptResult<Dynamic> {
    let opts = Options::required("levelSet", &opts)?;
    let Some(sdf) = opts.get("sdf").and_then(|v| v.clone().try_cast::<FnPtr>()) else {
        return Err(BindingError::type_error("levelSet requires sdf function").into());
    };
    let bounds = match opts.get("bounds") {
        Some(b) => decode_bounds(b)?,
        None => return Err(BindingError::type_error("levelSet requires bounds").into()),
    };
    let edge_length = match opts.opt_number("edgeLength")? {
        Some(e) if e > 0.0 => e,
        Some(_) => return Err(BindingError::range_error("levelSet edgeLength must be > 0").into()),
        None => return Err(BindingError::type_error("levelSet requires edgeLength").into()),
    };
    let level = opts.number("level", 0.0)?;
    let tolerance = opts.number("tolerance", -1.0)?;
    // Script functions run on the engine's thread only
    if opts.flag("canParallel", false)? {
        return Err(BindingError::type_error("levelSet canParallel must be false when using a script SDF").into());
    }

    let mut sampler = ScriptSampler::arm(sdf);
    let solid = Solid::level_set(|p| sampler.sample(&ctx, p), bounds, edge_length, level, tolerance);
    let samples = sampler.finish()?;
    debug!(samples, triangles = solid.num_tri(), status = %solid.status(), "levelSet sampled");
    Ok(wrap_solid(solid))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::thrown_message;
    use crate::handle::SolidHandle;
    use approx::assert_relative_eq;
    use rhai::INT;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.register_type_with_name::<SolidHandle>("Solid");
        register(&mut engine);
        engine
    }

    #[test]
    fn test_script_sphere() {
        let s = engine()
            .eval::<SolidHandle>(
                "fn ball(p) { 1.0 - sqrt(p[0]*p[0] + p[1]*p[1] + p[2]*p[2]) }
                 levelSet(#{ sdf: Fn(\"ball\"), bounds: #{ min: [-1.5,-1.5,-1.5], max: [1.5,1.5,1.5] }, edgeLength: 0.1 })",
            )
            .unwrap();
        assert_relative_eq!(s.volume(), 4.0 / 3.0 * std::f64::consts::PI, max_relative = 0.05);
        assert!(s.original_id().is_some());
    }

    #[test]
    fn test_parallel_is_refused_before_sampling() {
        let calls = engine()
            .eval::<INT>(
                "let calls = 0;
                 let f = |p| { calls += 1; 1.0 };
                 try {
                     levelSet(#{ sdf: f, bounds: #{ min: [0,0,0], max: [1,1,1] }, edgeLength: 0.5, canParallel: true });
                 } catch (e) {
                     if !e.contains(\"canParallel must be false\") { throw e; }
                 }
                 calls",
            )
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_required_options() {
        let engine = engine();
        let err = engine.eval::<SolidHandle>("levelSet(#{ bounds: 1 })").unwrap_err();
        assert!(thrown_message(&err).starts_with("TypeError: levelSet requires sdf function"));
        let err = engine.eval::<SolidHandle>("levelSet(#{ sdf: |p| 1.0 })").unwrap_err();
        assert!(thrown_message(&err).starts_with("TypeError: levelSet requires bounds"));
        let err = engine
            .eval::<SolidHandle>("levelSet(#{ sdf: |p| 1.0, bounds: #{ min: [0,0,0], max: [1,1,1] }, edgeLength: 0 })")
            .unwrap_err();
        assert!(thrown_message(&err).starts_with("RangeError: levelSet edgeLength must be > 0"));
        let err = engine.eval::<SolidHandle>("levelSet(3)").unwrap_err();
        assert!(thrown_message(&err).starts_with("TypeError: levelSet expects options object"));
    }

    #[test]
    fn test_sdf_error_is_surfaced() {
        let err = engine()
            .eval::<SolidHandle>(
                "levelSet(#{ sdf: |p| { throw \"bad sample\" }, bounds: #{ min: [0,0,0], max: [1,1,1] }, edgeLength: 0.5 })",
            )
            .unwrap_err();
        assert!(err.to_string().contains("bad sample"));
    }
}
